//! Table Engine
//!
//! A table leaf stores fixed-width rows back to back in one blob, so row `i`
//! lives at `i * row_width` and positional reads need no scan. Appended rows
//! are encoded into an in-memory write buffer and reach the blob on flush;
//! reads only ever observe flushed rows.

use crate::error::{StorageError, TreeError};
use crate::schema::{FieldSpec, SchemaDescriptor};
use crate::session::File;
use crate::store::BackingStore;
use crate::tree::NodeRef;
use crate::types::{BlobHandle, ByteOrder, NodeId};
use crate::value::{ScalarType, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};
use std::sync::Arc;

/// Persisted table state plus its unflushed write buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    schema: Arc<SchemaDescriptor>,
    byteorder: ByteOrder,
    blob: BlobHandle,
    nrows: u64,
    #[serde(skip)]
    buffer: Vec<u8>,
    #[serde(skip)]
    pending: usize,
}

impl Table {
    pub(crate) fn new(schema: Arc<SchemaDescriptor>, byteorder: ByteOrder, blob: BlobHandle) -> Self {
        Self {
            schema,
            byteorder,
            blob,
            nrows: 0,
            buffer: Vec::new(),
            pending: 0,
        }
    }

    pub fn schema(&self) -> &Arc<SchemaDescriptor> {
        &self.schema
    }

    /// Rows durably written to the store
    pub fn nrows(&self) -> u64 {
        self.nrows
    }

    /// Rows appended but not yet flushed
    pub fn pending_rows(&self) -> usize {
        self.pending
    }

    pub fn byteorder(&self) -> ByteOrder {
        self.byteorder
    }

    pub fn blob(&self) -> BlobHandle {
        self.blob
    }

    pub fn row_width(&self) -> usize {
        self.schema.row_width()
    }

    /// Encode one coerced record into the write buffer
    pub(crate) fn stage(&mut self, values: &[Value]) -> Result<(), TreeError> {
        self.schema
            .encode_row(values, self.byteorder, &mut self.buffer)?;
        self.pending += 1;
        Ok(())
    }

    /// Write the buffer after the last durable row. The row count is left
    /// alone; the session advances it once the catalog is saved.
    pub(crate) fn write_pending(&self, store: &mut dyn BackingStore) -> Result<usize, StorageError> {
        if self.pending == 0 {
            return Ok(0);
        }
        let offset = self.nrows * self.row_width() as u64;
        store.write(self.blob, offset, &self.buffer)?;
        Ok(self.pending)
    }

    /// Drop the most recently staged row
    pub(crate) fn unstage_last(&mut self) {
        if self.pending == 0 {
            return;
        }
        let width = self.row_width();
        self.buffer.truncate(self.buffer.len().saturating_sub(width));
        self.pending -= 1;
    }

    pub(crate) fn clear_pending(&mut self) {
        self.buffer.clear();
        self.pending = 0;
    }

    pub(crate) fn set_nrows(&mut self, nrows: u64) {
        self.nrows = nrows;
    }
}

/// Python-style slice over table rows: half-open, negative indices count
/// from the end, out-of-range bounds clamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

/// Resolved slice: `count` indices starting at `start`, `step` apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceIndices {
    pub start: i64,
    pub step: i64,
    pub count: u64,
}

impl SliceIndices {
    pub fn iter(&self) -> impl Iterator<Item = u64> {
        let SliceIndices { start, step, count } = *self;
        (0..count).map(move |k| (start + k as i64 * step) as u64)
    }
}

impl Slice {
    /// Every row
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(
        start: impl Into<Option<i64>>,
        stop: impl Into<Option<i64>>,
        step: impl Into<Option<i64>>,
    ) -> Self {
        Self {
            start: start.into(),
            stop: stop.into(),
            step: step.into(),
        }
    }

    pub fn step_by(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    /// Resolve against a sequence of `len` rows
    pub fn indices(&self, len: u64) -> Result<SliceIndices, TreeError> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(TreeError::InvalidSlice("slice step cannot be zero".to_string()));
        }
        let len = len as i128;
        let wide_step = step as i128;
        let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };
        let clamp = |v: i64| {
            let v = v as i128;
            if v < 0 {
                (v + len).max(lower)
            } else {
                v.min(upper)
            }
        };
        let start = self
            .start
            .map_or(if step < 0 { upper } else { lower }, clamp);
        let stop = self.stop.map_or(if step < 0 { lower } else { upper }, clamp);

        let count = if step > 0 && start < stop {
            (stop - start - 1) / wide_step + 1
        } else if step < 0 && stop < start {
            (start - stop - 1) / -wide_step + 1
        } else {
            0
        };

        Ok(SliceIndices {
            start: start as i64,
            step,
            count: count as u64,
        })
    }
}

impl From<RangeFull> for Slice {
    fn from(_: RangeFull) -> Self {
        Slice::all()
    }
}

impl From<Range<i64>> for Slice {
    fn from(range: Range<i64>) -> Self {
        Slice::new(range.start, range.end, None)
    }
}

impl From<RangeFrom<i64>> for Slice {
    fn from(range: RangeFrom<i64>) -> Self {
        Slice::new(range.start, None, None)
    }
}

impl From<RangeTo<i64>> for Slice {
    fn from(range: RangeTo<i64>) -> Self {
        Slice::new(None, range.end, None)
    }
}

/// One decoded row
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    index: u64,
    schema: Arc<SchemaDescriptor>,
    values: Vec<Value>,
}

impl RowView {
    /// Zero-based ordinal of the row in its table
    pub fn row_index(&self) -> u64 {
        self.index
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.schema.index_of(field).map(|i| &self.values[i])
    }

    pub fn field(&self, field: &str) -> Result<&Value, TreeError> {
        self.get(field)
            .ok_or_else(|| TreeError::UnknownField(field.to_string()))
    }

    /// Values in schema order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }
}

impl fmt::Display for RowView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

/// Lazy row iterator reading the blob in chunks.
///
/// Contiguous selections read up to `chunk_rows` rows per store call; strided
/// selections read one row at a time. After a store error the iterator ends.
pub struct RowIter<'a> {
    table: &'a Table,
    store: &'a dyn BackingStore,
    next: i64,
    step: i64,
    remaining: u64,
    chunk_rows: u64,
    chunk: Vec<u8>,
    chunk_start: u64,
    chunk_len: u64,
    failed: bool,
}

impl<'a> RowIter<'a> {
    fn new(table: &'a Table, store: &'a dyn BackingStore, indices: SliceIndices, chunk_rows: usize) -> Self {
        Self {
            table,
            store,
            next: indices.start,
            step: indices.step,
            remaining: indices.count,
            chunk_rows: chunk_rows.max(1) as u64,
            chunk: Vec::new(),
            chunk_start: 0,
            chunk_len: 0,
            failed: false,
        }
    }

    /// Advance and return the next row index with its byte range in `chunk`
    fn fetch(&mut self) -> Option<Result<(u64, Range<usize>), TreeError>> {
        if self.remaining == 0 || self.failed {
            return None;
        }
        let index = self.next as u64;
        let width = self.table.row_width() as u64;

        if index < self.chunk_start || index >= self.chunk_start + self.chunk_len {
            let count = if self.step == 1 {
                self.remaining.min(self.chunk_rows)
            } else {
                1
            };
            match self.store.read(self.table.blob, index * width, count * width) {
                Ok(bytes) => {
                    self.chunk = bytes;
                    self.chunk_start = index;
                    self.chunk_len = count;
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e.into()));
                }
            }
        }

        let offset = ((index - self.chunk_start) * width) as usize;
        self.next += self.step;
        self.remaining -= 1;
        Some(Ok((index, offset..offset + width as usize)))
    }
}

impl Iterator for RowIter<'_> {
    type Item = Result<RowView, TreeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.fetch()? {
            Ok((index, range)) => Some(Ok(RowView {
                index,
                schema: Arc::clone(&self.table.schema),
                values: self
                    .table
                    .schema
                    .decode_row(&self.chunk[range], self.table.byteorder),
            })),
            Err(e) => Some(Err(e)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }
}

/// Read access to one table
#[derive(Clone, Copy)]
pub struct TableRef<'a> {
    node: NodeRef<'a>,
    table: &'a Table,
    store: &'a dyn BackingStore,
    chunk_rows: usize,
}

impl<'a> TableRef<'a> {
    pub(crate) fn new(
        node: NodeRef<'a>,
        table: &'a Table,
        store: &'a dyn BackingStore,
        chunk_rows: usize,
    ) -> Self {
        Self {
            node,
            table,
            store,
            chunk_rows,
        }
    }

    pub fn node(&self) -> NodeRef<'a> {
        self.node
    }

    pub fn name(&self) -> &'a str {
        self.node.name()
    }

    pub fn path(&self) -> String {
        self.node.path()
    }

    pub fn title(&self) -> &'a str {
        self.node.title()
    }

    pub fn nrows(&self) -> u64 {
        self.table.nrows()
    }

    pub fn pending_rows(&self) -> usize {
        self.table.pending_rows()
    }

    pub fn byteorder(&self) -> ByteOrder {
        self.table.byteorder()
    }

    pub fn row_width(&self) -> usize {
        self.table.row_width()
    }

    pub fn description(&self) -> &'a SchemaDescriptor {
        &self.table.schema
    }

    pub fn colnames(&self) -> Vec<&'a str> {
        self.table.schema.colnames()
    }

    /// Column name to element type, in column order
    pub fn coltypes(&self) -> Vec<(&'a str, ScalarType)> {
        self.table
            .schema
            .fields()
            .iter()
            .map(|f| (f.name.as_str(), f.scalar_type))
            .collect()
    }

    /// Full declaration of one column
    pub fn column(&self, name: &str) -> Result<&'a FieldSpec, TreeError> {
        self.table
            .schema
            .field(name)
            .ok_or_else(|| TreeError::ColumnNotFound(name.to_string()))
    }

    /// Iterate over every flushed row
    pub fn iterrows(&self) -> RowIter<'a> {
        let indices = SliceIndices {
            start: 0,
            step: 1,
            count: self.table.nrows,
        };
        RowIter::new(self.table, self.store, indices, self.chunk_rows)
    }

    /// Iterate over the rows selected by `slice`
    pub fn iterrows_range(&self, slice: impl Into<Slice>) -> Result<RowIter<'a>, TreeError> {
        let indices = slice.into().indices(self.table.nrows)?;
        Ok(RowIter::new(self.table, self.store, indices, self.chunk_rows))
    }

    /// Rows selected by `slice`, in selection order
    pub fn read(&self, slice: impl Into<Slice>) -> Result<Vec<RowView>, TreeError> {
        self.iterrows_range(slice)?.collect()
    }

    /// One column of the rows selected by `slice`
    pub fn read_field(&self, slice: impl Into<Slice>, field: &str) -> Result<Vec<Value>, TreeError> {
        let column = self
            .table
            .schema
            .index_of(field)
            .ok_or_else(|| TreeError::ColumnNotFound(field.to_string()))?;
        let mut rows = self.iterrows_range(slice)?;
        let mut values = Vec::with_capacity(rows.size_hint().0);
        while let Some(fetched) = rows.fetch() {
            let (_, range) = fetched?;
            values.push(self.table.schema.decode_field(
                &rows.chunk[range],
                column,
                self.table.byteorder,
            ));
        }
        Ok(values)
    }

    /// A single row; negative indices count from the end
    pub fn read_row(&self, index: i64) -> Result<RowView, TreeError> {
        let nrows = self.table.nrows;
        let resolved = if index < 0 {
            index as i128 + nrows as i128
        } else {
            index as i128
        };
        if resolved < 0 || resolved >= nrows as i128 {
            return Err(TreeError::IndexOutOfRange { index, len: nrows });
        }
        let resolved = resolved as i64;
        self.iterrows_range(Slice::new(resolved, resolved + 1, None))?
            .next()
            .unwrap_or(Err(TreeError::IndexOutOfRange { index, len: nrows }))
    }
}

impl<'a> IntoIterator for &TableRef<'a> {
    type Item = Result<RowView, TreeError>;
    type IntoIter = RowIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iterrows()
    }
}

impl fmt::Display for TableRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node)
    }
}

/// Write access to one table, bound to its session
pub struct TableMut<'a> {
    file: &'a mut File,
    id: NodeId,
    schema: Arc<SchemaDescriptor>,
}

impl<'a> TableMut<'a> {
    pub(crate) fn new(file: &'a mut File, id: NodeId, schema: Arc<SchemaDescriptor>) -> Self {
        Self { file, id, schema }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Staging cursor initialised to the schema defaults
    pub fn row(&mut self) -> RowCursor<'_> {
        RowCursor {
            values: self.schema.defaults(),
            schema: Arc::clone(&self.schema),
            file: &mut *self.file,
            id: self.id,
        }
    }

    /// Append a full record given positionally in schema order
    pub fn append_row(&mut self, values: &[Value]) -> Result<(), TreeError> {
        let coerced = self.schema.coerce_row(values)?;
        self.file.stage_row(self.id, &coerced)
    }

    pub fn append_rows<I>(&mut self, rows: I) -> Result<(), TreeError>
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        for row in rows {
            self.append_row(&row)?;
        }
        Ok(())
    }

    /// Flush buffered rows; returns how many were written
    pub fn flush(&mut self) -> Result<usize, TreeError> {
        self.file.flush_node(self.id)
    }

    pub fn nrows(&self) -> Result<u64, TreeError> {
        Ok(self.file.table_node(self.id)?.nrows())
    }

    pub fn pending_rows(&self) -> Result<usize, TreeError> {
        Ok(self.file.table_node(self.id)?.pending_rows())
    }
}

/// Mutable staging record for one row.
///
/// Values survive `append`, so consecutive rows can overwrite only the
/// fields that change.
pub struct RowCursor<'t> {
    file: &'t mut File,
    id: NodeId,
    schema: Arc<SchemaDescriptor>,
    values: Vec<Value>,
}

impl RowCursor<'_> {
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self, TreeError> {
        let index = self
            .schema
            .index_of(field)
            .ok_or_else(|| TreeError::UnknownField(field.to_string()))?;
        self.values[index] = self.schema.fields()[index].coerce(&value.into())?;
        Ok(self)
    }

    pub fn get(&self, field: &str) -> Result<&Value, TreeError> {
        self.schema
            .index_of(field)
            .map(|i| &self.values[i])
            .ok_or_else(|| TreeError::UnknownField(field.to_string()))
    }

    /// Restore every field to its default
    pub fn reset(&mut self) {
        self.values = self.schema.defaults();
    }

    /// Commit the staged values as a new row in the write buffer
    pub fn append(&mut self) -> Result<(), TreeError> {
        self.file.stage_row(self.id, &self.values)
    }

    pub fn flush(&mut self) -> Result<usize, TreeError> {
        self.file.flush_node(self.id)
    }
}
