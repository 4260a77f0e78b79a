//! Array Engine
//!
//! A dense, homogeneous N-dimensional array stored row-major in a single
//! blob. The shape is fixed at creation; contents are replaced by full
//! rewrites only.

use crate::error::TreeError;
use crate::session::File;
use crate::store::BackingStore;
use crate::tree::NodeRef;
use crate::types::{BlobHandle, ByteOrder, NodeId};
use crate::value::{decode_scalar, encode_scalar, ScalarType, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nested list form of array data, one `List` level per dimension
#[derive(Debug, Clone, PartialEq)]
pub enum Nested {
    Scalar(Value),
    List(Vec<Nested>),
}

impl Nested {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Nested::Scalar(v) => Some(v),
            Nested::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Nested]> {
        match self {
            Nested::List(items) => Some(items),
            Nested::Scalar(_) => None,
        }
    }
}

impl From<Value> for Nested {
    fn from(value: Value) -> Self {
        match value {
            Value::Vector(items) => Nested::List(items.into_iter().map(Nested::from).collect()),
            scalar => Nested::Scalar(scalar),
        }
    }
}

impl<T: Into<Nested>> From<Vec<T>> for Nested {
    fn from(items: Vec<T>) -> Self {
        Nested::List(items.into_iter().map(Into::into).collect())
    }
}

macro_rules! nested_from_scalar {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Nested {
                fn from(v: $t) -> Self {
                    Nested::Scalar(Value::from(v))
                }
            }
        )*
    };
}

nested_from_scalar!(bool, i8, u8, i16, u16, i32, u32, i64, u64, f32, f64, &str, String);

/// Flat row-major values with their shape and element type
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayData {
    dtype: ScalarType,
    shape: Vec<usize>,
    values: Vec<Value>,
}

fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

impl ArrayData {
    /// Explicitly typed data; every value is coerced to `dtype`
    pub fn new(dtype: ScalarType, shape: Vec<usize>, values: Vec<Value>) -> Result<Self, TreeError> {
        if shape.is_empty() {
            return Err(TreeError::ShapeError(
                "arrays need at least one dimension".to_string(),
            ));
        }
        if dtype == ScalarType::FixedString(0) {
            return Err(TreeError::InvalidSchema(
                "string elements need a non-zero width".to_string(),
            ));
        }
        let expected = element_count(&shape);
        if values.len() != expected {
            return Err(TreeError::ShapeError(format!(
                "shape {:?} holds {} elements, got {}",
                shape,
                expected,
                values.len()
            )));
        }
        let values = values
            .iter()
            .map(|v| {
                v.coerce_scalar(dtype)
                    .ok_or_else(|| TreeError::mismatch("array", dtype, v.kind_name()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            dtype,
            shape,
            values,
        })
    }

    /// Infer shape and element type from nested lists.
    ///
    /// Sub-lists must have uniform lengths at each depth. Strings widen to
    /// the longest one; any other mix of element types is rejected.
    pub fn from_nested(data: impl Into<Nested>) -> Result<Self, TreeError> {
        let data = data.into();
        let mut shape = Vec::new();
        let mut cursor = &data;
        while let Nested::List(items) = cursor {
            shape.push(items.len());
            match items.first() {
                Some(first) => cursor = first,
                None => break,
            }
        }
        if shape.is_empty() {
            return Err(TreeError::ShapeError(
                "arrays need at least one dimension".to_string(),
            ));
        }

        let mut values = Vec::with_capacity(element_count(&shape));
        flatten(&data, &shape, &mut values)?;

        let dtype = infer_dtype(&values)?;
        Ok(Self {
            dtype,
            shape,
            values,
        })
    }

    /// One-dimensional data
    pub fn from_vec<T: Into<Value>>(values: Vec<T>) -> Result<Self, TreeError> {
        Self::from_nested(Nested::List(
            values.into_iter().map(|v| Nested::Scalar(v.into())).collect(),
        ))
    }

    /// Two-dimensional data, one inner vector per row
    pub fn from_rows<T: Into<Value>>(rows: Vec<Vec<T>>) -> Result<Self, TreeError> {
        Self::from_nested(Nested::List(
            rows.into_iter()
                .map(|row| Nested::List(row.into_iter().map(|v| Nested::Scalar(v.into())).collect()))
                .collect(),
        ))
    }

    pub fn dtype(&self) -> ScalarType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Length of the first dimension
    pub fn len(&self) -> usize {
        self.shape[0]
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Row-major values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn to_nested(&self) -> Nested {
        build_nested(&self.values, &self.shape)
    }

    fn encode(&self, order: ByteOrder) -> Result<Vec<u8>, TreeError> {
        let mut out = Vec::with_capacity(self.values.len() * self.dtype.width());
        for value in &self.values {
            encode_scalar(value, self.dtype, order, &mut out)?;
        }
        Ok(out)
    }

    fn decode(dtype: ScalarType, shape: Vec<usize>, order: ByteOrder, bytes: &[u8]) -> Self {
        let values = bytes
            .chunks_exact(dtype.width())
            .map(|chunk| decode_scalar(dtype, order, chunk))
            .collect();
        Self {
            dtype,
            shape,
            values,
        }
    }
}

fn flatten(node: &Nested, shape: &[usize], out: &mut Vec<Value>) -> Result<(), TreeError> {
    match (node, shape.split_first()) {
        (Nested::Scalar(value), None) => {
            out.push(value.clone());
            Ok(())
        }
        (Nested::List(items), Some((&len, rest))) if items.len() == len => {
            items.iter().try_for_each(|item| flatten(item, rest, out))
        }
        (Nested::List(items), Some((&len, _))) => Err(TreeError::ShapeError(format!(
            "ragged data: expected {} elements, found {}",
            len,
            items.len()
        ))),
        (Nested::List(_), None) => Err(TreeError::ShapeError(
            "ragged data: list where a scalar was expected".to_string(),
        )),
        (Nested::Scalar(_), Some(_)) => Err(TreeError::ShapeError(
            "ragged data: scalar where a list was expected".to_string(),
        )),
    }
}

fn infer_dtype(values: &[Value]) -> Result<ScalarType, TreeError> {
    let first = values.first().ok_or_else(|| {
        TreeError::ShapeError("cannot infer an element type from empty data".to_string())
    })?;
    let mut dtype = first
        .natural_type()
        .ok_or_else(|| TreeError::mismatch("array", "scalar", first.kind_name()))?;
    for value in &values[1..] {
        dtype = match (dtype, value.natural_type()) {
            (ScalarType::FixedString(a), Some(ScalarType::FixedString(b))) => {
                ScalarType::FixedString(a.max(b))
            }
            (current, Some(other)) if current == other => current,
            (current, _) => return Err(TreeError::mismatch("array", current, value.kind_name())),
        };
    }
    Ok(dtype)
}

fn build_nested(values: &[Value], shape: &[usize]) -> Nested {
    match shape.split_first() {
        None => Nested::Scalar(values[0].clone()),
        Some((&len, rest)) => {
            let stride = element_count(rest);
            Nested::List(
                (0..len)
                    .map(|i| build_nested(&values[i * stride..(i + 1) * stride], rest))
                    .collect(),
            )
        }
    }
}

/// Persisted array metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayNode {
    dtype: ScalarType,
    shape: Vec<usize>,
    byteorder: ByteOrder,
    blob: BlobHandle,
}

impl ArrayNode {
    pub(crate) fn new(data: &ArrayData, byteorder: ByteOrder, blob: BlobHandle) -> Self {
        Self {
            dtype: data.dtype,
            shape: data.shape.clone(),
            byteorder,
            blob,
        }
    }

    pub fn dtype(&self) -> ScalarType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn byteorder(&self) -> ByteOrder {
        self.byteorder
    }

    pub fn blob(&self) -> BlobHandle {
        self.blob
    }

    pub fn nbytes(&self) -> u64 {
        (element_count(&self.shape) * self.dtype.width()) as u64
    }

    /// Check `data` against the declared shape and encode it in this
    /// array's element type and byteorder
    pub(crate) fn encode(&self, data: &ArrayData) -> Result<Vec<u8>, TreeError> {
        if data.shape != self.shape {
            return Err(TreeError::ShapeError(format!(
                "array has shape {:?}, data has shape {:?}",
                self.shape, data.shape
            )));
        }
        let coerced = if data.dtype == self.dtype {
            data.clone()
        } else {
            ArrayData::new(self.dtype, data.shape.clone(), data.values.clone())?
        };
        coerced.encode(self.byteorder)
    }
}

/// Read access to one array
#[derive(Clone, Copy)]
pub struct ArrayRef<'a> {
    node: NodeRef<'a>,
    array: &'a ArrayNode,
    store: &'a dyn BackingStore,
}

impl<'a> ArrayRef<'a> {
    pub(crate) fn new(node: NodeRef<'a>, array: &'a ArrayNode, store: &'a dyn BackingStore) -> Self {
        Self { node, array, store }
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

    pub fn shape(&self) -> &'a [usize] {
        self.array.shape()
    }

    pub fn dtype(&self) -> ScalarType {
        self.array.dtype()
    }

    pub fn byteorder(&self) -> ByteOrder {
        self.array.byteorder()
    }

    pub fn len(&self) -> usize {
        self.array.shape[0]
    }

    pub fn is_empty(&self) -> bool {
        self.array.nbytes() == 0
    }

    /// Whole contents
    pub fn read(&self) -> Result<ArrayData, TreeError> {
        let bytes = self.store.read(self.array.blob, 0, self.array.nbytes())?;
        Ok(ArrayData::decode(
            self.array.dtype,
            self.array.shape.clone(),
            self.array.byteorder,
            &bytes,
        ))
    }

    /// One entry along the first dimension; negative indices count from the end
    pub fn read_index(&self, index: i64) -> Result<Nested, TreeError> {
        let len = self.len() as i128;
        let resolved = if index < 0 { index as i128 + len } else { index as i128 };
        if resolved < 0 || resolved >= len {
            return Err(TreeError::IndexOutOfRange {
                index,
                len: len as u64,
            });
        }
        let inner = &self.array.shape[1..];
        let stride = (element_count(inner) * self.array.dtype.width()) as u64;
        let bytes = self
            .store
            .read(self.array.blob, resolved as u64 * stride, stride)?;
        let slab = ArrayData::decode(
            self.array.dtype,
            inner.to_vec(),
            self.array.byteorder,
            &bytes,
        );
        Ok(build_nested(&slab.values, inner))
    }
}

impl fmt::Display for ArrayRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node)
    }
}

/// Write access to one array
pub struct ArrayMut<'a> {
    file: &'a mut File,
    id: NodeId,
}

impl<'a> ArrayMut<'a> {
    pub(crate) fn new(file: &'a mut File, id: NodeId) -> Self {
        Self { file, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Replace the full contents
    pub fn write(&mut self, data: &ArrayData) -> Result<(), TreeError> {
        self.file.write_array(self.id, data)
    }
}
