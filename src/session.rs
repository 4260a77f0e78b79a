//! File Session
//!
//! A [`File`] owns one backing store and the node tree rehydrated from it.
//! Every path handed in is translated to stored names first, and every
//! structural change is followed by a catalog save, so the store alone is
//! enough to reopen the file.

use crate::array::{ArrayData, ArrayMut, ArrayNode, ArrayRef};
use crate::catalog;
use crate::config::StoreConfig;
use crate::error::TreeError;
use crate::schema::SchemaDescriptor;
use crate::store::{BackingStore, MemoryBackingStore, OpenMode, SledBackingStore};
use crate::table::{Table, TableMut, TableRef};
use crate::translation::TranslationMap;
use crate::tree::{GroupNode, GroupWalk, KindFilter, NodeKind, NodeRef, NodeTree, NodeWalk};
use crate::types::{BlobHandle, ByteOrder, NodeId};
use crate::value::Value;
use serde_json::json;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Creation options for a table
#[derive(Debug, Clone, Default)]
pub struct TableOptions {
    pub title: String,
    /// Falls back to the configured default byteorder
    pub byteorder: Option<ByteOrder>,
}

impl TableOptions {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            byteorder: None,
        }
    }

    pub fn with_byteorder(mut self, byteorder: ByteOrder) -> Self {
        self.byteorder = Some(byteorder);
        self
    }
}

/// An open hierarchical file
pub struct File {
    store: Box<dyn BackingStore>,
    tree: NodeTree,
    names: TranslationMap,
    filename: String,
    mode: OpenMode,
    config: StoreConfig,
    closed: bool,
}

impl File {
    /// Open a sled-backed file with the default configuration
    pub fn open(
        path: impl AsRef<Path>,
        mode: OpenMode,
        names: TranslationMap,
    ) -> Result<Self, TreeError> {
        Self::open_with_config(path, mode, names, &StoreConfig::default())
    }

    pub fn open_with_config(
        path: impl AsRef<Path>,
        mode: OpenMode,
        names: TranslationMap,
        config: &StoreConfig,
    ) -> Result<Self, TreeError> {
        let path = path.as_ref();
        let store = SledBackingStore::open(path, mode)?;
        Self::with_store(
            Box::new(store),
            path.display().to_string(),
            names,
            config.clone(),
        )
    }

    /// Volatile file backed by memory
    pub fn in_memory(names: TranslationMap) -> Result<Self, TreeError> {
        Self::with_store(
            Box::new(MemoryBackingStore::new()),
            ":memory:",
            names,
            StoreConfig::default(),
        )
    }

    /// Open over any backing store; the store's mode becomes the file's mode
    pub fn with_store(
        store: Box<dyn BackingStore>,
        filename: impl Into<String>,
        names: TranslationMap,
        config: StoreConfig,
    ) -> Result<Self, TreeError> {
        let mode = store.mode();
        let loaded = catalog::load(store.as_ref())?;
        let fresh = loaded.is_none();
        let tree = match loaded {
            Some(catalog) => NodeTree::from_catalog(catalog)?,
            None => NodeTree::new(),
        };

        let mut file = Self {
            store,
            tree,
            names,
            filename: filename.into(),
            mode,
            config,
            closed: false,
        };
        if fresh && mode.is_writable() {
            file.persist_catalog()?;
        }
        info!(
            filename = %file.filename,
            mode = %file.mode,
            nodes = file.tree.len(),
            "Opened file"
        );
        Ok(file)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn translation(&self) -> &TranslationMap {
        &self.names
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The root group; valid even after close
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef::new(&self.tree, &self.names, self.tree.root())
    }

    pub fn create_group(
        &mut self,
        parent_path: &str,
        name: &str,
        title: &str,
    ) -> Result<NodeId, TreeError> {
        self.ensure_writable()?;
        let id = self.insert_node(parent_path, name, title, NodeKind::Group(GroupNode::default()))?;
        debug!(path = %self.tree.path_of(id), "Created group");
        Ok(id)
    }

    /// Empty table with the configured default byteorder
    pub fn create_table(
        &mut self,
        parent_path: &str,
        name: &str,
        schema: SchemaDescriptor,
        title: &str,
    ) -> Result<NodeId, TreeError> {
        self.create_table_with_options(parent_path, name, schema, TableOptions::titled(title))
    }

    pub fn create_table_with_options(
        &mut self,
        parent_path: &str,
        name: &str,
        schema: SchemaDescriptor,
        options: TableOptions,
    ) -> Result<NodeId, TreeError> {
        self.ensure_writable()?;
        let byteorder = options
            .byteorder
            .unwrap_or_else(|| self.config.default_byteorder.resolve());
        let blob = self.store.allocate(0)?;
        let table = Table::new(Arc::new(schema), byteorder, blob);
        let id = match self.insert_node(parent_path, name, &options.title, NodeKind::Table(table)) {
            Ok(id) => id,
            Err(e) => {
                self.release_blob(blob);
                return Err(e);
            }
        };
        debug!(path = %self.tree.path_of(id), byteorder = %byteorder, "Created table");
        Ok(id)
    }

    /// Create a table and append and flush `rows`, each given positionally
    /// in schema order
    pub fn create_table_with_rows<I>(
        &mut self,
        parent_path: &str,
        name: &str,
        schema: SchemaDescriptor,
        rows: I,
        options: TableOptions,
    ) -> Result<NodeId, TreeError>
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        let coerced = rows
            .into_iter()
            .map(|row| schema.coerce_row(&row))
            .collect::<Result<Vec<_>, _>>()?;
        let id = self.create_table_with_options(parent_path, name, schema, options)?;

        let filled = coerced
            .iter()
            .try_for_each(|row| self.stage_row(id, row))
            .and_then(|()| self.flush_node(id).map(|_| ()));
        if let Err(e) = filled {
            if let Err(cleanup) = self.remove_id(id, false) {
                warn!(error = %cleanup, "Failed to remove partially created table");
            }
            return Err(e);
        }
        Ok(id)
    }

    /// Array with shape and element type taken from `data`
    pub fn create_array(
        &mut self,
        parent_path: &str,
        name: &str,
        data: &ArrayData,
        title: &str,
    ) -> Result<NodeId, TreeError> {
        self.ensure_writable()?;
        let byteorder = self.config.default_byteorder.resolve();
        let blob = self.store.allocate(0)?;
        let array = ArrayNode::new(data, byteorder, blob);
        let inserted = match array.encode(data) {
            Ok(bytes) => self
                .store
                .write(blob, 0, &bytes)
                .map_err(TreeError::from)
                .and_then(|()| self.insert_node(parent_path, name, title, NodeKind::Array(array))),
            Err(e) => Err(e),
        };
        let id = match inserted {
            Ok(id) => id,
            Err(e) => {
                self.release_blob(blob);
                return Err(e);
            }
        };
        debug!(path = %self.tree.path_of(id), shape = ?data.shape(), "Created array");
        Ok(id)
    }

    /// Resolve a display path to a node of any kind
    pub fn get_node(&self, path: &str) -> Result<NodeRef<'_>, TreeError> {
        self.ensure_open()?;
        let id = self.resolve(path)?;
        Ok(NodeRef::new(&self.tree, &self.names, id))
    }

    pub fn table(&self, path: &str) -> Result<TableRef<'_>, TreeError> {
        let node = self.get_node(path)?;
        let table = node.node().as_table().ok_or_else(|| TreeError::WrongKind {
            path: path.to_string(),
            expected: "Table",
            actual: node.class().as_str(),
        })?;
        Ok(TableRef::new(
            node,
            table,
            self.store.as_ref(),
            self.config.read_chunk_rows,
        ))
    }

    pub fn table_mut(&mut self, path: &str) -> Result<TableMut<'_>, TreeError> {
        let id = self.table(path)?.node().id();
        let schema = Arc::clone(self.table_node(id)?.schema());
        Ok(TableMut::new(self, id, schema))
    }

    pub fn array(&self, path: &str) -> Result<ArrayRef<'_>, TreeError> {
        let node = self.get_node(path)?;
        let array = node.node().as_array().ok_or_else(|| TreeError::WrongKind {
            path: path.to_string(),
            expected: "Array",
            actual: node.class().as_str(),
        })?;
        Ok(ArrayRef::new(node, array, self.store.as_ref()))
    }

    pub fn array_mut(&mut self, path: &str) -> Result<ArrayMut<'_>, TreeError> {
        let id = self.array(path)?.node().id();
        Ok(ArrayMut::new(self, id))
    }

    /// Rename in place; the node keeps its id and its descendants follow
    pub fn rename_node(&mut self, path: &str, new_name: &str) -> Result<(), TreeError> {
        self.ensure_writable()?;
        let id = self.resolve(path)?;
        let stored = self.names.to_stored_checked(new_name)?.to_string();
        let previous = self.tree.node(id)?.name.clone();
        self.tree.rename(id, &stored)?;
        if let Err(e) = self.persist_catalog() {
            self.tree.rename(id, &previous)?;
            return Err(e);
        }
        debug!(from = %previous, to = %self.tree.path_of(id), "Renamed node");
        Ok(())
    }

    /// Remove a node. Groups with children need `recursive`; the subtree is
    /// destroyed bottom-up and every leaf blob is freed.
    pub fn remove_node(&mut self, path: &str, recursive: bool) -> Result<(), TreeError> {
        self.ensure_writable()?;
        let id = self.resolve(path)?;
        let stored_path = self.tree.path_of(id);
        let removed = self.remove_id(id, recursive)?;
        debug!(path = %stored_path, nodes = removed, "Removed subtree");
        Ok(())
    }

    /// Detach from a copy of the tree and adopt it only once its catalog is
    /// saved. Blobs are freed after that; a failed free leaks the blob but
    /// the removal stands.
    fn remove_id(&mut self, id: NodeId, recursive: bool) -> Result<usize, TreeError> {
        let mut pruned = self.tree.clone();
        let removed = pruned.detach(id, recursive)?;
        catalog::save(self.store.as_mut(), &pruned.to_catalog())?;
        self.tree = pruned;

        for node in &removed {
            let blob = match &node.kind {
                NodeKind::Table(table) => table.blob(),
                NodeKind::Array(array) => array.blob(),
                NodeKind::Group(_) => continue,
            };
            if let Err(e) = self.store.free(blob) {
                warn!(blob = %blob, error = %e, "Failed to free removed node's blob");
            }
        }
        Ok(removed.len())
    }

    /// Groups under `start_path` (included), depth-first
    pub fn walk_groups(&self, start_path: &str) -> Result<GroupWalk<'_>, TreeError> {
        self.ensure_open()?;
        let start = self.resolve(start_path)?;
        Ok(GroupWalk::new(&self.tree, &self.names, start))
    }

    /// Every node under `start_path` (included) matching `filter`
    pub fn walk_nodes(&self, start_path: &str, filter: KindFilter) -> Result<NodeWalk<'_>, TreeError> {
        self.ensure_open()?;
        let start = self.resolve(start_path)?;
        Ok(NodeWalk::new(&self.tree, &self.names, start, filter))
    }

    /// Direct children of a group matching `filter`, in insertion order
    pub fn list_nodes(&self, parent_path: &str, filter: KindFilter) -> Result<Vec<NodeRef<'_>>, TreeError> {
        let parent = self.get_node(parent_path)?;
        if !parent.is_group() {
            return Err(TreeError::NotAGroup(parent_path.to_string()));
        }
        Ok(parent
            .children()
            .into_iter()
            .filter(|child| filter.matches(child.class()))
            .collect())
    }

    /// Flush every table with buffered rows; returns the rows written
    pub fn flush(&mut self) -> Result<usize, TreeError> {
        self.ensure_open()?;
        if !self.mode.is_writable() {
            return Ok(0);
        }
        let dirty: Vec<NodeId> = self
            .tree
            .preorder(self.tree.root())
            .filter(|id| {
                self.tree
                    .get(*id)
                    .and_then(|node| node.as_table())
                    .is_some_and(|table| table.pending_rows() > 0)
            })
            .collect();

        let mut total = 0;
        for id in dirty {
            total += self.flush_node(id)?;
        }
        if total > 0 {
            info!(rows = total, "Flushed file");
        }
        Ok(total)
    }

    /// Flush, save the catalog and close the store. Idempotent; after a
    /// failure the file stays open so the close can be retried.
    pub fn close(&mut self) -> Result<(), TreeError> {
        if self.closed {
            return Ok(());
        }
        if self.mode.is_writable() {
            self.flush()?;
            self.persist_catalog()?;
        }
        self.store.close()?;
        self.closed = true;
        info!(filename = %self.filename, "Closed file");
        Ok(())
    }

    /// Machine readable summary of every node
    pub fn tree_json(&self) -> serde_json::Value {
        let nodes: Vec<serde_json::Value> = self
            .tree
            .preorder(self.tree.root())
            .map(|id| NodeRef::new(&self.tree, &self.names, id).to_json())
            .collect();
        json!({
            "filename": self.filename,
            "mode": self.mode.to_string(),
            "nodes": nodes,
        })
    }

    pub(crate) fn table_node(&self, id: NodeId) -> Result<&Table, TreeError> {
        let node = self.tree.node(id)?;
        node.as_table().ok_or_else(|| TreeError::WrongKind {
            path: self.tree.path_of(id),
            expected: "Table",
            actual: node.class().as_str(),
        })
    }

    /// Buffer one coerced row, flushing once `buffer_rows` rows are pending.
    /// If that flush fails the row is taken back out of the buffer, so an
    /// append that returns an error has no effect.
    pub(crate) fn stage_row(&mut self, id: NodeId, values: &[Value]) -> Result<(), TreeError> {
        self.ensure_writable()?;
        let pending = {
            let table = table_in(&mut self.tree, id)?;
            table.stage(values)?;
            table.pending_rows()
        };
        if pending >= self.config.buffer_rows.max(1) {
            if let Err(e) = self.flush_node(id) {
                table_in(&mut self.tree, id)?.unstage_last();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Write one table's buffer, then save the catalog with the advanced row
    /// count. A failure at either step leaves the row count at its durable
    /// value and the rows buffered.
    pub(crate) fn flush_node(&mut self, id: NodeId) -> Result<usize, TreeError> {
        self.ensure_writable()?;
        let (previous, written) = {
            let table = table_in(&mut self.tree, id)?;
            if table.pending_rows() == 0 {
                return Ok(0);
            }
            let written = table.write_pending(self.store.as_mut())?;
            let previous = table.nrows();
            table.set_nrows(previous + written as u64);
            (previous, written)
        };

        if let Err(e) = self.persist_catalog() {
            table_in(&mut self.tree, id)?.set_nrows(previous);
            return Err(e);
        }
        table_in(&mut self.tree, id)?.clear_pending();
        if self.config.sync_on_flush {
            self.store.sync()?;
        }
        debug!(
            path = %self.tree.path_of(id),
            rows = written,
            nrows = previous + written as u64,
            "Flushed table"
        );
        Ok(written)
    }

    pub(crate) fn write_array(&mut self, id: NodeId, data: &ArrayData) -> Result<(), TreeError> {
        self.ensure_writable()?;
        let node = self.tree.node(id)?;
        let array = node.as_array().ok_or_else(|| TreeError::WrongKind {
            path: self.tree.path_of(id),
            expected: "Array",
            actual: node.class().as_str(),
        })?;
        let bytes = array.encode(data)?;
        self.store.write(array.blob(), 0, &bytes)?;
        if self.config.sync_on_flush {
            self.store.sync()?;
        }
        debug!(path = %self.tree.path_of(id), bytes = bytes.len(), "Rewrote array");
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), TreeError> {
        if self.closed {
            return Err(TreeError::Closed);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), TreeError> {
        self.ensure_open()?;
        if !self.mode.is_writable() {
            return Err(TreeError::ReadOnly);
        }
        Ok(())
    }

    fn resolve(&self, path: &str) -> Result<NodeId, TreeError> {
        let stored = self.names.stored_path(path)?;
        self.tree.resolve(&stored)
    }

    fn insert_node(
        &mut self,
        parent_path: &str,
        name: &str,
        title: &str,
        kind: NodeKind,
    ) -> Result<NodeId, TreeError> {
        let parent = self.resolve(parent_path)?;
        let stored = self.names.to_stored_checked(name)?.to_string();
        let id = self.tree.insert(parent, &stored, title, kind)?;
        if let Err(e) = self.persist_catalog() {
            self.tree.detach(id, true)?;
            return Err(e);
        }
        Ok(id)
    }

    fn persist_catalog(&mut self) -> Result<(), TreeError> {
        catalog::save(self.store.as_mut(), &self.tree.to_catalog())?;
        Ok(())
    }

    fn release_blob(&mut self, blob: BlobHandle) {
        if let Err(e) = self.store.free(blob) {
            warn!(handle = %blob, error = %e, "Failed to release blob");
        }
    }
}

fn table_in(tree: &mut NodeTree, id: NodeId) -> Result<&mut Table, TreeError> {
    let path = tree.path_of(id);
    let node = tree.node_mut(id)?;
    let class = node.class();
    match &mut node.kind {
        NodeKind::Table(table) => Ok(table),
        _ => Err(TreeError::WrongKind {
            path,
            expected: "Table",
            actual: class.as_str(),
        }),
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(filename = %self.filename, error = %e, "Failed to close file on drop");
        }
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (mode '{}')", self.filename, self.mode)?;
        for id in self.tree.preorder(self.tree.root()) {
            writeln!(f, "{}", NodeRef::new(&self.tree, &self.names, id))?;
        }
        Ok(())
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("filename", &self.filename)
            .field("mode", &self.mode)
            .field("nodes", &self.tree.len())
            .field("closed", &self.closed)
            .finish()
    }
}
