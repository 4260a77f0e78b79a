//! Volatile in-memory store.
//!
//! Clones share the same contents, which lets a session be closed and
//! "reopened" against the same memory with [`MemoryBackingStore::reopen`].
//! Freed handles go on a free list and are handed out again first.

use super::{check_range, splice_into, BackingStore, OpenMode};
use crate::error::StorageError;
use crate::types::BlobHandle;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryContents {
    blobs: HashMap<u64, Vec<u8>>,
    free: Vec<u64>,
    next: u64,
    root: Option<BlobHandle>,
}

#[derive(Debug, Clone)]
pub struct MemoryBackingStore {
    contents: Arc<RwLock<MemoryContents>>,
    mode: OpenMode,
    closed: bool,
}

impl Default for MemoryBackingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackingStore {
    /// Empty store opened for writing
    pub fn new() -> Self {
        Self {
            contents: Arc::new(RwLock::new(MemoryContents::default())),
            mode: OpenMode::Write,
            closed: false,
        }
    }

    /// New handle over the same contents; `Write` discards them
    pub fn reopen(&self, mode: OpenMode) -> Self {
        if mode == OpenMode::Write {
            *self.contents.write() = MemoryContents::default();
        }
        Self {
            contents: Arc::clone(&self.contents),
            mode,
            closed: false,
        }
    }

    /// Number of live blobs
    pub fn blob_count(&self) -> usize {
        self.contents.read().blobs.len()
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), StorageError> {
        self.ensure_open()?;
        if !self.mode.is_writable() {
            return Err(StorageError::ReadOnly);
        }
        Ok(())
    }
}

impl BackingStore for MemoryBackingStore {
    fn mode(&self) -> OpenMode {
        self.mode
    }

    fn allocate(&mut self, size: u64) -> Result<BlobHandle, StorageError> {
        self.ensure_writable()?;
        let mut contents = self.contents.write();
        let id = match contents.free.pop() {
            Some(id) => id,
            None => {
                let id = contents.next;
                contents.next += 1;
                id
            }
        };
        contents.blobs.insert(id, vec![0u8; size as usize]);
        Ok(BlobHandle(id))
    }

    fn read(&self, handle: BlobHandle, offset: u64, len: u64) -> Result<Vec<u8>, StorageError> {
        self.ensure_open()?;
        let contents = self.contents.read();
        let blob = contents
            .blobs
            .get(&handle.0)
            .ok_or(StorageError::InvalidHandle(handle))?;
        let range = check_range(handle, offset, len, blob.len() as u64)?;
        Ok(blob[range].to_vec())
    }

    fn write(&mut self, handle: BlobHandle, offset: u64, bytes: &[u8]) -> Result<(), StorageError> {
        self.ensure_writable()?;
        let mut contents = self.contents.write();
        let blob = contents
            .blobs
            .get_mut(&handle.0)
            .ok_or(StorageError::InvalidHandle(handle))?;
        splice_into(blob, offset, bytes);
        Ok(())
    }

    fn size(&self, handle: BlobHandle) -> Result<u64, StorageError> {
        self.ensure_open()?;
        self.contents
            .read()
            .blobs
            .get(&handle.0)
            .map(|blob| blob.len() as u64)
            .ok_or(StorageError::InvalidHandle(handle))
    }

    fn truncate(&mut self, handle: BlobHandle, len: u64) -> Result<(), StorageError> {
        self.ensure_writable()?;
        let mut contents = self.contents.write();
        let blob = contents
            .blobs
            .get_mut(&handle.0)
            .ok_or(StorageError::InvalidHandle(handle))?;
        blob.truncate(len as usize);
        Ok(())
    }

    fn free(&mut self, handle: BlobHandle) -> Result<(), StorageError> {
        self.ensure_writable()?;
        let mut contents = self.contents.write();
        contents
            .blobs
            .remove(&handle.0)
            .ok_or(StorageError::InvalidHandle(handle))?;
        contents.free.push(handle.0);
        Ok(())
    }

    fn root(&self) -> Result<Option<BlobHandle>, StorageError> {
        self.ensure_open()?;
        Ok(self.contents.read().root)
    }

    fn set_root(&mut self, handle: BlobHandle) -> Result<(), StorageError> {
        self.ensure_writable()?;
        self.contents.write().root = Some(handle);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        self.ensure_open()
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.closed = true;
        Ok(())
    }
}
