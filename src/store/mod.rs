//! Backing Store
//!
//! The sole persistence boundary of the engine: a container of independently
//! growable byte blobs addressed by [`BlobHandle`], plus one root pointer used
//! to locate the catalog. The engine never assumes anything about the
//! physical layout behind this trait.

pub mod memory;
pub mod persistence;

use crate::error::StorageError;
use crate::types::BlobHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use memory::MemoryBackingStore;
pub use persistence::SledBackingStore;

/// How a store is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    /// Existing store, no mutation allowed
    Read,
    /// Create the store, discarding any previous contents
    Write,
    /// Open an existing store for modification, creating it if missing
    Append,
}

impl OpenMode {
    pub fn is_writable(&self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenMode::Read => write!(f, "r"),
            OpenMode::Write => write!(f, "w"),
            OpenMode::Append => write!(f, "a"),
        }
    }
}

/// Blob container interface
pub trait BackingStore: Send {
    fn mode(&self) -> OpenMode;

    /// Allocate a zero-filled blob of `size` bytes
    fn allocate(&mut self, size: u64) -> Result<BlobHandle, StorageError>;

    /// Read exactly `len` bytes starting at `offset`
    fn read(&self, handle: BlobHandle, offset: u64, len: u64) -> Result<Vec<u8>, StorageError>;

    /// Write `bytes` at `offset`, growing the blob (zero-filled) when needed
    fn write(&mut self, handle: BlobHandle, offset: u64, bytes: &[u8]) -> Result<(), StorageError>;

    fn size(&self, handle: BlobHandle) -> Result<u64, StorageError>;

    /// Shrink a blob to `len` bytes; longer lengths leave it unchanged
    fn truncate(&mut self, handle: BlobHandle, len: u64) -> Result<(), StorageError>;

    /// Release a blob; its space may be reused by later allocations
    fn free(&mut self, handle: BlobHandle) -> Result<(), StorageError>;

    /// Root pointer, set by the catalog
    fn root(&self) -> Result<Option<BlobHandle>, StorageError>;

    fn set_root(&mut self, handle: BlobHandle) -> Result<(), StorageError>;

    /// Make all completed writes durable
    fn sync(&mut self) -> Result<(), StorageError>;

    /// Sync and release the store; later calls fail with `Closed`
    fn close(&mut self) -> Result<(), StorageError>;
}

/// Bounds check shared by the implementations
pub(crate) fn check_range(
    handle: BlobHandle,
    offset: u64,
    len: u64,
    size: u64,
) -> Result<std::ops::Range<usize>, StorageError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(offset as usize..end as usize),
        _ => Err(StorageError::OutOfBounds {
            handle,
            offset,
            len,
            size,
        }),
    }
}

/// Overwrite `bytes` into `blob` at `offset`, growing it with zeros
pub(crate) fn splice_into(blob: &mut Vec<u8>, offset: u64, bytes: &[u8]) {
    let start = offset as usize;
    let end = start + bytes.len();
    if blob.len() < end {
        blob.resize(end, 0);
    }
    blob[start..end].copy_from_slice(bytes);
}
