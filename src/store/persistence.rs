//! Sled-backed persistent store.
//!
//! Blobs are split into fixed-size pages in the `blobs` tree, keyed by
//! big-endian `(handle, page)`, so a read or write only touches the pages its
//! byte range covers. Blob lengths live in the `sizes` tree and the root
//! pointer in the `meta` tree. Pages past the written end of a blob may be
//! missing or short; those bytes read as zero. Handles come from sled's
//! monotonic id generator so they are never reissued while the database
//! exists.

use super::{check_range, BackingStore, OpenMode};
use crate::error::StorageError;
use crate::types::BlobHandle;
use std::path::{Path, PathBuf};
use tracing::debug;

const BLOBS_TREE: &str = "blobs";
const SIZES_TREE: &str = "sizes";
const META_TREE: &str = "meta";
const ROOT_KEY: &[u8] = b"root";

/// Bytes per stored page
pub const PAGE_SIZE: u64 = 16 * 1024;

pub struct SledBackingStore {
    db: sled::Db,
    blobs: sled::Tree,
    sizes: sled::Tree,
    meta: sled::Tree,
    path: PathBuf,
    mode: OpenMode,
    closed: bool,
}

impl SledBackingStore {
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self, StorageError> {
        if mode == OpenMode::Read && !path.exists() {
            return Err(StorageError::Missing(path.to_path_buf()));
        }

        let db = sled::open(path)?;
        let blobs = db.open_tree(BLOBS_TREE)?;
        let sizes = db.open_tree(SIZES_TREE)?;
        let meta = db.open_tree(META_TREE)?;

        if mode == OpenMode::Write {
            blobs.clear()?;
            sizes.clear()?;
            meta.clear()?;
            db.flush()?;
        }

        debug!(path = %path.display(), mode = %mode, "Opened sled backing store");

        Ok(Self {
            db,
            blobs,
            sizes,
            meta,
            path: path.to_path_buf(),
            mode,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key(handle: BlobHandle) -> [u8; 8] {
        handle.0.to_be_bytes()
    }

    fn page_key(handle: BlobHandle, page: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(16);
        key.extend_from_slice(&handle.0.to_be_bytes());
        key.extend_from_slice(&page.to_be_bytes());
        key
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

    fn blob_size(&self, handle: BlobHandle) -> Result<u64, StorageError> {
        let raw = self
            .sizes
            .get(Self::key(handle))?
            .ok_or(StorageError::InvalidHandle(handle))?;
        let bytes = <[u8; 8]>::try_from(&raw[..]).map_err(|_| {
            StorageError::Corrupt(format!("size of {} has {} bytes", handle, raw.len()))
        })?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn set_size(&self, handle: BlobHandle, len: u64) -> Result<(), StorageError> {
        self.sizes.insert(Self::key(handle), &len.to_be_bytes()[..])?;
        Ok(())
    }

    /// Stored bytes of one page; may be shorter than `PAGE_SIZE`
    fn load_page(&self, handle: BlobHandle, page: u64) -> Result<Vec<u8>, StorageError> {
        Ok(self
            .blobs
            .get(Self::page_key(handle, page))?
            .map(|bytes| bytes.to_vec())
            .unwrap_or_default())
    }
}

impl BackingStore for SledBackingStore {
    fn mode(&self) -> OpenMode {
        self.mode
    }

    fn allocate(&mut self, size: u64) -> Result<BlobHandle, StorageError> {
        self.ensure_writable()?;
        let handle = BlobHandle(self.db.generate_id()?);
        self.sizes.insert(Self::key(handle), &size.to_be_bytes()[..])?;
        Ok(handle)
    }

    fn read(&self, handle: BlobHandle, offset: u64, len: u64) -> Result<Vec<u8>, StorageError> {
        self.ensure_open()?;
        let size = self.blob_size(handle)?;
        check_range(handle, offset, len, size)?;

        let mut out = vec![0u8; len as usize];
        let end = offset + len;
        let mut pos = offset;
        while pos < end {
            let page = pos / PAGE_SIZE;
            let page_start = page * PAGE_SIZE;
            let from = (pos - page_start) as usize;
            let to = ((end - page_start).min(PAGE_SIZE)) as usize;
            if let Some(stored) = self.blobs.get(Self::page_key(handle, page))? {
                let available = stored.len().min(to);
                if from < available {
                    let dest = (pos - offset) as usize;
                    out[dest..dest + (available - from)].copy_from_slice(&stored[from..available]);
                }
            }
            pos = page_start + to as u64;
        }
        Ok(out)
    }

    fn write(&mut self, handle: BlobHandle, offset: u64, bytes: &[u8]) -> Result<(), StorageError> {
        self.ensure_writable()?;
        let size = self.blob_size(handle)?;
        let end = offset + bytes.len() as u64;

        let mut batch = sled::Batch::default();
        let mut pos = offset;
        while pos < end {
            let page = pos / PAGE_SIZE;
            let page_start = page * PAGE_SIZE;
            let from = (pos - page_start) as usize;
            let to = ((end - page_start).min(PAGE_SIZE)) as usize;
            let src = (pos - offset) as usize;

            let mut stored = if from == 0 && to as u64 == PAGE_SIZE {
                Vec::new()
            } else {
                self.load_page(handle, page)?
            };
            if stored.len() < to {
                stored.resize(to, 0);
            }
            stored[from..to].copy_from_slice(&bytes[src..src + (to - from)]);
            batch.insert(Self::page_key(handle, page), stored);
            pos = page_start + to as u64;
        }
        if end > size {
            self.set_size(handle, end)?;
        }
        self.blobs.apply_batch(batch)?;
        Ok(())
    }

    fn size(&self, handle: BlobHandle) -> Result<u64, StorageError> {
        self.ensure_open()?;
        self.blob_size(handle)
    }

    fn truncate(&mut self, handle: BlobHandle, len: u64) -> Result<(), StorageError> {
        self.ensure_writable()?;
        let size = self.blob_size(handle)?;
        if len >= size {
            return Ok(());
        }
        let keep_pages = len.div_ceil(PAGE_SIZE);
        let mut batch = sled::Batch::default();
        for entry in self.blobs.range(Self::page_key(handle, keep_pages)..Self::page_key(handle, u64::MAX)) {
            let (key, _) = entry?;
            batch.remove(key);
        }
        let tail = len % PAGE_SIZE;
        if tail != 0 {
            let last = len / PAGE_SIZE;
            let mut stored = self.load_page(handle, last)?;
            if stored.len() as u64 > tail {
                stored.truncate(tail as usize);
                batch.insert(Self::page_key(handle, last), stored);
            }
        }
        self.blobs.apply_batch(batch)?;
        self.set_size(handle, len)?;
        Ok(())
    }

    fn free(&mut self, handle: BlobHandle) -> Result<(), StorageError> {
        self.ensure_writable()?;
        self.sizes
            .remove(Self::key(handle))?
            .ok_or(StorageError::InvalidHandle(handle))?;
        let mut batch = sled::Batch::default();
        for entry in self.blobs.scan_prefix(Self::key(handle)) {
            let (key, _) = entry?;
            batch.remove(key);
        }
        self.blobs.apply_batch(batch)?;
        Ok(())
    }

    fn root(&self) -> Result<Option<BlobHandle>, StorageError> {
        self.ensure_open()?;
        match self.meta.get(ROOT_KEY)? {
            Some(raw) => {
                let bytes = <[u8; 8]>::try_from(&raw[..]).map_err(|_| {
                    StorageError::Corrupt(format!("root pointer has {} bytes", raw.len()))
                })?;
                Ok(Some(BlobHandle(u64::from_be_bytes(bytes))))
            }
            None => Ok(None),
        }
    }

    fn set_root(&mut self, handle: BlobHandle) -> Result<(), StorageError> {
        self.ensure_writable()?;
        self.meta.insert(ROOT_KEY, &Self::key(handle)[..])?;
        Ok(())
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        self.ensure_open()?;
        if self.mode.is_writable() {
            self.db.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        if self.closed {
            return Ok(());
        }
        self.sync()?;
        self.closed = true;
        debug!(path = %self.path.display(), "Closed sled backing store");
        Ok(())
    }
}
