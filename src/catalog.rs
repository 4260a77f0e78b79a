//! Catalog persistence
//!
//! The whole node tree (structure, schemas, row counts, array metadata and
//! blob handles) is serialized into one blob referenced by the store's root
//! pointer. Layout: magic `TTRC`, format version (u16 LE), blake3 digest of
//! the payload, bincode payload.
//!
//! A save writes a fresh blob, swings the root pointer to it and only then
//! frees the previous one, so an interrupted save leaves the old catalog
//! readable.

use crate::error::StorageError;
use crate::store::BackingStore;
use crate::tree::Node;
use crate::types::{BlobHandle, NodeId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const CATALOG_MAGIC: &[u8; 4] = b"TTRC";
const CATALOG_VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 32;

/// Persisted snapshot of the node tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub root: NodeId,
    pub next_id: u64,
    pub nodes: Vec<Node>,
}

pub fn encode(catalog: &Catalog) -> Result<Vec<u8>, StorageError> {
    let payload =
        bincode::serialize(catalog).map_err(|e| StorageError::Serialization(e.to_string()))?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(CATALOG_MAGIC);
    bytes.extend_from_slice(&CATALOG_VERSION.to_le_bytes());
    bytes.extend_from_slice(blake3::hash(&payload).as_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub fn decode(bytes: &[u8]) -> Result<Catalog, StorageError> {
    if bytes.len() < HEADER_LEN {
        return Err(StorageError::Corrupt(format!(
            "catalog is {} bytes, shorter than its header",
            bytes.len()
        )));
    }
    if &bytes[..4] != CATALOG_MAGIC {
        return Err(StorageError::Corrupt("bad catalog magic".to_string()));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != CATALOG_VERSION {
        return Err(StorageError::Corrupt(format!(
            "unsupported catalog version {}",
            version
        )));
    }
    let payload = &bytes[HEADER_LEN..];
    if blake3::hash(payload).as_bytes() != &bytes[6..HEADER_LEN] {
        return Err(StorageError::Corrupt("catalog digest mismatch".to_string()));
    }
    bincode::deserialize(payload).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Load the catalog the root pointer refers to, if any
pub fn load(store: &dyn BackingStore) -> Result<Option<Catalog>, StorageError> {
    let handle = match store.root()? {
        Some(handle) => handle,
        None => return Ok(None),
    };
    let len = store.size(handle)?;
    let bytes = store.read(handle, 0, len)?;
    let catalog = decode(&bytes)?;
    debug!(handle = %handle, nodes = catalog.nodes.len(), "Loaded catalog");
    Ok(Some(catalog))
}

/// Write `catalog` to a new blob and make it the root
pub fn save(store: &mut dyn BackingStore, catalog: &Catalog) -> Result<BlobHandle, StorageError> {
    let bytes = encode(catalog)?;
    let previous = store.root()?;
    let handle = store.allocate(0)?;
    if let Err(e) = store.write(handle, 0, &bytes).and_then(|_| store.set_root(handle)) {
        let _ = store.free(handle);
        return Err(e);
    }
    // The new root is already durable; a stale blob is only leaked space
    if let Some(old) = previous {
        if let Err(e) = store.free(old) {
            warn!(handle = %old, error = %e, "Failed to free previous catalog");
        }
    }
    debug!(handle = %handle, bytes = bytes.len(), "Saved catalog");
    Ok(handle)
}
