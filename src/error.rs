//! Error types
//!
//! `StorageError` covers the backing store; `TreeError` covers the node tree,
//! table and array engines and wraps storage failures unchanged.

use crate::types::BlobHandle;
use std::path::PathBuf;
use thiserror::Error;

/// Backing store failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store does not exist: {0}")]
    Missing(PathBuf),

    #[error("invalid blob handle: {0}")]
    InvalidHandle(BlobHandle),

    #[error("read out of bounds on {handle}: {offset}+{len} exceeds size {size}")]
    OutOfBounds {
        handle: BlobHandle,
        offset: u64,
        len: u64,
        size: u64,
    },

    #[error("store is opened read-only")]
    ReadOnly,

    #[error("store is closed")]
    Closed,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt store: {0}")]
    Corrupt(String),
}

/// Errors raised by tree, table and array operations
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("node not found: {0}")]
    NotFound(String),

    #[error("name conflict: '{name}' already exists in {parent}")]
    NameConflict { parent: String, name: String },

    #[error("group is not empty: {0} (use recursive removal)")]
    NotEmpty(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("not a group: {0}")]
    NotAGroup(String),

    #[error("{path} is a {actual}, expected a {expected}")]
    WrongKind {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("type mismatch for {field}: expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("shape error: {0}")]
    ShapeError(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("invalid slice: {0}")]
    InvalidSlice(String),

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: u64 },

    #[error("invalid translation map: {0}")]
    InvalidTranslation(String),

    #[error("file is opened read-only")]
    ReadOnly,

    #[error("file is closed")]
    Closed,

    #[error("store I/O error: {0}")]
    StoreIOError(#[from] StorageError),
}

impl TreeError {
    pub(crate) fn mismatch(
        field: impl Into<String>,
        expected: impl ToString,
        found: impl ToString,
    ) -> Self {
        TreeError::TypeMismatch {
            field: field.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// Logging initialisation failures
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("logging configuration error: {0}")]
    Config(String),

    #[error("failed to install subscriber: {0}")]
    Init(String),
}
