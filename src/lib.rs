//! Tabletree: hierarchical tables and arrays on a blob store
//!
//! A file holds a tree of groups whose leaves are tables (fixed-width,
//! append-only record sequences with a declared schema) and homogeneous
//! N-dimensional arrays. The whole tree lives in a pluggable backing store:
//! sled on disk, or memory.

pub mod array;
pub mod catalog;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod logging;
pub mod schema;
pub mod session;
pub mod store;
pub mod table;
pub mod translation;
pub mod tree;
pub mod types;
pub mod value;

pub use array::{ArrayData, ArrayMut, ArrayRef, Nested};
pub use concurrency::SharedFile;
pub use config::{ByteOrderSetting, ConfigLoader, StoreConfig};
pub use error::{LoggingError, StorageError, TreeError};
pub use schema::{FieldShape, FieldSpec, SchemaDescriptor};
pub use session::{File, TableOptions};
pub use store::{BackingStore, MemoryBackingStore, OpenMode, SledBackingStore};
pub use table::{RowCursor, RowIter, RowView, Slice, TableMut, TableRef};
pub use translation::TranslationMap;
pub use tree::{GroupWalk, KindFilter, NodeClass, NodeRef, NodeWalk};
pub use types::{BlobHandle, ByteOrder, NodeId};
pub use value::{ScalarType, Value};
