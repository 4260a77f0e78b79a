//! Store configuration
//!
//! Layered with the `config` crate: built-in defaults, then the global
//! `config.toml`, then an explicit file, then `TABLETREE__*` environment
//! variables.

pub mod facade;
pub mod merge {
    pub mod service;
}
pub mod paths {
    pub mod xdg_root;
}
pub mod sources {
    pub mod environment;
    pub mod global_file;
}

pub use facade::ConfigLoader;

use crate::logging::LoggingConfig;
use crate::types::ByteOrder;
use config::ConfigError;
use serde::{Deserialize, Serialize};

/// Byteorder for new leaves when the caller does not choose one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrderSetting {
    #[default]
    Native,
    Little,
    Big,
}

impl ByteOrderSetting {
    pub fn resolve(&self) -> ByteOrder {
        match self {
            ByteOrderSetting::Native => ByteOrder::native(),
            ByteOrderSetting::Little => ByteOrder::Little,
            ByteOrderSetting::Big => ByteOrder::Big,
        }
    }
}

fn default_buffer_rows() -> usize {
    1024
}

fn default_read_chunk_rows() -> usize {
    256
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Buffered rows per table before an automatic flush
    #[serde(default = "default_buffer_rows")]
    pub buffer_rows: usize,

    /// Rows fetched per store read during contiguous iteration
    #[serde(default = "default_read_chunk_rows")]
    pub read_chunk_rows: usize,

    /// Sync the store after every table flush
    #[serde(default = "default_true")]
    pub sync_on_flush: bool,

    #[serde(default)]
    pub default_byteorder: ByteOrderSetting,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            buffer_rows: default_buffer_rows(),
            read_chunk_rows: default_read_chunk_rows(),
            sync_on_flush: default_true(),
            default_byteorder: ByteOrderSetting::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_rows == 0 {
            return Err(ConfigError::Message(
                "buffer_rows must be at least 1".to_string(),
            ));
        }
        if self.read_chunk_rows == 0 {
            return Err(ConfigError::Message(
                "read_chunk_rows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
