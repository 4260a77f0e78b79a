//! ConfigLoader facade delegating to the merge service.

use super::merge::service::MergeService;
use super::StoreConfig;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the global file (when present) and environment, with an
    /// optional explicit file layered between them.
    pub fn load(path: Option<&Path>) -> Result<StoreConfig, ConfigError> {
        MergeService::load(path)
    }

    /// Load from a specific file with environment overlay; the global file
    /// is skipped.
    pub fn load_from_file(path: &Path) -> Result<StoreConfig, ConfigError> {
        MergeService::load_from_file(path)
    }

    pub fn default() -> StoreConfig {
        StoreConfig::default()
    }

    /// Write `config` as TOML, creating parent directories
    pub fn save(config: &StoreConfig, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Message(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let content = toml::to_string_pretty(config)
            .map_err(|e| ConfigError::Message(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            ConfigError::Message(format!(
                "Failed to write config to {}: {}",
                path.display(),
                e
            ))
        })
    }
}
