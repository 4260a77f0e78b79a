//! MergeService: orchestrates sources and deserializes to StoreConfig.

use crate::config::sources::{environment, global_file};
use crate::config::StoreConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat};
use std::path::Path;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> global file -> explicit file ->
    /// environment (highest).
    pub fn load(path: Option<&Path>) -> Result<StoreConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = match path {
            Some(path) => add_file(builder, path)?,
            None => builder,
        };
        let builder = environment::add_to_builder(builder)?;
        finish(builder)
    }

    pub fn load_from_file(path: &Path) -> Result<StoreConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = add_file(builder, path)?;
        let builder = environment::add_to_builder(builder)?;
        finish(builder)
    }
}

fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&StoreConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}

fn add_file(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let name = path
        .to_str()
        .ok_or_else(|| ConfigError::Message(format!("non UTF-8 config path: {:?}", path)))?;
    Ok(builder.add_source(File::new(name, FileFormat::Toml).required(true)))
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<StoreConfig, ConfigError> {
    let config: StoreConfig = builder.build()?.try_deserialize()?;
    config.validate()?;
    Ok(config)
}
