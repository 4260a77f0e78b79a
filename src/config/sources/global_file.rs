//! Optional per-user config file

use crate::config::paths::xdg_root;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};

/// Add the global `config.toml` if the platform has a config directory and
/// the file exists there.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match xdg_root::global_config_file() {
        Some(path) if path.is_file() => {
            let name = path.to_string_lossy().into_owned();
            Ok(builder.add_source(File::new(&name, FileFormat::Toml).required(false)))
        }
        _ => Ok(builder),
    }
}
