//! Platform directories for configuration and state.

use std::path::PathBuf;

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "tabletree", "tabletree")
}

/// Per-user configuration directory, e.g. `~/.config/tabletree`
pub fn config_home() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn global_config_file() -> Option<PathBuf> {
    config_home().map(|dir| dir.join("config.toml"))
}

/// Per-user state directory; falls back to the data directory on platforms
/// without one
pub fn state_home() -> Option<PathBuf> {
    project_dirs().map(|dirs| {
        dirs.state_dir()
            .unwrap_or_else(|| dirs.data_local_dir())
            .to_path_buf()
    })
}
