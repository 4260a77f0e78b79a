//! Environment variable source: TABLETREE__* with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
/// `TABLETREE__BUFFER_ROWS=64` sets `buffer_rows`,
/// `TABLETREE__LOGGING__LEVEL=debug` sets `logging.level`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix("TABLETREE")
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder)
}
