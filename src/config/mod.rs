// src/config/mod.rs
mod models;

pub use models::*;

use std::path::Path;

/// Default location of the configuration file when no CLI argument is given.
pub const DEFAULT_CONFIG_PATH: &str = "./config.toml";

/// Load configuration from a TOML file and validate it.
///
/// Both `Port` and `port` spellings are accepted, see [`Config`].
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    let settings = ::config::Config::builder()
        .add_source(::config::File::from(path).format(::config::FileFormat::Toml))
        .build()?;

    let config: Config = settings.try_deserialize()?;
    config.validate()?;

    tracing::debug!(
        path = %path.display(),
        servers = config.servers.len(),
        timeout_ms = config.timeout,
        "configuration loaded"
    );
    Ok(config)
}
