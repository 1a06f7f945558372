// src/config/models.rs
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("port must be between 1 and 65535")]
    InvalidPort,

    #[error("at least one upstream server is required")]
    NoServers,

    #[error("invalid upstream server {server:?}: {reason}")]
    InvalidServer { server: String, reason: String },
}

/// Process-wide settings. Built once at startup and shared read-only behind an `Arc`.
///
/// Keys are PascalCase (`Port`, `Servers`, ...) with snake_case aliases.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    #[serde(alias = "port")]
    pub port: u16,

    /// Mirror base URLs, probed in this order.
    #[serde(default, alias = "servers")]
    pub servers: Vec<String>,

    /// Accepted for compatibility with existing config files. Not used.
    #[serde(default, alias = "use_includes")]
    pub use_includes: bool,

    /// Probe and fetch-header timeout in milliseconds. `0` disables it.
    #[serde(default, alias = "timeout")]
    pub timeout: u64,

    /// Maximum gap between body chunks in milliseconds. `0` disables it.
    #[serde(default, alias = "idle_timeout")]
    pub idle_timeout: u64,

    #[serde(default, alias = "metrics_port")]
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }

        for server in &self.servers {
            let url = Url::parse(server).map_err(|e| ConfigError::InvalidServer {
                server: server.clone(),
                reason: e.to_string(),
            })?;

            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidServer {
                    server: server.clone(),
                    reason: format!("unsupported scheme {}", url.scheme()),
                });
            }

            // Paths are appended verbatim, so "http://host/" + "/file" gives "//file".
            if server.ends_with('/') {
                tracing::warn!(%server, "server has a trailing slash; resolved URLs will contain '//'");
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        millis(self.timeout)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        millis(self.idle_timeout)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
