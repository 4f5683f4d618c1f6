//! Runtime settings for the tunnel controller
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::engine::uapi::DEFAULT_SOCKET_DIR;

/// Prefix of environment variables overriding settings, e.g. `NETSTACK_LOG_LEVEL`
pub const ENV_PREFIX: &str = "NETSTACK";

/// Errors related to loading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("invalid log level: {0}")]
    LogLevel(String),
}

/// Controller settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Name of the interface the engine runs; also names its UAPI socket
    pub interface_name: String,

    /// Directory holding the engine's UAPI sockets
    pub uapi_socket_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Seconds between status reports while a session is up
    pub status_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            interface_name: "wg0".to_string(),
            uapi_socket_dir: PathBuf::from(DEFAULT_SOCKET_DIR),
            log_level: "info".to_string(),
            status_interval_secs: 30,
        }
    }
}

impl Settings {
    /// Load settings from an optional file, then `NETSTACK_*` variables.
    /// Anything left unset keeps its default.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }

        let settings = builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn tracing_level(&self) -> Result<tracing::Level, SettingsError> {
        self.log_level
            .parse()
            .map_err(|_| SettingsError::LogLevel(self.log_level.clone()))
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs.max(1))
    }
}
