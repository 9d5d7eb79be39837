//! Configuration errors.

use gateway_core::GatewayError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, validating or applying configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file could not be parsed
    #[error("failed to parse config file '{path}': {message}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// The file extension names no known format
    #[error("unsupported config format '{0}', expected yaml, toml or json")]
    UnsupportedFormat(String),

    /// The configuration is structurally invalid
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// A platform credential could not be resolved
    #[error("platform '{platform}' has no usable credential: {reason}")]
    Credential {
        /// Platform identifier
        platform: String,
        /// What was missing
        reason: String,
    },

    /// An environment override could not be applied
    #[error("invalid value for {var}: {message}")]
    Env {
        /// Variable name
        var: String,
        /// What was wrong
        message: String,
    },

    /// The file watcher could not be started
    #[error("failed to watch config file: {0}")]
    Watch(String),
}

impl From<ConfigError> for GatewayError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}
