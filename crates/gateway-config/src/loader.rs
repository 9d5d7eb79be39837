//! Configuration file loading.

use crate::config::GatewayConfig;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the configuration file
pub const ENV_CONFIG_PATH: &str = "GATEWAY_CONFIG";

/// Path used when `GATEWAY_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "gateway.yaml";

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Format implied by a file extension
    ///
    /// # Errors
    /// Returns `UnsupportedFormat` for unknown or missing extensions
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Parse configuration text
///
/// # Errors
/// Returns `Parse` when the text is not valid for the format
pub fn parse_config(text: &str, format: ConfigFormat, origin: &Path) -> Result<GatewayConfig, ConfigError> {
    let parse_error = |message: String| ConfigError::Parse {
        path: origin.to_path_buf(),
        message,
    };

    match format {
        ConfigFormat::Yaml => serde_yaml::from_str(text).map_err(|e| parse_error(e.to_string())),
        ConfigFormat::Toml => toml::from_str(text).map_err(|e| parse_error(e.to_string())),
        ConfigFormat::Json => serde_json::from_str(text).map_err(|e| parse_error(e.to_string())),
    }
}

/// Load, override from the environment, and validate a configuration file
///
/// # Errors
/// Returns error if the file cannot be read, parsed or validated
pub async fn load_config(path: impl AsRef<Path>) -> Result<GatewayConfig, ConfigError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;

    let text = tokio::fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut config = parse_config(&text, format, path)?;
    config.apply_env_overrides()?;
    config.validate()?;

    info!(
        path = %path.display(),
        platforms = config.platforms.len(),
        pools = config.pools.len(),
        callers = config.callers.len(),
        "Configuration loaded"
    );

    Ok(config)
}

/// Path named by `GATEWAY_CONFIG`, or the default
#[must_use]
pub fn config_path_from_env() -> PathBuf {
    let path = std::env::var(ENV_CONFIG_PATH)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    debug!(path = %path.display(), "Resolved configuration path");
    path
}

/// Load the configuration named by `GATEWAY_CONFIG`
///
/// # Errors
/// Returns error if the file cannot be read, parsed or validated
pub async fn load_config_from_env() -> Result<GatewayConfig, ConfigError> {
    load_config(config_path_from_env()).await
}
