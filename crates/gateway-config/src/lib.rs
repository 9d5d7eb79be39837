//! # Gateway Config
//!
//! Configuration for the model gateway.
//!
//! This crate provides:
//! - The [`GatewayConfig`] model and its validation
//! - Loading from YAML, TOML or JSON with environment overrides
//! - [`InMemoryConfigStore`], the snapshot-backed [`gateway_core::ConfigStore`]
//! - [`ConfigWatcher`] for hot reload

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod loader;
pub mod store;
pub mod watcher;

// Re-export main types
pub use config::{
    CallerConfig, GatewayConfig, PlatformConfig, RequestLogConfig, StreamingConfig,
    ENV_LOG_FORMAT, ENV_LOG_LEVEL,
};
pub use error::ConfigError;
pub use loader::{
    config_path_from_env, load_config, load_config_from_env, parse_config, ConfigFormat,
    DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH,
};
pub use store::{InMemoryConfigStore, InMemoryConfigStoreBuilder};
pub use watcher::{reload_from, ConfigWatcher, DEFAULT_DEBOUNCE};
