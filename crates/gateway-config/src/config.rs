//! Gateway configuration model.

use crate::error::ConfigError;
use gateway_core::{
    CallerId, CallerRegistration, Capability, ExchangeSettings, HealthThresholds, LegacySlot,
    ModelEntry, ModelPool, PlatformId, PoolId,
};
use gateway_resilience::TimeoutConfig;
use gateway_telemetry::{LogFormat, LoggingConfig};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// Environment variable overriding the log level
pub const ENV_LOG_LEVEL: &str = "GATEWAY_LOG_LEVEL";

/// Environment variable overriding the log format
pub const ENV_LOG_FORMAT: &str = "GATEWAY_LOG_FORMAT";

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Logging setup
    pub logging: LoggingConfig,
    /// Upstream call timeouts
    pub timeouts: TimeoutConfig,
    /// Health tier thresholds
    pub health: HealthThresholds,
    /// Streaming behavior
    pub streaming: StreamingConfig,
    /// Request-log collaborator settings
    pub request_log: RequestLogConfig,
    /// Caller registrations
    pub callers: Vec<CallerConfig>,
    /// Model pools
    pub pools: Vec<ModelPool>,
    /// Upstream platforms
    pub platforms: Vec<PlatformConfig>,
    /// Legacy single-model slots
    pub legacy: Vec<LegacySlot>,
}

/// Streaming behavior
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Remove `<think>` spans from streamed text
    pub strip_think_tags: bool,
    /// Surface reasoning as `Thinking` events
    pub capture_thinking: bool,
    /// Fail a stream that stays silent this long
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Option<Duration>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            strip_think_tags: true,
            capture_thinking: true,
            idle_timeout: None,
        }
    }
}

/// Request-log collaborator settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RequestLogConfig {
    /// Report calls to the request-log sink
    pub enabled: bool,
    /// Characters kept from request and response bodies
    pub max_body_chars: usize,
    /// Upper bound on the sink's `start` call
    #[serde(with = "humantime_serde")]
    pub start_timeout: Duration,
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_body_chars: 2000,
            start_timeout: Duration::from_secs(2),
        }
    }
}

/// Caller registration as written in the file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CallerConfig {
    /// Caller identifier
    pub id: CallerId,
    /// Dedicated pool ids per capability; an empty list still registers the capability
    #[serde(default)]
    pub capabilities: BTreeMap<Capability, Vec<PoolId>>,
}

impl CallerConfig {
    /// Registration handed to the resolver
    #[must_use]
    pub fn to_registration(&self) -> CallerRegistration {
        CallerRegistration {
            caller_id: self.id.clone(),
            capabilities: self.capabilities.clone(),
        }
    }
}

/// Upstream platform as written in the file
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Platform identifier
    pub id: PlatformId,
    /// Display name, defaults to the id
    #[serde(default)]
    pub name: Option<String>,
    /// Base URL
    pub base_url: String,
    /// Adapter type tag (`openai`, `claude`, `exchange`, ...)
    #[serde(rename = "type")]
    pub platform_type: String,
    /// Inline credential
    #[serde(default)]
    pub credential: Option<SecretString>,
    /// Environment variable holding the credential
    #[serde(default)]
    pub credential_env: Option<String>,
    /// Disabled platforms are skipped during resolution
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Exchange settings, for platforms without a native adapter
    #[serde(default)]
    pub exchange: Option<ExchangeSettings>,
}

fn default_true() -> bool {
    true
}

impl GatewayConfig {
    /// Apply `GATEWAY_LOG_LEVEL` and `GATEWAY_LOG_FORMAT`
    ///
    /// # Errors
    /// Returns error if the format variable holds an unknown format
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    pub(crate) fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
            self.logging.level = level;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT).filter(|v| !v.trim().is_empty()) {
            self.logging.format = format.parse::<LogFormat>().map_err(|e| ConfigError::Env {
                var: ENV_LOG_FORMAT.to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Check the configuration for structural problems, reporting all of them
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` listing every problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.health.degraded_after == 0 {
            problems.push("health.degraded_after must be at least 1".to_string());
        }
        if self.health.unavailable_after < self.health.degraded_after {
            problems.push("health.unavailable_after must not be below health.degraded_after".to_string());
        }

        let mut platform_ids = HashSet::new();
        for platform in &self.platforms {
            if !platform_ids.insert(platform.id.as_str()) {
                problems.push(format!("duplicate platform id '{}'", platform.id));
            }
            if platform.base_url.trim().is_empty() {
                problems.push(format!("platform '{}' has an empty base_url", platform.id));
            } else if let Err(e) = url::Url::parse(&platform.base_url) {
                problems.push(format!("platform '{}' has an invalid base_url: {e}", platform.id));
            }
            if let Some(exchange) = &platform.exchange {
                if exchange.transformer_type.trim().is_empty() {
                    problems.push(format!("exchange platform '{}' has no transformer_type", platform.id));
                }
            }
        }

        let mut pool_ids = HashSet::new();
        for pool in &self.pools {
            if !pool_ids.insert(pool.id.as_str()) {
                problems.push(format!("duplicate pool id '{}'", pool.id));
            }
            let mut entries = HashSet::new();
            for entry in &pool.entries {
                check_entry(pool, entry, &platform_ids, &mut entries, &mut problems);
            }
        }

        let mut caller_ids = HashSet::new();
        for caller in &self.callers {
            if !caller_ids.insert(caller.id.as_str()) {
                problems.push(format!("duplicate caller id '{}'", caller.id));
            }
            for (capability, pools) in &caller.capabilities {
                for pool_id in pools {
                    match self.pools.iter().find(|p| p.id == *pool_id) {
                        None => problems.push(format!(
                            "caller '{}' references unknown pool '{pool_id}'",
                            caller.id
                        )),
                        Some(pool) if pool.capability != *capability => problems.push(format!(
                            "caller '{}' binds {capability} to pool '{pool_id}' which serves {}",
                            caller.id, pool.capability
                        )),
                        Some(_) => {}
                    }
                }
            }
        }

        let mut legacy_capabilities = HashSet::new();
        for slot in &self.legacy {
            if !legacy_capabilities.insert(slot.capability) {
                problems.push(format!("duplicate legacy slot for {}", slot.capability));
            }
            if !platform_ids.contains(slot.platform_id.as_str()) {
                problems.push(format!(
                    "legacy slot for {} references unknown platform '{}'",
                    slot.capability, slot.platform_id
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }
}

fn check_entry<'a>(
    pool: &ModelPool,
    entry: &'a ModelEntry,
    platform_ids: &HashSet<&str>,
    seen: &mut HashSet<(&'a str, &'a str)>,
    problems: &mut Vec<String>,
) {
    if entry.model_id.trim().is_empty() {
        problems.push(format!("pool '{}' has an entry without a model", pool.id));
    }
    if !platform_ids.contains(entry.platform_id.as_str()) {
        problems.push(format!(
            "pool '{}' references unknown platform '{}'",
            pool.id, entry.platform_id
        ));
    }
    if !seen.insert((entry.model_id.as_str(), entry.platform_id.as_str())) {
        problems.push(format!(
            "pool '{}' lists {}@{} twice",
            pool.id, entry.model_id, entry.platform_id
        ));
    }
}
