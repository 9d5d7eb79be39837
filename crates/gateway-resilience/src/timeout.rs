//! Timeout policy.

use gateway_core::{Capability, GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Upstream call timeouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Timeout for text capabilities
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub default: Duration,

    /// Timeout for generation calls
    #[serde(with = "humantime_serde", default = "default_generation_timeout")]
    pub generation: Duration,

    /// Per-capability overrides
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub overrides: HashMap<Capability, HumanDuration>,
}

/// Duration parsed from a human-readable string such as `90s`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HumanDuration(#[serde(with = "humantime_serde")] pub Duration);

fn default_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_generation_timeout() -> Duration {
    Duration::from_secs(600)
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default: default_timeout(),
            generation: default_generation_timeout(),
            overrides: HashMap::new(),
        }
    }
}

impl TimeoutConfig {
    /// Timeout for a call; a per-request override always wins
    #[must_use]
    pub fn timeout_for(&self, capability: Capability, request_override: Option<Duration>) -> Duration {
        if let Some(timeout) = request_override {
            return timeout;
        }
        if let Some(HumanDuration(timeout)) = self.overrides.get(&capability) {
            return *timeout;
        }
        if capability.is_generation() {
            self.generation
        } else {
            self.default
        }
    }
}

/// Run an upstream future under a deadline
///
/// # Errors
/// Returns an upstream timeout error for `platform_id` when the deadline
/// passes, otherwise whatever the future returns
pub async fn run_with_timeout<T, F>(
    platform_id: &str,
    timeout: Duration,
    future: F,
) -> GatewayResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    tokio::time::timeout(timeout, future).await.map_err(|_| {
        GatewayError::upstream_timeout(
            platform_id,
            format!("no response within {}s", timeout.as_secs_f64()),
        )
    })?
}
