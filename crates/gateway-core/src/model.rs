//! Pool, entry, platform and caller data.
//!
//! Health tiers are never stored: [`HealthCounters::state`] derives them from
//! the two consecutive-outcome counters, so a tier can only change through
//! [`HealthCounters::record_success`] or [`HealthCounters::record_failure`].

use crate::types::{CallerId, Capability, PlatformId, PoolId};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Health tier of a model entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Serving normally
    Healthy,
    /// Repeated recent failures, still selectable
    Degraded,
    /// Too many consecutive failures, never selected
    Unavailable,
}

impl HealthState {
    /// Selection rank: lower is preferred
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Degraded => 1,
            Self::Unavailable => 2,
        }
    }

    /// Whether an entry in this state may be selected at all
    #[must_use]
    pub fn is_selectable(self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Consecutive-failure thresholds for health tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Consecutive failures at which an entry becomes degraded
    #[serde(default = "default_degraded_after")]
    pub degraded_after: u32,
    /// Consecutive failures at which an entry becomes unavailable
    #[serde(default = "default_unavailable_after")]
    pub unavailable_after: u32,
}

fn default_degraded_after() -> u32 {
    3
}

fn default_unavailable_after() -> u32 {
    5
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded_after: default_degraded_after(),
            unavailable_after: default_unavailable_after(),
        }
    }
}

impl HealthThresholds {
    /// Derive the tier for a consecutive failure count
    #[must_use]
    pub fn state_for(&self, consecutive_failures: u32) -> HealthState {
        if consecutive_failures >= self.unavailable_after {
            HealthState::Unavailable
        } else if consecutive_failures >= self.degraded_after {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        }
    }
}

/// Consecutive outcome counters of one model entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCounters {
    /// Successes since the last failure
    #[serde(default)]
    pub consecutive_successes: u32,
    /// Failures since the last success
    #[serde(default)]
    pub consecutive_failures: u32,
}

impl HealthCounters {
    /// Current tier under the given thresholds
    #[must_use]
    pub fn state(&self, thresholds: &HealthThresholds) -> HealthState {
        thresholds.state_for(self.consecutive_failures)
    }

    /// Apply a successful outcome
    pub fn record_success(&mut self) {
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    /// Apply a failed outcome
    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }

    /// Snapshot including the derived tier
    #[must_use]
    pub fn snapshot(&self, thresholds: &HealthThresholds) -> HealthSnapshot {
        HealthSnapshot {
            state: self.state(thresholds),
            consecutive_successes: self.consecutive_successes,
            consecutive_failures: self.consecutive_failures,
        }
    }
}

/// Point-in-time view of an entry's health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Derived tier
    pub state: HealthState,
    /// Successes since the last failure
    pub consecutive_successes: u32,
    /// Failures since the last success
    pub consecutive_failures: u32,
}

impl From<HealthSnapshot> for HealthCounters {
    fn from(snapshot: HealthSnapshot) -> Self {
        Self {
            consecutive_successes: snapshot.consecutive_successes,
            consecutive_failures: snapshot.consecutive_failures,
        }
    }
}

/// One candidate model inside a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Upstream model name sent in the `model` field
    pub model_id: String,
    /// Platform serving this model
    pub platform_id: PlatformId,
    /// Lower numbers are preferred
    #[serde(default)]
    pub priority: i32,
    /// Persisted counters used to seed the in-process tracker
    #[serde(default)]
    pub health: HealthCounters,
}

impl ModelEntry {
    /// Create an entry with fresh counters
    pub fn new(model_id: impl Into<String>, platform_id: impl Into<PlatformId>, priority: i32) -> Self {
        Self {
            model_id: model_id.into(),
            platform_id: platform_id.into(),
            priority,
            health: HealthCounters::default(),
        }
    }

    /// Stable arena key of this entry inside `pool_id`
    #[must_use]
    pub fn key(&self, pool_id: &PoolId) -> EntryKey {
        EntryKey {
            pool_id: pool_id.clone(),
            model_id: self.model_id.clone(),
            platform_id: self.platform_id.clone(),
        }
    }
}

/// Stable address of a model entry in the health arena
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey {
    /// Owning pool
    pub pool_id: PoolId,
    /// Model name
    pub model_id: String,
    /// Serving platform
    pub platform_id: PlatformId,
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.pool_id, self.model_id, self.platform_id)
    }
}

/// Ordered collection of model entries for one capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPool {
    /// Pool identifier
    pub id: PoolId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Capability served by this pool
    pub capability: Capability,
    /// Ordering among several applicable pools; lower first
    #[serde(default)]
    pub priority: i32,
    /// Whether the pool is a default for its capability
    #[serde(default)]
    pub is_default: bool,
    /// Candidate models
    #[serde(default)]
    pub entries: Vec<ModelEntry>,
}

/// Settings of a platform reached through an exchange transformer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSettings {
    /// Registry key of the transformer
    pub transformer_type: String,
    /// Auth header scheme (`Bearer`, `Key`, `x-api-key`)
    #[serde(default)]
    pub auth_scheme: Option<String>,
    /// Transformer-specific configuration
    #[serde(default)]
    pub transformer_config: serde_json::Value,
}

/// Upstream provider endpoint and credentials
#[derive(Debug, Clone)]
pub struct Platform {
    /// Platform identifier
    pub id: PlatformId,
    /// Display name
    pub name: String,
    /// Base URL, possibly already carrying a version segment
    pub base_url: String,
    /// Adapter type tag (e.g. `openai`, `claude`)
    pub platform_type: String,
    /// API credential
    pub credential: SecretString,
    /// Disabled platforms are skipped during resolution
    pub enabled: bool,
    /// Present when the platform is an exchange
    pub exchange: Option<ExchangeSettings>,
}

impl Platform {
    /// Create an enabled native platform
    pub fn new(
        id: impl Into<PlatformId>,
        base_url: impl Into<String>,
        platform_type: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            base_url: base_url.into(),
            platform_type: platform_type.into(),
            credential: SecretString::new(credential.into()),
            enabled: true,
            exchange: None,
        }
    }

    /// Turn this platform into an exchange target
    #[must_use]
    pub fn with_exchange(mut self, exchange: ExchangeSettings) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Set the display name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether requests go through an exchange transformer
    #[must_use]
    pub fn is_exchange(&self) -> bool {
        self.exchange.is_some()
    }
}

/// A logical client and the dedicated pools it may use per capability.
///
/// A capability present in `capabilities` is registered even when its pool
/// list is empty; such callers resolve through default pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerRegistration {
    /// Caller identifier
    pub caller_id: CallerId,
    /// Dedicated pool ids per capability, in declared order
    #[serde(default)]
    pub capabilities: BTreeMap<Capability, Vec<PoolId>>,
}

impl CallerRegistration {
    /// Create a registration with no capabilities
    pub fn new(caller_id: impl Into<CallerId>) -> Self {
        Self {
            caller_id: caller_id.into(),
            capabilities: BTreeMap::new(),
        }
    }

    /// Register a capability with its dedicated pools
    #[must_use]
    pub fn with_capability(mut self, capability: Capability, pools: Vec<PoolId>) -> Self {
        self.capabilities.insert(capability, pools);
        self
    }

    /// Whether the capability is registered for this caller
    #[must_use]
    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities.contains_key(&capability)
    }

    /// Dedicated pools for the capability (empty when none)
    #[must_use]
    pub fn dedicated_pools(&self, capability: Capability) -> &[PoolId] {
        self.capabilities
            .get(&capability)
            .map_or(&[], Vec::as_slice)
    }
}

/// Fixed per-capability model mapping used when no pool resolves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySlot {
    /// Capability category
    pub capability: Capability,
    /// Model name
    pub model_id: String,
    /// Serving platform
    pub platform_id: PlatformId,
}
