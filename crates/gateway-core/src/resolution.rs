//! Resolution results.

use crate::chunk::StreamStart;
use crate::model::{EntryKey, HealthSnapshot, Platform};
use crate::types::{PlatformId, PoolId, RequestId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which tier produced the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    /// A pool dedicated to the caller
    DedicatedPool,
    /// A default pool for the capability
    DefaultPool,
    /// The fixed per-capability slot
    Legacy,
    /// Nothing resolved
    NotFound,
}

impl fmt::Display for ResolutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DedicatedPool => write!(f, "dedicated_pool"),
            Self::DefaultPool => write!(f, "default_pool"),
            Self::Legacy => write!(f, "legacy"),
            Self::NotFound => write!(f, "not_found"),
        }
    }
}

/// One entry of a pool snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    /// Model name
    pub model_id: String,
    /// Serving platform
    pub platform_id: PlatformId,
    /// Entry priority
    pub priority: i32,
    /// Health at resolution time
    pub health: HealthSnapshot,
}

/// Pool state captured at resolution time, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Pool identifier
    pub pool_id: PoolId,
    /// Pool name
    pub pool_name: String,
    /// Pool priority
    pub priority: i32,
    /// Entries with their health
    pub entries: Vec<EntrySnapshot>,
}

/// Concrete upstream target chosen by the resolver
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    /// Model name to inject into the request
    pub model_id: String,
    /// Platform with credentials
    pub platform: Arc<Platform>,
    /// Pool that produced the model (absent for legacy)
    pub pool_id: Option<PoolId>,
    /// Pool name (absent for legacy)
    pub pool_name: Option<String>,
    /// Health arena key (absent for legacy)
    pub entry: Option<EntryKey>,
    /// Health at selection time (absent for legacy)
    pub health: Option<HealthSnapshot>,
}

/// Decision record of one resolution. Never mutated after it is returned.
#[derive(Debug, Clone)]
pub struct ResolutionResult {
    /// Tier that produced the target
    pub resolution_type: ResolutionType,
    /// Chosen target; `None` exactly when `resolution_type` is `NotFound`
    pub target: Option<ResolvedTarget>,
    /// Whether a preferred tier existed but yielded nothing
    pub is_fallback: bool,
    /// Human-readable reason for the fallback
    pub fallback_reason: Option<String>,
    /// Snapshot of the originally preferred (dedicated) pools
    pub original_pools: Vec<PoolSnapshot>,
    /// Caller-provided hint, never binding
    pub expected_model: Option<String>,
    /// Why resolution failed, for `NotFound`
    pub error: Option<String>,
}

impl ResolutionResult {
    /// A failed resolution
    pub fn not_found(
        error: impl Into<String>,
        original_pools: Vec<PoolSnapshot>,
        expected_model: Option<String>,
    ) -> Self {
        Self {
            resolution_type: ResolutionType::NotFound,
            target: None,
            is_fallback: false,
            fallback_reason: None,
            original_pools,
            expected_model,
            error: Some(error.into()),
        }
    }

    /// Whether a target was found
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.target.is_some()
    }

    /// Model name of the target
    #[must_use]
    pub fn actual_model(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.model_id.as_str())
    }

    /// Whether the actual model equals the caller's hint (`None` without a hint or target)
    #[must_use]
    pub fn matches_expected(&self) -> Option<bool> {
        let expected = self.expected_model.as_deref()?;
        let actual = self.actual_model()?;
        Some(expected.eq_ignore_ascii_case(actual))
    }

    /// Metadata for the `Start` event
    #[must_use]
    pub fn stream_start(&self, request_id: &RequestId) -> Option<StreamStart> {
        let target = self.target.as_ref()?;
        Some(StreamStart {
            request_id: request_id.clone(),
            model_id: target.model_id.clone(),
            platform_id: target.platform.id.to_string(),
            platform_name: target.platform.name.clone(),
            resolution_type: self.resolution_type,
            is_fallback: self.is_fallback,
            fallback_reason: self.fallback_reason.clone(),
            pool_name: target.pool_name.clone(),
        })
    }
}
