//! Four-tier model resolution.
//!
//! A `(caller, capability)` pair resolves through, in order:
//!
//! 1. the caller's dedicated pools, by pool priority
//! 2. the default pools of the capability, by pool priority
//! 3. the legacy single-model slot of the capability
//! 4. `NotFound`
//!
//! The first tier that yields a usable entry wins. Nothing is retried within
//! a call: an entry that fails only affects the next resolution.

use crate::selector::rank_candidates;
use gateway_core::{
    Capability, ConfigStore, EntryKey, EntrySnapshot, GatewayResult, HealthCounters, HealthSnapshot,
    ModelPool, PoolSnapshot, ResolutionResult, ResolutionType, ResolvedTarget,
};
use gateway_resilience::HealthTracker;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Fallback reason when dedicated pools existed but yielded nothing
pub const NO_USABLE_DEDICATED_MODEL: &str = "no usable dedicated model";

/// Fallback reason when pools existed but none yielded a model.
///
/// A legacy resolution is a fallback only when some pool tier was skipped.
/// A capability with neither dedicated nor default pools has the legacy slot
/// as its only option, so that resolution carries no fallback reason and
/// `is_fallback` stays false.
pub const NO_USABLE_POOLED_MODEL: &str = "no usable pooled model";

/// Resolves callers to concrete upstream targets and tracks their health
pub struct ModelResolver {
    store: Arc<dyn ConfigStore>,
    tracker: Arc<HealthTracker>,
}

impl std::fmt::Debug for ModelResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelResolver")
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl ModelResolver {
    /// Create a resolver over a configuration store and a health arena
    pub fn new(store: Arc<dyn ConfigStore>, tracker: Arc<HealthTracker>) -> Self {
        Self { store, tracker }
    }

    /// Health arena used by this resolver
    #[must_use]
    pub fn tracker(&self) -> &Arc<HealthTracker> {
        &self.tracker
    }

    /// Configuration store used by this resolver
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// Resolve a caller and capability to a target.
    ///
    /// Exhausting every tier is not an error: it returns a result with
    /// `ResolutionType::NotFound`.
    ///
    /// # Errors
    /// Returns error only when the configuration store fails
    #[instrument(skip(self), fields(caller = %caller_id, capability = %capability))]
    pub async fn resolve(
        &self,
        caller_id: &str,
        capability: Capability,
        expected_model: Option<&str>,
    ) -> GatewayResult<ResolutionResult> {
        let expected_model = expected_model.map(str::to_string);

        let dedicated_ids = self
            .store
            .caller(caller_id)
            .await?
            .map(|caller| caller.dedicated_pools(capability).to_vec())
            .unwrap_or_default();
        let had_dedicated = !dedicated_ids.is_empty();

        let dedicated = if had_dedicated {
            sorted_by_priority(self.store.pools(&dedicated_ids).await?)
        } else {
            Vec::new()
        };
        let original_pools = self.snapshot_pools(&dedicated);

        if let Some(target) = self.select_from_pools(&dedicated).await? {
            return Ok(self.resolved(
                ResolutionType::DedicatedPool,
                target,
                None,
                original_pools,
                expected_model,
            ));
        }

        let defaults = sorted_by_priority(self.store.default_pools(capability).await?);
        if let Some(target) = self.select_from_pools(&defaults).await? {
            let reason = had_dedicated.then_some(NO_USABLE_DEDICATED_MODEL);
            return Ok(self.resolved(
                ResolutionType::DefaultPool,
                target,
                reason,
                original_pools,
                expected_model,
            ));
        }

        if let Some(target) = self.legacy_target(capability).await? {
            let reason = if had_dedicated {
                Some(NO_USABLE_DEDICATED_MODEL)
            } else if defaults.is_empty() {
                None
            } else {
                Some(NO_USABLE_POOLED_MODEL)
            };
            return Ok(self.resolved(
                ResolutionType::Legacy,
                target,
                reason,
                original_pools,
                expected_model,
            ));
        }

        let message =
            format!("no model available for caller '{caller_id}' and capability '{capability}'");
        warn!(
            dedicated_pools = dedicated.len(),
            default_pools = defaults.len(),
            "Model resolution exhausted all tiers"
        );
        Ok(ResolutionResult::not_found(
            message,
            original_pools,
            expected_model,
        ))
    }

    /// Record a successful call against the resolved entry.
    ///
    /// Legacy targets have no entry and record nothing.
    pub fn record_success(&self, target: &ResolvedTarget) -> Option<HealthSnapshot> {
        target
            .entry
            .as_ref()
            .map(|key| self.tracker.record_success(key, seed_of(target)))
    }

    /// Record a failed call against the resolved entry.
    ///
    /// Legacy targets have no entry and record nothing.
    pub fn record_failure(&self, target: &ResolvedTarget) -> Option<HealthSnapshot> {
        target
            .entry
            .as_ref()
            .map(|key| self.tracker.record_failure(key, seed_of(target)))
    }

    /// Return an entry to healthy regardless of its counters
    pub fn reset_health(&self, key: &EntryKey) -> HealthSnapshot {
        info!(entry = %key, "Model health reset");
        self.tracker.reset(key)
    }

    /// Health of every entry observed so far
    #[must_use]
    pub fn health_snapshots(&self) -> Vec<(EntryKey, HealthSnapshot)> {
        self.tracker.snapshots()
    }

    fn resolved(
        &self,
        resolution_type: ResolutionType,
        target: ResolvedTarget,
        fallback_reason: Option<&str>,
        original_pools: Vec<PoolSnapshot>,
        expected_model: Option<String>,
    ) -> ResolutionResult {
        let result = ResolutionResult {
            resolution_type,
            target: Some(target),
            is_fallback: fallback_reason.is_some(),
            fallback_reason: fallback_reason.map(str::to_string),
            original_pools,
            expected_model,
            error: None,
        };

        info!(
            resolution = %result.resolution_type,
            model = result.actual_model().unwrap_or_default(),
            is_fallback = result.is_fallback,
            expected_model_matched = ?result.matches_expected(),
            "Model resolved"
        );
        result
    }

    async fn select_from_pools(&self, pools: &[ModelPool]) -> GatewayResult<Option<ResolvedTarget>> {
        for pool in pools {
            if let Some(target) = self.select_from_pool(pool).await? {
                return Ok(Some(target));
            }
            debug!(pool = %pool.id, "Pool yielded no usable model");
        }
        Ok(None)
    }

    async fn select_from_pool(&self, pool: &ModelPool) -> GatewayResult<Option<ResolvedTarget>> {
        let candidates: Vec<_> = rank_candidates(pool, &self.tracker)
            .into_iter()
            .map(|c| (c.entry.model_id.clone(), c.entry.platform_id.clone(), c.key, c.health))
            .collect();

        for (model_id, platform_id, key, health) in candidates {
            match self.store.platform(&platform_id).await? {
                Some(platform) if platform.enabled => {
                    debug!(entry = %key, state = %health.state, "Selected pool entry");
                    return Ok(Some(ResolvedTarget {
                        model_id,
                        platform,
                        pool_id: Some(pool.id.clone()),
                        pool_name: Some(pool_display_name(pool)),
                        entry: Some(key),
                        health: Some(health),
                    }));
                }
                Some(_) => debug!(entry = %key, "Platform disabled, skipping entry"),
                None => warn!(entry = %key, "Platform not found, skipping entry"),
            }
        }

        Ok(None)
    }

    async fn legacy_target(&self, capability: Capability) -> GatewayResult<Option<ResolvedTarget>> {
        let Some(slot) = self.store.legacy_slot(capability).await? else {
            return Ok(None);
        };

        match self.store.platform(&slot.platform_id).await? {
            Some(platform) if platform.enabled => Ok(Some(ResolvedTarget {
                model_id: slot.model_id,
                platform,
                pool_id: None,
                pool_name: None,
                entry: None,
                health: None,
            })),
            _ => {
                warn!(
                    platform = %slot.platform_id,
                    model = %slot.model_id,
                    "Legacy slot platform unavailable"
                );
                Ok(None)
            }
        }
    }

    fn snapshot_pools(&self, pools: &[ModelPool]) -> Vec<PoolSnapshot> {
        pools
            .iter()
            .map(|pool| PoolSnapshot {
                pool_id: pool.id.clone(),
                pool_name: pool_display_name(pool),
                priority: pool.priority,
                entries: pool
                    .entries
                    .iter()
                    .map(|entry| EntrySnapshot {
                        model_id: entry.model_id.clone(),
                        platform_id: entry.platform_id.clone(),
                        priority: entry.priority,
                        health: self.tracker.observe(&entry.key(&pool.id), entry.health),
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Counters the target was selected with, seeding an entry the tracker lost
fn seed_of(target: &ResolvedTarget) -> HealthCounters {
    target.health.map(HealthCounters::from).unwrap_or_default()
}

fn sorted_by_priority(mut pools: Vec<ModelPool>) -> Vec<ModelPool> {
    pools.sort_by_key(|pool| pool.priority);
    pools
}

fn pool_display_name(pool: &ModelPool) -> String {
    if pool.name.is_empty() {
        pool.id.to_string()
    } else {
        pool.name.clone()
    }
}
