//! Per-entry health tracking.
//!
//! Every model entry gets one slot in the tracker, keyed by its stable
//! [`EntryKey`]. Outcomes are applied under the slot's shard lock, so two
//! concurrent failures always move the counter by two and never race
//! each other. Persisted counters from configuration seed a slot the first
//! time the entry is observed; afterwards the in-process counters win.

use dashmap::DashMap;
use gateway_core::{EntryKey, HealthCounters, HealthSnapshot, HealthState, HealthThresholds};
use tracing::{debug, info, warn};

/// Process-wide arena of model entry health
#[derive(Debug, Default)]
pub struct HealthTracker {
    /// Tier thresholds
    thresholds: HealthThresholds,
    /// Counters per entry
    entries: DashMap<EntryKey, HealthCounters>,
}

impl HealthTracker {
    /// Create a tracker with the given thresholds
    #[must_use]
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self {
            thresholds,
            entries: DashMap::new(),
        }
    }

    /// Thresholds used to derive tiers
    #[must_use]
    pub fn thresholds(&self) -> HealthThresholds {
        self.thresholds
    }

    /// Current health of an entry, seeding it with `seed` when first seen
    pub fn observe(&self, key: &EntryKey, seed: HealthCounters) -> HealthSnapshot {
        self.entries
            .entry(key.clone())
            .or_insert(seed)
            .snapshot(&self.thresholds)
    }

    /// Record a successful call.
    ///
    /// `seed` initialises the entry when it was never observed, as in
    /// [`HealthTracker::observe`].
    pub fn record_success(&self, key: &EntryKey, seed: HealthCounters) -> HealthSnapshot {
        self.apply(key, seed, HealthCounters::record_success)
    }

    /// Record a failed call, seeding an unobserved entry with `seed`
    pub fn record_failure(&self, key: &EntryKey, seed: HealthCounters) -> HealthSnapshot {
        self.apply(key, seed, HealthCounters::record_failure)
    }

    /// Clear both counters, returning the entry to healthy
    pub fn reset(&self, key: &EntryKey) -> HealthSnapshot {
        self.apply(key, HealthCounters::default(), |counters| {
            *counters = HealthCounters::default();
        })
    }

    /// Health of an entry, if it was ever observed
    #[must_use]
    pub fn snapshot(&self, key: &EntryKey) -> Option<HealthSnapshot> {
        self.entries
            .get(key)
            .map(|counters| counters.snapshot(&self.thresholds))
    }

    /// Health of every observed entry, ordered by key
    #[must_use]
    pub fn snapshots(&self) -> Vec<(EntryKey, HealthSnapshot)> {
        let mut all: Vec<_> = self
            .entries
            .iter()
            .map(|slot| (slot.key().clone(), slot.value().snapshot(&self.thresholds)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    fn apply(
        &self,
        key: &EntryKey,
        seed: HealthCounters,
        update: impl FnOnce(&mut HealthCounters),
    ) -> HealthSnapshot {
        let (before, after) = {
            let mut counters = self.entries.entry(key.clone()).or_insert(seed);
            let before = counters.state(&self.thresholds);
            update(&mut *counters);
            (before, counters.snapshot(&self.thresholds))
        };

        log_transition(key, before, &after);
        after
    }
}

fn log_transition(key: &EntryKey, before: HealthState, after: &HealthSnapshot) {
    if before == after.state {
        debug!(
            entry = %key,
            state = %after.state,
            failures = after.consecutive_failures,
            successes = after.consecutive_successes,
            "Model health updated"
        );
        return;
    }

    if after.state.rank() > before.rank() {
        warn!(
            entry = %key,
            from = %before,
            to = %after.state,
            failures = after.consecutive_failures,
            "Model health degraded"
        );
    } else {
        info!(
            entry = %key,
            from = %before,
            to = %after.state,
            "Model health recovered"
        );
    }
}
