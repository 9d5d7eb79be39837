//! Entry selection inside one pool.
//!
//! Healthy entries come before degraded ones regardless of priority; inside a
//! tier the lowest priority number wins, ties keep declaration order.
//! Unavailable entries are never candidates.

use gateway_core::{EntryKey, HealthSnapshot, ModelEntry, ModelPool};
use gateway_resilience::HealthTracker;

/// A selectable entry with the health it had when ranked
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// Pool entry
    pub entry: &'a ModelEntry,
    /// Health arena key
    pub key: EntryKey,
    /// Health at ranking time
    pub health: HealthSnapshot,
}

/// Selectable entries of `pool`, best first
pub fn rank_candidates<'a>(pool: &'a ModelPool, tracker: &HealthTracker) -> Vec<Candidate<'a>> {
    let mut candidates: Vec<Candidate<'a>> = pool
        .entries
        .iter()
        .map(|entry| {
            let key = entry.key(&pool.id);
            let health = tracker.observe(&key, entry.health);
            Candidate { entry, key, health }
        })
        .filter(|candidate| candidate.health.state.is_selectable())
        .collect();

    candidates.sort_by_key(|candidate| (candidate.health.state.rank(), candidate.entry.priority));
    candidates
}
