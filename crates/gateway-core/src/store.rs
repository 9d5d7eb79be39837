//! Read-only configuration store collaborator.

use crate::error::GatewayResult;
use crate::model::{CallerRegistration, LegacySlot, ModelPool, Platform};
use crate::types::{Capability, PlatformId, PoolId};
use async_trait::async_trait;
use std::sync::Arc;

/// Lookups for caller registrations, pools, platforms and legacy slots.
///
/// The gateway never writes through this trait; persistence and CRUD live
/// with whoever implements it.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Registration of a caller, if known
    async fn caller(&self, caller_id: &str) -> GatewayResult<Option<CallerRegistration>>;

    /// Pools with the given ids; unknown ids are omitted
    async fn pools(&self, ids: &[PoolId]) -> GatewayResult<Vec<ModelPool>>;

    /// Pools flagged as default for the capability
    async fn default_pools(&self, capability: Capability) -> GatewayResult<Vec<ModelPool>>;

    /// Platform by id
    async fn platform(&self, id: &PlatformId) -> GatewayResult<Option<Arc<Platform>>>;

    /// Legacy single-model slot of the capability
    async fn legacy_slot(&self, capability: Capability) -> GatewayResult<Option<LegacySlot>>;
}
