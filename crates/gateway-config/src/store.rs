//! In-memory configuration store.
//!
//! Serves [`ConfigStore`] lookups from an immutable snapshot behind an
//! [`ArcSwap`]. Readers never block; a reload builds a complete new snapshot
//! and swaps it in atomically, so a resolution sees either the old or the new
//! configuration, never a mix.

use crate::config::{GatewayConfig, PlatformConfig};
use crate::error::ConfigError;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use gateway_core::{
    CallerId, CallerRegistration, Capability, ConfigStore, GatewayResult, LegacySlot, ModelPool,
    Platform, PlatformId, PoolId,
};
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
struct StoreSnapshot {
    callers: HashMap<CallerId, CallerRegistration>,
    pools: HashMap<PoolId, ModelPool>,
    default_pools: HashMap<Capability, Vec<PoolId>>,
    platforms: HashMap<PlatformId, Arc<Platform>>,
    legacy: HashMap<Capability, LegacySlot>,
}

impl StoreSnapshot {
    fn index_defaults(&mut self) {
        let mut defaults: HashMap<Capability, Vec<&ModelPool>> = HashMap::new();
        for pool in self.pools.values().filter(|p| p.is_default) {
            defaults.entry(pool.capability).or_default().push(pool);
        }
        self.default_pools = defaults
            .into_iter()
            .map(|(capability, mut pools)| {
                pools.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
                (capability, pools.into_iter().map(|p| p.id.clone()).collect())
            })
            .collect();
    }
}

/// [`ConfigStore`] over an atomically swappable snapshot
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    snapshot: ArcSwap<StoreSnapshot>,
}

impl InMemoryConfigStore {
    /// Build a store from a configuration, resolving credentials from the environment
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or a credential is missing
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let snapshot = build_snapshot(config, &|name: &str| std::env::var(name).ok())?;
        Ok(Self {
            snapshot: ArcSwap::from_pointee(snapshot),
        })
    }

    /// Start building a store by hand
    #[must_use]
    pub fn builder() -> InMemoryConfigStoreBuilder {
        InMemoryConfigStoreBuilder::default()
    }

    /// Replace the whole configuration; on error the previous snapshot stays
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or a credential is missing
    pub fn reload(&self, config: &GatewayConfig) -> Result<(), ConfigError> {
        let snapshot = build_snapshot(config, &|name: &str| std::env::var(name).ok())?;
        info!(
            callers = snapshot.callers.len(),
            pools = snapshot.pools.len(),
            platforms = snapshot.platforms.len(),
            "Configuration store reloaded"
        );
        self.snapshot.store(Arc::new(snapshot));
        Ok(())
    }

    /// Number of known platforms
    #[must_use]
    pub fn platform_count(&self) -> usize {
        self.snapshot.load().platforms.len()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn caller(&self, caller_id: &str) -> GatewayResult<Option<CallerRegistration>> {
        Ok(self.snapshot.load().callers.get(caller_id).cloned())
    }

    async fn pools(&self, ids: &[PoolId]) -> GatewayResult<Vec<ModelPool>> {
        let snapshot = self.snapshot.load();
        Ok(ids.iter().filter_map(|id| snapshot.pools.get(id).cloned()).collect())
    }

    async fn default_pools(&self, capability: Capability) -> GatewayResult<Vec<ModelPool>> {
        let snapshot = self.snapshot.load();
        Ok(snapshot
            .default_pools
            .get(&capability)
            .map(|ids| ids.iter().filter_map(|id| snapshot.pools.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn platform(&self, id: &PlatformId) -> GatewayResult<Option<Arc<Platform>>> {
        Ok(self.snapshot.load().platforms.get(id).cloned())
    }

    async fn legacy_slot(&self, capability: Capability) -> GatewayResult<Option<LegacySlot>> {
        Ok(self.snapshot.load().legacy.get(&capability).cloned())
    }
}

/// Hand-built store contents, used by embedders and tests
#[derive(Debug, Default)]
pub struct InMemoryConfigStoreBuilder {
    snapshot: StoreSnapshot,
}

impl InMemoryConfigStoreBuilder {
    /// Add a caller registration
    #[must_use]
    pub fn caller(mut self, registration: CallerRegistration) -> Self {
        self.snapshot
            .callers
            .insert(registration.caller_id.clone(), registration);
        self
    }

    /// Add a pool
    #[must_use]
    pub fn pool(mut self, pool: ModelPool) -> Self {
        self.snapshot.pools.insert(pool.id.clone(), pool);
        self
    }

    /// Add a platform
    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.snapshot
            .platforms
            .insert(platform.id.clone(), Arc::new(platform));
        self
    }

    /// Add a legacy slot
    #[must_use]
    pub fn legacy(mut self, slot: LegacySlot) -> Self {
        self.snapshot.legacy.insert(slot.capability, slot);
        self
    }

    /// Finish the store
    #[must_use]
    pub fn build(mut self) -> InMemoryConfigStore {
        self.snapshot.index_defaults();
        InMemoryConfigStore {
            snapshot: ArcSwap::from_pointee(self.snapshot),
        }
    }
}

fn build_snapshot(
    config: &GatewayConfig,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<StoreSnapshot, ConfigError> {
    config.validate()?;

    let mut snapshot = StoreSnapshot::default();

    for platform in &config.platforms {
        let resolved = to_platform(platform, env)?;
        snapshot.platforms.insert(resolved.id.clone(), Arc::new(resolved));
    }
    for pool in &config.pools {
        snapshot.pools.insert(pool.id.clone(), pool.clone());
    }
    for caller in &config.callers {
        snapshot.callers.insert(caller.id.clone(), caller.to_registration());
    }
    for slot in &config.legacy {
        snapshot.legacy.insert(slot.capability, slot.clone());
    }

    snapshot.index_defaults();
    Ok(snapshot)
}

fn to_platform(config: &PlatformConfig, env: &dyn Fn(&str) -> Option<String>) -> Result<Platform, ConfigError> {
    Ok(Platform {
        id: config.id.clone(),
        name: config.name.clone().unwrap_or_else(|| config.id.to_string()),
        base_url: config.base_url.trim().to_string(),
        platform_type: config.platform_type.trim().to_ascii_lowercase(),
        credential: resolve_credential(config, env)?,
        enabled: config.enabled,
        exchange: config.exchange.clone(),
    })
}

fn resolve_credential(
    config: &PlatformConfig,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    if let Some(credential) = &config.credential {
        return Ok(credential.clone());
    }

    if let Some(var) = &config.credential_env {
        if let Some(value) = env(var).filter(|v| !v.trim().is_empty()) {
            return Ok(SecretString::new(value));
        }
        if config.enabled {
            return Err(ConfigError::Credential {
                platform: config.id.to_string(),
                reason: format!("environment variable {var} is not set"),
            });
        }
    } else if config.enabled {
        return Err(ConfigError::Credential {
            platform: config.id.to_string(),
            reason: "neither credential nor credential_env is set".to_string(),
        });
    }

    // Disabled platforms are never dispatched to
    Ok(SecretString::new(String::new()))
}
