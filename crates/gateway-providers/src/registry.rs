//! Adapter registry keyed by platform type tag.

use crate::adapter::ProtocolAdapter;
use crate::claude::ClaudeAdapter;
use crate::openai::OpenAiAdapter;
use gateway_core::{GatewayError, GatewayResult, Platform};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Maps platform type tags to protocol adapters
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ProtocolAdapter>>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<_> = self.adapters.keys().collect();
        tags.sort();
        f.debug_struct("AdapterRegistry").field("tags", &tags).finish()
    }
}

impl AdapterRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in OpenAI-compatible and Claude-compatible adapters
    #[must_use]
    pub fn with_defaults() -> Self {
        let openai: Arc<dyn ProtocolAdapter> = Arc::new(OpenAiAdapter::new());
        let claude: Arc<dyn ProtocolAdapter> = Arc::new(ClaudeAdapter::new());

        let mut registry = Self::new();
        for tag in ["openai", "openai-compatible", "openai_compatible"] {
            registry.register(tag, Arc::clone(&openai));
        }
        for tag in ["claude", "anthropic"] {
            registry.register(tag, Arc::clone(&claude));
        }
        registry
    }

    /// Register an adapter under a type tag; tags are case-insensitive
    pub fn register(&mut self, platform_type: &str, adapter: Arc<dyn ProtocolAdapter>) {
        debug!(platform_type, adapter = adapter.name(), "Registering protocol adapter");
        self.adapters
            .insert(platform_type.trim().to_ascii_lowercase(), adapter);
    }

    /// Adapter for a type tag
    #[must_use]
    pub fn get(&self, platform_type: &str) -> Option<Arc<dyn ProtocolAdapter>> {
        self.adapters
            .get(&platform_type.trim().to_ascii_lowercase())
            .cloned()
    }

    /// Adapter for a resolved platform
    ///
    /// # Errors
    /// Returns `UnsupportedPlatform` when no adapter matches the platform type
    pub fn for_platform(&self, platform: &Platform) -> GatewayResult<Arc<dyn ProtocolAdapter>> {
        self.get(&platform.platform_type).ok_or_else(|| {
            GatewayError::unsupported_platform(platform.id.as_str(), platform.platform_type.as_str())
        })
    }

    /// Whether a type tag is registered
    #[must_use]
    pub fn contains(&self, platform_type: &str) -> bool {
        self.get(platform_type).is_some()
    }
}
