//! Exchange transformers.
//!
//! An exchange is a third-party platform that speaks none of the native
//! adapter formats. A transformer reshapes the generic JSON body into the
//! provider's body and back, and may pick among several physical endpoints
//! by looking at the request. Exchanges are JSON-only and never stream.

mod field_map;
mod image_gen;
mod multipart;
mod passthrough;
pub mod path;

pub use field_map::FieldMapTransformer;
pub use image_gen::ImageGenerationTransformer;
pub use multipart::{MultipartFile, MultipartInput};
pub use passthrough::PassthroughTransformer;

use crate::adapter::{prepare_body, OutboundRequest};
use gateway_core::{GatewayError, GatewayResult, Platform};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Request/response reshaping for one exchange family
pub trait ExchangeTransformer: Send + Sync {
    /// Registry key
    fn name(&self) -> &str;

    /// Physical endpoint for this request; `None` uses the platform base URL
    fn resolve_target_url(&self, base_endpoint: &str, body: &Value, config: &Value) -> Option<String> {
        let _ = (base_endpoint, body, config);
        None
    }

    /// Generic body to provider body
    ///
    /// # Errors
    /// Returns a transformer error when the body cannot be reshaped
    fn transform_request(&self, body: &Value, config: &Value) -> GatewayResult<Value>;

    /// Provider body to generic body
    ///
    /// # Errors
    /// Returns a transformer error when the body cannot be reshaped
    fn transform_response(&self, body: &Value, config: &Value) -> GatewayResult<Value>;
}

/// Auth header scheme of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// `Authorization: Bearer <credential>`
    #[default]
    Bearer,
    /// `Authorization: Key <credential>`
    Key,
    /// `x-api-key: <credential>`
    XApiKey,
}

impl AuthScheme {
    /// Parse a configured scheme; unknown or missing schemes are `Bearer`
    pub fn parse(scheme: Option<&str>) -> Self {
        match scheme.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("" | "bearer") => Self::Bearer,
            Some("key") => Self::Key,
            Some("x-api-key" | "xapikey" | "x_api_key") => Self::XApiKey,
            Some(other) => {
                warn!(scheme = other, "Unknown exchange auth scheme, using Bearer");
                Self::Bearer
            }
        }
    }

    /// Header carrying the credential
    pub fn header(self, credential: &SecretString) -> (String, String) {
        let secret = credential.expose_secret();
        match self {
            Self::Bearer => ("Authorization".to_string(), format!("Bearer {secret}")),
            Self::Key => ("Authorization".to_string(), format!("Key {secret}")),
            Self::XApiKey => ("x-api-key".to_string(), secret.clone()),
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer => write!(f, "Bearer"),
            Self::Key => write!(f, "Key"),
            Self::XApiKey => write!(f, "x-api-key"),
        }
    }
}

/// Maps transformer type tags to transformers
#[derive(Clone, Default)]
pub struct ExchangeRegistry {
    transformers: HashMap<String, Arc<dyn ExchangeTransformer>>,
}

impl fmt::Debug for ExchangeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.transformers.keys().collect();
        tags.sort();
        f.debug_struct("ExchangeRegistry").field("tags", &tags).finish()
    }
}

impl ExchangeRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in transformers
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PassthroughTransformer));
        registry.register(Arc::new(FieldMapTransformer));
        registry.register(Arc::new(ImageGenerationTransformer));
        registry
    }

    /// Register a transformer under its own name
    pub fn register(&mut self, transformer: Arc<dyn ExchangeTransformer>) {
        let tag = transformer.name().to_ascii_lowercase();
        debug!(transformer = %tag, "Registering exchange transformer");
        self.transformers.insert(tag, transformer);
    }

    /// Transformer for a type tag
    #[must_use]
    pub fn get(&self, transformer_type: &str) -> Option<Arc<dyn ExchangeTransformer>> {
        self.transformers
            .get(&transformer_type.trim().to_ascii_lowercase())
            .cloned()
    }

    /// Transformer configured on an exchange platform
    ///
    /// # Errors
    /// Returns a transformer error when the platform is not an exchange or its
    /// transformer type is not registered
    pub fn for_platform(&self, platform: &Platform) -> GatewayResult<Arc<dyn ExchangeTransformer>> {
        let settings = platform.exchange.as_ref().ok_or_else(|| {
            GatewayError::transformer(format!("platform '{}' is not an exchange", platform.id))
        })?;

        self.get(&settings.transformer_type).ok_or_else(|| {
            GatewayError::transformer(format!(
                "no exchange transformer registered for type '{}' (platform '{}')",
                settings.transformer_type, platform.id
            ))
        })
    }
}

/// Build the outbound request for an exchange platform.
///
/// The resolved model is injected into the generic body before it is
/// transformed.
///
/// # Errors
/// Returns a transformer error when the platform is not an exchange or the
/// transformer rejects the body
pub fn build_exchange_request(
    platform: &Platform,
    transformer: &dyn ExchangeTransformer,
    body: &Value,
    model: &str,
) -> GatewayResult<OutboundRequest> {
    let settings = platform.exchange.as_ref().ok_or_else(|| {
        GatewayError::transformer(format!("platform '{}' is not an exchange", platform.id))
    })?;
    let config = &settings.transformer_config;

    let generic = prepare_body(body, model, false)?;
    let url = transformer
        .resolve_target_url(&platform.base_url, &generic, config)
        .unwrap_or_else(|| platform.base_url.clone());
    let provider_body = transformer.transform_request(&generic, config)?;

    let scheme = AuthScheme::parse(settings.auth_scheme.as_deref());
    let (name, value) = scheme.header(&platform.credential);

    debug!(
        platform = %platform.id,
        transformer = transformer.name(),
        auth_scheme = %scheme,
        url = %url,
        "Built exchange request"
    );

    Ok(OutboundRequest::new(url, provider_body).with_header(name, value))
}

/// Join an exchange base URL and a configured path
pub(crate) fn join_path(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
