//! Error types for the gateway.
//!
//! Every failure a caller can observe maps onto one [`GatewayError`] kind.
//! Configuration problems are fatal for the call, upstream problems are
//! recorded against the resolved model entry before they are surfaced.

use thiserror::Error;

/// Result alias used throughout the gateway crates
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors surfaced by the gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The caller is not registered for the requested capability
    #[error("caller '{caller_id}' is not registered for capability '{capability}'")]
    InvalidCaller {
        /// Caller identifier
        caller_id: String,
        /// Requested capability
        capability: String,
    },

    /// Resolution exhausted every tier without finding a usable model
    #[error("no model available: {message}")]
    ModelNotFound {
        /// Description of what was tried
        message: String,
    },

    /// The resolved platform has no matching protocol adapter
    #[error("platform '{platform_id}' has unsupported type '{platform_type}'")]
    UnsupportedPlatform {
        /// Platform identifier
        platform_id: String,
        /// Platform type tag that failed to match an adapter
        platform_type: String,
    },

    /// The upstream provider answered with a non-success status or the call failed in transit
    #[error("upstream '{platform_id}' failed (status {status:?}): {message}")]
    Upstream {
        /// Platform identifier
        platform_id: String,
        /// HTTP status, when one was received
        status: Option<u16>,
        /// Upstream message, extracted from the body when possible
        message: String,
        /// Whether the request exceeded its timeout
        timed_out: bool,
    },

    /// An exchange transformer is missing or rejected the payload
    #[error("exchange transformer error: {message}")]
    Transformer {
        /// Error message
        message: String,
    },

    /// Invalid configuration data
    #[error("configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// JSON (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unexpected failure anywhere in the pipeline
    #[error("internal gateway error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Create an invalid-caller error
    pub fn invalid_caller(caller_id: impl Into<String>, capability: impl ToString) -> Self {
        Self::InvalidCaller {
            caller_id: caller_id.into(),
            capability: capability.to_string(),
        }
    }

    /// Create a model-not-found error
    pub fn model_not_found(message: impl Into<String>) -> Self {
        Self::ModelNotFound {
            message: message.into(),
        }
    }

    /// Create an unsupported-platform error
    pub fn unsupported_platform(
        platform_id: impl Into<String>,
        platform_type: impl Into<String>,
    ) -> Self {
        Self::UnsupportedPlatform {
            platform_id: platform_id.into(),
            platform_type: platform_type.into(),
        }
    }

    /// Create an upstream error
    pub fn upstream(
        platform_id: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Upstream {
            platform_id: platform_id.into(),
            status,
            message: message.into(),
            timed_out: false,
        }
    }

    /// Create an upstream timeout error
    pub fn upstream_timeout(platform_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            platform_id: platform_id.into(),
            status: None,
            message: message.into(),
            timed_out: true,
        }
    }

    /// Create a transformer error
    pub fn transformer(message: impl Into<String>) -> Self {
        Self::Transformer {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP-equivalent status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidCaller { .. } => 400,
            Self::ModelNotFound { .. } => 404,
            Self::Upstream { timed_out: true, .. } => 504,
            Self::Upstream { .. } => 502,
            Self::UnsupportedPlatform { .. }
            | Self::Transformer { .. }
            | Self::Configuration { .. }
            | Self::Serialization(_)
            | Self::Internal { .. } => 500,
        }
    }

    /// Short machine-readable kind, used as a log field
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCaller { .. } => "invalid_caller",
            Self::ModelNotFound { .. } => "model_not_found",
            Self::UnsupportedPlatform { .. } => "unsupported_platform",
            Self::Upstream { .. } => "upstream_error",
            Self::Transformer { .. } => "transformer_error",
            Self::Configuration { .. } => "configuration_error",
            Self::Serialization(_) => "serialization_error",
            Self::Internal { .. } => "gateway_error",
        }
    }

    /// Whether this error must be recorded as a failure against the resolved model
    #[must_use]
    pub fn is_upstream_failure(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }
}
