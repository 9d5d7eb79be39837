//! Request types for the gateway.
//!
//! This module defines the inbound call surface used by feature code: who is
//! calling, which capability it wants, and the structured JSON body to relay.

use crate::error::GatewayError;
use crate::types::{CallerId, Capability, RequestId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Free-form context forwarded to the request-log collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// End user on whose behalf the call is made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Session or conversation identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Additional labels
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

/// Unified inbound request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRequest {
    /// Unique request identifier
    #[serde(default = "RequestId::generate")]
    pub id: RequestId,

    /// Logical caller
    pub caller_id: CallerId,

    /// Requested capability
    pub capability: Capability,

    /// Provider-agnostic JSON body; its `model` field is always overwritten
    pub body: serde_json::Value,

    /// Stream the response
    #[serde(default)]
    pub stream: bool,

    /// Per-request timeout overriding the configured one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// Model the caller expects; logged, never binding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_model: Option<String>,

    /// Ask adapters to attach prompt-cache hints
    #[serde(default)]
    pub enable_cache: bool,

    /// Logging context
    #[serde(default)]
    pub context: RequestContext,
}

impl GatewayRequest {
    /// Create a new builder for `GatewayRequest`
    #[must_use]
    pub fn builder() -> GatewayRequestBuilder {
        GatewayRequestBuilder::default()
    }

    /// Validate the request shape
    ///
    /// # Errors
    /// Returns error if the caller id is blank or the body is not a JSON object
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.caller_id.as_str().trim().is_empty() {
            return Err(GatewayError::invalid_caller("", self.capability));
        }

        if !self.body.is_object() {
            return Err(GatewayError::internal("request body must be a JSON object"));
        }

        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(GatewayError::internal("timeout must be greater than zero"));
        }

        Ok(())
    }
}

/// Builder for `GatewayRequest`
#[derive(Debug, Default)]
pub struct GatewayRequestBuilder {
    id: Option<RequestId>,
    caller_id: Option<CallerId>,
    capability: Option<Capability>,
    body: Option<serde_json::Value>,
    stream: bool,
    timeout: Option<Duration>,
    expected_model: Option<String>,
    enable_cache: bool,
    context: RequestContext,
}

impl GatewayRequestBuilder {
    /// Set the request id
    #[must_use]
    pub fn id(mut self, id: RequestId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the caller
    #[must_use]
    pub fn caller(mut self, caller_id: impl Into<CallerId>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }

    /// Set the capability
    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    /// Set the JSON body
    #[must_use]
    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Enable streaming
    #[must_use]
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Override the timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the expected-model hint
    #[must_use]
    pub fn expected_model(mut self, model: impl Into<String>) -> Self {
        self.expected_model = Some(model.into());
        self
    }

    /// Request prompt-cache hints
    #[must_use]
    pub fn enable_cache(mut self, enable: bool) -> Self {
        self.enable_cache = enable;
        self
    }

    /// Set the user id for logging
    #[must_use]
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.context.user_id = Some(user_id.into());
        self
    }

    /// Set the session id for logging
    #[must_use]
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.context.session_id = Some(session_id.into());
        self
    }

    /// Add a logging label
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.labels.insert(key.into(), value.into());
        self
    }

    /// Build the request
    ///
    /// # Errors
    /// Returns error if caller or capability are missing, or validation fails
    pub fn build(self) -> Result<GatewayRequest, GatewayError> {
        let capability = self
            .capability
            .ok_or_else(|| GatewayError::internal("capability is required"))?;
        let caller_id = self
            .caller_id
            .ok_or_else(|| GatewayError::invalid_caller("", capability))?;

        let request = GatewayRequest {
            id: self.id.unwrap_or_default(),
            caller_id,
            capability,
            body: self
                .body
                .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
            stream: self.stream,
            timeout: self.timeout,
            expected_model: self.expected_model,
            enable_cache: self.enable_cache,
            context: self.context,
        };

        request.validate()?;
        Ok(request)
    }
}
