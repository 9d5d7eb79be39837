//! Protocol adapter abstraction.
//!
//! An adapter knows one provider family's wire format. It never performs I/O:
//! it builds an [`OutboundRequest`] that the orchestrator dispatches, and it
//! parses raw bodies and SSE payloads handed back to it. This keeps routing
//! and dispatch independent of any provider's JSON shape.

use gateway_core::{Capability, GatewayError, GatewayResult, StreamFrame, TokenUsage};
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::SecretString;
use serde_json::Value;
use std::fmt;

/// Header names whose values are never printed
const SENSITIVE_HEADERS: &[&str] = &["authorization", "x-api-key", "api-key"];

/// Matches a trailing API version segment such as `/v1`, `/v4` or `/v1beta`
#[allow(clippy::unwrap_used)]
static VERSION_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/v\d+(?:(?:alpha|beta)\d*)?$").unwrap());

/// Per-call options applied when building a request
#[derive(Debug, Clone, Copy)]
pub struct RequestOptions<'a> {
    /// Model chosen by the resolver; always overwrites the body's `model`
    pub model: &'a str,
    /// Ask for an SSE response
    pub stream: bool,
    /// Attach provider prompt-cache hints
    pub enable_cache: bool,
}

/// Transport-neutral HTTP request
#[derive(Clone, PartialEq)]
pub struct OutboundRequest {
    /// Full endpoint URL
    pub url: String,
    /// Header name/value pairs
    pub headers: Vec<(String, String)>,
    /// JSON body
    pub body: Value,
}

impl OutboundRequest {
    /// Create a JSON POST request
    pub fn new(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body,
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Value of a header, matched case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(name, value)| {
                let shown = if SENSITIVE_HEADERS
                    .iter()
                    .any(|sensitive| name.eq_ignore_ascii_case(sensitive))
                {
                    "[REDACTED]"
                } else {
                    value.as_str()
                };
                (name.as_str(), shown)
            })
            .collect();

        f.debug_struct("OutboundRequest")
            .field("url", &self.url)
            .field("headers", &headers)
            .finish_non_exhaustive()
    }
}

/// One provider family's wire format
pub trait ProtocolAdapter: Send + Sync {
    /// Adapter name used in logs
    fn name(&self) -> &str;

    /// Endpoint URL for a capability.
    ///
    /// Base URLs may or may not already carry a version segment.
    ///
    /// # Errors
    /// Returns a configuration error when the family has no endpoint for the capability
    fn build_endpoint(&self, base_url: &str, capability: Capability) -> GatewayResult<String>;

    /// Outbound request with auth headers, provider flags, and the resolved model injected
    ///
    /// # Errors
    /// Returns error if the body is not a JSON object
    fn build_request(
        &self,
        url: &str,
        credential: &SecretString,
        body: &Value,
        options: RequestOptions<'_>,
    ) -> GatewayResult<OutboundRequest>;

    /// Assistant content of a buffered response
    ///
    /// # Errors
    /// Returns error if the body is not valid JSON
    fn parse_non_streaming_response(&self, raw_body: &str) -> GatewayResult<String>;

    /// Actionable content of one SSE data payload; malformed payloads yield `None`
    fn parse_stream_frame(&self, data: &str) -> Option<StreamFrame>;

    /// Usage block of a buffered response
    fn parse_token_usage(&self, raw_body: &str) -> Option<TokenUsage>;
}

/// Join a base URL and an endpoint path, adding `default_version` when the
/// base carries no version segment. A base that already ends with the path
/// is returned unchanged.
pub fn join_endpoint(base_url: &str, default_version: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if base.ends_with(&format!("/{path}")) {
        return base.to_string();
    }

    if has_version_segment(base) {
        format!("{base}/{path}")
    } else {
        format!("{base}/{}/{path}", default_version.trim_matches('/'))
    }
}

/// Whether a base URL ends with an API version segment
pub fn has_version_segment(base_url: &str) -> bool {
    VERSION_SEGMENT.is_match(base_url.trim_end_matches('/'))
}

/// Clone the caller body and inject the resolved model and streaming flag.
///
/// `stream` is only written when streaming, or when the caller set it, so a
/// buffered call can never be turned into a streamed one.
///
/// # Errors
/// Returns error if the body is not a JSON object
pub fn prepare_body(body: &Value, model: &str, stream: bool) -> GatewayResult<Value> {
    let mut body = body.clone();
    let object = body
        .as_object_mut()
        .ok_or_else(|| GatewayError::internal("request body must be a JSON object"))?;

    object.insert("model".to_string(), Value::String(model.to_string()));
    if stream || object.contains_key("stream") {
        object.insert("stream".to_string(), Value::Bool(stream));
    }

    Ok(body)
}
