//! Buffered call results.

use gateway_core::{PlatformId, RequestId, ResolutionType, TokenUsage};
use serde::Serialize;
use serde_json::Value;

/// Result of a buffered call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayResponse {
    /// Request identifier
    pub request_id: RequestId,
    /// Assistant text, or the transformed JSON body for exchange platforms
    pub content: String,
    /// Parsed upstream body (after transformation for exchanges)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
    /// Token usage
    pub usage: TokenUsage,
    /// Model that served the call
    pub model_id: String,
    /// Platform that served the call
    pub platform_id: PlatformId,
    /// Pool the model came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
    /// Resolution tier
    pub resolution_type: ResolutionType,
    /// Whether resolution fell back past the caller's dedicated pools
    pub is_fallback: bool,
    /// Why resolution fell back
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    /// Whether the served model matched the caller's expectation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_model_matched: Option<bool>,
    /// Upstream HTTP status
    pub http_status: u16,
    /// Wall-clock duration
    pub duration_ms: u64,
}
