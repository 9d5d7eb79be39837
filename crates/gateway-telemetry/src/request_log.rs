//! Request-log collaborator.
//!
//! The gateway reports every LLM call to a [`RequestLogSink`] in two steps:
//! `start` when the target is resolved and `finish` once the outcome is
//! known. Storage and redaction policy belong to the sink; the gateway only
//! truncates bodies before handing them over. Sink failures never reach the
//! caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gateway_core::{CallerId, Capability, RequestContext, RequestId, ResolutionType, TokenUsage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::tracing_setup::TelemetryError;

/// Default number of characters kept from request and response bodies
pub const DEFAULT_MAX_BODY_CHARS: usize = 2000;

/// Request metadata reported before dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRequestStart {
    /// Request identifier
    pub request_id: RequestId,
    /// Calling client
    pub caller_id: CallerId,
    /// Requested capability
    pub capability: Capability,
    /// Streaming call
    pub stream: bool,
    /// Resolved model
    pub model_id: Option<String>,
    /// Resolved platform
    pub platform_id: Option<String>,
    /// Pool the model came from
    pub pool_name: Option<String>,
    /// Resolution tier
    pub resolution_type: ResolutionType,
    /// Whether resolution fell back past the caller's dedicated pools
    pub is_fallback: bool,
    /// Why resolution fell back
    pub fallback_reason: Option<String>,
    /// Model the caller expected, if any
    pub expected_model: Option<String>,
    /// Whether the resolved model matched the expectation
    pub expected_model_matched: Option<bool>,
    /// Truncated request body
    pub request_body: String,
    /// Caller-supplied logging context
    pub context: RequestContext,
    /// Start time
    pub started_at: DateTime<Utc>,
}

/// How a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// Completed successfully
    Succeeded,
    /// Failed before or during the response
    Failed,
    /// Cancelled by the caller mid-stream
    Cancelled,
}

impl std::fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome reported after the call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRequestFinish {
    /// Outcome
    pub outcome: RequestOutcome,
    /// Upstream HTTP status, when one was received
    pub http_status: Option<u16>,
    /// Error kind (`GatewayError::kind`)
    pub error_kind: Option<String>,
    /// Error message
    pub error: Option<String>,
    /// Token usage
    pub usage: TokenUsage,
    /// Truncated response text
    pub response_text: Option<String>,
    /// Wall-clock duration
    pub duration_ms: u64,
    /// Finish time
    pub finished_at: DateTime<Utc>,
}

impl LlmRequestFinish {
    /// Successful outcome
    pub fn succeeded(http_status: u16, usage: TokenUsage, response_text: Option<String>, duration_ms: u64) -> Self {
        Self {
            outcome: RequestOutcome::Succeeded,
            http_status: Some(http_status),
            error_kind: None,
            error: None,
            usage,
            response_text,
            duration_ms,
            finished_at: Utc::now(),
        }
    }

    /// Failed outcome
    pub fn failed(
        http_status: Option<u16>,
        error_kind: impl Into<String>,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            outcome: RequestOutcome::Failed,
            http_status,
            error_kind: Some(error_kind.into()),
            error: Some(error.into()),
            usage: TokenUsage::unavailable(),
            response_text: None,
            duration_ms,
            finished_at: Utc::now(),
        }
    }

    /// Cancelled outcome
    pub fn cancelled(http_status: Option<u16>, response_text: Option<String>, duration_ms: u64) -> Self {
        Self {
            outcome: RequestOutcome::Cancelled,
            http_status,
            error_kind: None,
            error: None,
            usage: TokenUsage::unavailable(),
            response_text,
            duration_ms,
            finished_at: Utc::now(),
        }
    }
}

/// Destination of request logs
#[async_trait]
pub trait RequestLogSink: Send + Sync {
    /// Record the start of a call, returning the sink's log id
    async fn start(&self, entry: LlmRequestStart) -> Result<String, TelemetryError>;

    /// Record the end of a call
    async fn finish(&self, log_id: &str, entry: LlmRequestFinish) -> Result<(), TelemetryError>;
}

/// Sink that writes request logs as structured tracing events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRequestLogSink;

#[async_trait]
impl RequestLogSink for TracingRequestLogSink {
    async fn start(&self, entry: LlmRequestStart) -> Result<String, TelemetryError> {
        info!(
            target: "gateway::request_log",
            request_id = %entry.request_id,
            caller_id = %entry.caller_id,
            capability = %entry.capability,
            stream = entry.stream,
            model = entry.model_id.as_deref().unwrap_or("-"),
            platform = entry.platform_id.as_deref().unwrap_or("-"),
            resolution_type = %entry.resolution_type,
            is_fallback = entry.is_fallback,
            fallback_reason = entry.fallback_reason.as_deref().unwrap_or("-"),
            expected_model_matched = ?entry.expected_model_matched,
            user_id = entry.context.user_id.as_deref().unwrap_or("-"),
            "LLM request started"
        );
        Ok(entry.request_id.to_string())
    }

    async fn finish(&self, log_id: &str, entry: LlmRequestFinish) -> Result<(), TelemetryError> {
        info!(
            target: "gateway::request_log",
            request_id = log_id,
            outcome = %entry.outcome,
            http_status = ?entry.http_status,
            error_kind = entry.error_kind.as_deref().unwrap_or("-"),
            input_tokens = ?entry.usage.input_tokens,
            output_tokens = ?entry.usage.output_tokens,
            duration_ms = entry.duration_ms,
            "LLM request finished"
        );
        Ok(())
    }
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRequestLogSink;

#[async_trait]
impl RequestLogSink for NoopRequestLogSink {
    async fn start(&self, entry: LlmRequestStart) -> Result<String, TelemetryError> {
        Ok(entry.request_id.to_string())
    }

    async fn finish(&self, _log_id: &str, _entry: LlmRequestFinish) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Truncate to at most `max_chars` characters, marking the cut
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...[truncated]", &text[..cut]),
        None => text.to_string(),
    }
}

/// Compact JSON of a body, truncated for logging
pub fn summarize_body(body: &Value, max_chars: usize) -> String {
    truncate_for_log(&body.to_string(), max_chars)
}
