//! Claude-compatible adapter.
//!
//! Speaks the Messages API (`POST {base}/v1/messages`) with `x-api-key`
//! authentication. The stream is a sequence of typed events:
//!
//! ```text
//! message_start → content_block_start → content_block_delta* → content_block_stop
//!               → message_delta → message_stop
//! ```
//!
//! Text and thinking arrive in `content_block_delta`; input and cache usage
//! arrive in `message_start`, output usage and the stop reason in
//! `message_delta`. An `error` event ends the stream.

use crate::adapter::{join_endpoint, prepare_body, OutboundRequest, ProtocolAdapter, RequestOptions};
use gateway_core::{Capability, GatewayError, GatewayResult, StreamFrame, TokenUsage, UsageSource};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// API version header value
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Beta flag enabling prompt caching
pub const PROMPT_CACHING_BETA: &str = "prompt-caching-2024-07-31";

/// `max_tokens` used when the caller leaves it out; the API requires it
pub const DEFAULT_MAX_TOKENS: u64 = 4096;

/// Adapter for Claude-compatible APIs
#[derive(Debug, Clone, Default)]
pub struct ClaudeAdapter;

impl ClaudeAdapter {
    /// Create the adapter
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProtocolAdapter for ClaudeAdapter {
    fn name(&self) -> &str {
        "claude"
    }

    fn build_endpoint(&self, base_url: &str, capability: Capability) -> GatewayResult<String> {
        match capability {
            Capability::Chat | Capability::Intent | Capability::Vision => {
                Ok(join_endpoint(base_url, "v1", "messages"))
            }
            Capability::Generation | Capability::Embedding => Err(GatewayError::configuration(
                format!("claude adapter has no endpoint for capability '{capability}'"),
            )),
        }
    }

    fn build_request(
        &self,
        url: &str,
        credential: &SecretString,
        body: &Value,
        options: RequestOptions<'_>,
    ) -> GatewayResult<OutboundRequest> {
        let mut body = prepare_body(body, options.model, options.stream)?;
        if let Some(object) = body.as_object_mut() {
            object
                .entry("max_tokens")
                .or_insert_with(|| Value::from(DEFAULT_MAX_TOKENS));
        }

        let mut request = OutboundRequest::new(url, body)
            .with_header("x-api-key", credential.expose_secret().as_str())
            .with_header("anthropic-version", ANTHROPIC_VERSION);

        if options.enable_cache {
            request = request.with_header("anthropic-beta", PROMPT_CACHING_BETA);
        }

        Ok(request)
    }

    fn parse_non_streaming_response(&self, raw_body: &str) -> GatewayResult<String> {
        let response: ClaudeResponse = serde_json::from_str(raw_body)?;
        Ok(response
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect())
    }

    fn parse_stream_frame(&self, data: &str) -> Option<StreamFrame> {
        let event: ClaudeEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, data = %crate::upstream::truncate_chars(data, 200), "Failed to parse Claude event");
                return None;
            }
        };

        let frame = match event {
            ClaudeEvent::MessageStart { message } => StreamFrame {
                usage: message
                    .usage
                    .map(|usage| usage.into_token_usage(UsageSource::Stream)),
                ..StreamFrame::default()
            },
            ClaudeEvent::ContentBlockDelta { delta } => match delta {
                BlockDelta::TextDelta { text } => StreamFrame::text(text),
                BlockDelta::ThinkingDelta { thinking } => StreamFrame {
                    thinking: Some(thinking),
                    ..StreamFrame::default()
                },
                BlockDelta::Other => return None,
            },
            ClaudeEvent::MessageDelta { delta, usage } => StreamFrame {
                finish_reason: delta.stop_reason,
                usage: usage.map(|usage| usage.into_token_usage(UsageSource::Stream)),
                ..StreamFrame::default()
            },
            ClaudeEvent::Error { error } => StreamFrame {
                error: Some(error.message),
                ..StreamFrame::default()
            },
            ClaudeEvent::Other => {
                debug!("Ignoring Claude event");
                return None;
            }
        };

        (!frame.is_empty()).then_some(frame)
    }

    fn parse_token_usage(&self, raw_body: &str) -> Option<TokenUsage> {
        let response: ClaudeResponse = serde_json::from_str(raw_body).ok()?;
        let usage = response.usage?.into_token_usage(UsageSource::ResponseBody);
        usage.has_counts().then_some(usage)
    }
}

// ============================================================================
// Claude API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeEvent {
    MessageStart {
        message: StartMessage,
    },
    ContentBlockDelta {
        delta: BlockDelta,
    },
    MessageDelta {
        #[serde(default)]
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<ClaudeUsage>,
    },
    Error {
        error: ErrorBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StartMessage {
    #[serde(default)]
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        text: String,
    },
    ThinkingDelta {
        thinking: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
    #[serde(default)]
    cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,
}

impl ClaudeUsage {
    fn into_token_usage(self, source: UsageSource) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            cache_creation_tokens: self.cache_creation_input_tokens,
            cache_read_tokens: self.cache_read_input_tokens,
            source,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
