//! OpenAI-compatible adapter.
//!
//! Covers OpenAI itself and the many providers that mirror its API:
//! - `POST {base}/v1/chat/completions` for chat, intent and vision
//! - `POST {base}/v1/images/generations` for generation
//! - `POST {base}/v1/embeddings` for embeddings
//! - Bearer authentication
//! - Usage on streams through `stream_options.include_usage`
//! - `delta.reasoning_content` as a reasoning channel

use crate::adapter::{join_endpoint, prepare_body, OutboundRequest, ProtocolAdapter, RequestOptions};
use gateway_core::{Capability, GatewayError, GatewayResult, StreamFrame, TokenUsage, UsageSource};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

/// Version segment added to bare base URLs
pub const DEFAULT_API_VERSION: &str = "v1";

/// Adapter for OpenAI-compatible APIs
#[derive(Debug, Clone, Default)]
pub struct OpenAiAdapter;

impl OpenAiAdapter {
    /// Create the adapter
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProtocolAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    fn build_endpoint(&self, base_url: &str, capability: Capability) -> GatewayResult<String> {
        let path = match capability {
            Capability::Chat | Capability::Intent | Capability::Vision => "chat/completions",
            Capability::Generation => "images/generations",
            Capability::Embedding => "embeddings",
        };
        Ok(join_endpoint(base_url, DEFAULT_API_VERSION, path))
    }

    fn build_request(
        &self,
        url: &str,
        credential: &SecretString,
        body: &Value,
        options: RequestOptions<'_>,
    ) -> GatewayResult<OutboundRequest> {
        let mut body = prepare_body(body, options.model, options.stream)?;

        if options.stream {
            if let Some(object) = body.as_object_mut() {
                object
                    .entry("stream_options")
                    .or_insert_with(|| json!({ "include_usage": true }));
            }
        }

        Ok(OutboundRequest::new(url, body).with_header(
            "Authorization",
            format!("Bearer {}", credential.expose_secret()),
        ))
    }

    fn parse_non_streaming_response(&self, raw_body: &str) -> GatewayResult<String> {
        let response: OpenAiResponse = serde_json::from_str(raw_body)?;

        if let Some(choice) = response.choices.first() {
            return Ok(choice
                .message
                .content
                .as_ref()
                .map(content_text)
                .unwrap_or_default());
        }

        // Images and embeddings have no assistant message; hand back the envelope
        if response.data.is_some() {
            return Ok(raw_body.to_string());
        }

        Err(GatewayError::internal("response carried no choices"))
    }

    fn parse_stream_frame(&self, data: &str) -> Option<StreamFrame> {
        let chunk: OpenAiChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(error = %e, data = %crate::upstream::truncate_chars(data, 200), "Failed to parse OpenAI chunk");
                return None;
            }
        };

        if let Some(error) = chunk.error {
            return Some(StreamFrame {
                error: Some(error_text(&error)),
                ..StreamFrame::default()
            });
        }

        let mut frame = StreamFrame {
            usage: chunk.usage.map(|usage| usage.into_token_usage(UsageSource::Stream)),
            ..StreamFrame::default()
        };

        if let Some(choice) = chunk.choices.into_iter().next() {
            frame.text = choice.delta.content;
            frame.thinking = choice.delta.reasoning_content.or(choice.delta.reasoning);
            frame.finish_reason = choice.finish_reason;
        }

        (!frame.is_empty()).then_some(frame)
    }

    fn parse_token_usage(&self, raw_body: &str) -> Option<TokenUsage> {
        let json: Value = serde_json::from_str(raw_body).ok()?;
        let usage: OpenAiUsage = serde_json::from_value(json.get("usage")?.clone()).ok()?;
        let usage = usage.into_token_usage(UsageSource::ResponseBody);
        usage.has_counts().then_some(usage)
    }
}

/// Text of a message `content`, which may be a string or a list of parts
fn content_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect(),
        _ => String::new(),
    }
}

fn error_text(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map_or_else(|| error.to_string(), str::to_string)
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    #[serde(default)]
    message: ResponseMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
    #[serde(default)]
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: Option<u64>,
}

impl OpenAiUsage {
    fn into_token_usage(self, source: UsageSource) -> TokenUsage {
        TokenUsage {
            input_tokens: self.prompt_tokens,
            output_tokens: self.completion_tokens,
            cache_creation_tokens: None,
            cache_read_tokens: self.prompt_tokens_details.and_then(|d| d.cached_tokens),
            source,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
