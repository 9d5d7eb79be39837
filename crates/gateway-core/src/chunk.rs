//! Unified stream events and token usage.

use crate::resolution::ResolutionType;
use crate::types::RequestId;
use serde::{Deserialize, Serialize};

/// Where token counts came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageSource {
    /// Accumulated from streamed events
    Stream,
    /// Read from the final response body
    ResponseBody,
    /// The upstream reported nothing
    #[default]
    Unavailable,
}

/// Token accounting for one call. Any count may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub input_tokens: Option<u64>,
    /// Completion tokens
    pub output_tokens: Option<u64>,
    /// Tokens written to a prompt cache
    pub cache_creation_tokens: Option<u64>,
    /// Tokens served from a prompt cache
    pub cache_read_tokens: Option<u64>,
    /// Provenance of the counts
    pub source: UsageSource,
}

impl TokenUsage {
    /// Usage with no counts
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Whether any count is present
    #[must_use]
    pub fn has_counts(&self) -> bool {
        self.input_tokens.is_some()
            || self.output_tokens.is_some()
            || self.cache_creation_tokens.is_some()
            || self.cache_read_tokens.is_some()
    }

    /// Overlay counts present in `other` onto `self`
    pub fn merge(&mut self, other: &Self) {
        if other.input_tokens.is_some() {
            self.input_tokens = other.input_tokens;
        }
        if other.output_tokens.is_some() {
            self.output_tokens = other.output_tokens;
        }
        if other.cache_creation_tokens.is_some() {
            self.cache_creation_tokens = other.cache_creation_tokens;
        }
        if other.cache_read_tokens.is_some() {
            self.cache_read_tokens = other.cache_read_tokens;
        }
        if other.has_counts() {
            self.source = other.source;
        }
    }

    /// Total of input and output tokens when both are known
    #[must_use]
    pub fn total_tokens(&self) -> Option<u64> {
        Some(self.input_tokens? + self.output_tokens?)
    }
}

/// Resolution metadata carried by the first event of every stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStart {
    /// Request identifier
    pub request_id: RequestId,
    /// Model actually used
    pub model_id: String,
    /// Platform actually used
    pub platform_id: String,
    /// Platform display name
    pub platform_name: String,
    /// Tier that produced the model
    pub resolution_type: ResolutionType,
    /// Whether a preferred tier was skipped
    pub is_fallback: bool,
    /// Why the fallback happened
    pub fallback_reason: Option<String>,
    /// Pool name, when resolved through a pool
    pub pool_name: Option<String>,
}

/// One event of a unified response stream.
///
/// Every stream emits exactly one `Start`, then `Text`/`Thinking` in arrival
/// order, then exactly one `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnifiedChunk {
    /// Stream opened
    Start(StreamStart),
    /// Assistant text delta
    Text {
        /// Text fragment
        delta: String,
    },
    /// Reasoning delta
    Thinking {
        /// Reasoning fragment
        delta: String,
    },
    /// Stream completed
    Done {
        /// Provider finish reason
        finish_reason: Option<String>,
        /// Token usage
        usage: TokenUsage,
    },
    /// Stream failed
    Error {
        /// Error message
        message: String,
    },
}

impl UnifiedChunk {
    /// Text event
    pub fn text(delta: impl Into<String>) -> Self {
        Self::Text {
            delta: delta.into(),
        }
    }

    /// Thinking event
    pub fn thinking(delta: impl Into<String>) -> Self {
        Self::Thinking {
            delta: delta.into(),
        }
    }

    /// Error event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Whether this event ends the stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// Content extracted by a protocol adapter from one SSE data payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamFrame {
    /// Assistant text delta
    pub text: Option<String>,
    /// Reasoning delta
    pub thinking: Option<String>,
    /// Finish reason, when the frame closes the message
    pub finish_reason: Option<String>,
    /// Usage reported by this frame
    pub usage: Option<TokenUsage>,
    /// Provider-reported error
    pub error: Option<String>,
}

impl StreamFrame {
    /// Frame carrying only text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Whether the frame carries anything actionable
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, str::is_empty)
            && self.thinking.as_deref().map_or(true, str::is_empty)
            && self.finish_reason.is_none()
            && self.usage.is_none()
            && self.error.is_none()
    }
}
