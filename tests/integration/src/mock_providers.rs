//! Mock upstream platforms for integration testing
//!
//! wiremock servers speaking the OpenAI-compatible, Claude-compatible and
//! image-exchange wire formats.

use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EVENT_STREAM: &str = "text/event-stream";

/// Mock OpenAI-compatible platform
pub struct MockOpenAi {
    pub server: MockServer,
}

impl MockOpenAi {
    /// Start a new mock server
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL for this mock server
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Number of requests received
    pub async fn calls(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }

    /// Buffered chat completion for `model`
    pub async fn mock_chat_completion(&self, model: &str, content: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-openai"))
            .and(body_partial_json(json!({"model": model})))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_chat_response(model, content)))
            .mount(&self.server)
            .await;
    }

    /// Streamed chat completion for `model`, one delta per entry
    pub async fn mock_streaming_response(&self, model: &str, deltas: &[&str]) {
        let mut body = String::new();
        for delta in deltas {
            body.push_str(&sse_data(&openai_streaming_chunk(model, delta, None)));
        }
        body.push_str(&sse_data(&openai_streaming_chunk(model, "", Some("stop"))));
        body.push_str(&sse_data(&json!({
            "model": model,
            "choices": [],
            "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
        })));
        body.push_str("data: [DONE]\n\n");
        body.push_str(&sse_data(&openai_streaming_chunk(model, "after-done", None)));

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": model,
                "stream": true,
                "stream_options": {"include_usage": true}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, EVENT_STREAM))
            .mount(&self.server)
            .await;
    }

    /// Every call answers with `status`
    pub async fn mock_error(&self, status: u16, message: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(openai_error_response("server_error", message)),
            )
            .mount(&self.server)
            .await;
    }

    /// Chat completion that answers after a delay
    pub async fn mock_chat_completion_delayed(&self, model: &str, content: &str, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(openai_chat_response(model, content))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }
}

/// Mock Claude-compatible platform
pub struct MockClaude {
    pub server: MockServer,
}

impl MockClaude {
    /// Start a new mock server
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL for this mock server
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Buffered message
    pub async fn mock_messages(&self, model: &str, content: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({"model": model, "max_tokens": 4096})))
            .respond_with(ResponseTemplate::new(200).set_body_json(claude_message_response(model, content)))
            .mount(&self.server)
            .await;
    }

    /// Streamed message with an optional thinking block before the text
    pub async fn mock_streaming_response(&self, model: &str, thinking: Option<&str>, deltas: &[&str]) {
        let mut body = String::new();
        body.push_str(&claude_event(
            "message_start",
            &json!({
                "type": "message_start",
                "message": {
                    "id": "msg_test123",
                    "type": "message",
                    "role": "assistant",
                    "model": model,
                    "content": [],
                    "usage": {"input_tokens": 25, "output_tokens": 1, "cache_read_input_tokens": 10}
                }
            }),
        ));
        body.push_str(&claude_event("ping", &json!({"type": "ping"})));

        if let Some(thinking) = thinking {
            body.push_str(&claude_event(
                "content_block_delta",
                &json!({
                    "type": "content_block_delta",
                    "index": 0,
                    "delta": {"type": "thinking_delta", "thinking": thinking}
                }),
            ));
        }

        for delta in deltas {
            body.push_str(&claude_event(
                "content_block_delta",
                &json!({
                    "type": "content_block_delta",
                    "index": 1,
                    "delta": {"type": "text_delta", "text": delta}
                }),
            ));
        }

        body.push_str(&claude_event(
            "message_delta",
            &json!({
                "type": "message_delta",
                "delta": {"stop_reason": "end_turn"},
                "usage": {"output_tokens": 15}
            }),
        ));
        body.push_str(&claude_event("message_stop", &json!({"type": "message_stop"})));

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(json!({"model": model, "stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, EVENT_STREAM))
            .mount(&self.server)
            .await;
    }
}

/// Mock image-generation exchange with separate text and image endpoints
pub struct MockImageExchange {
    pub server: MockServer,
}

impl MockImageExchange {
    /// Start a new mock server
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL for this mock server
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Text-to-image and image-to-image endpoints
    pub async fn mock_endpoints(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/text2image"))
            .and(header("authorization", "Key img-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": {"images": ["https://cdn.example/generated.png"]}
            })))
            .mount(&self.server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/image2image"))
            .and(header("authorization", "Key img-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"b64_json": "aGVsbG8=", "revised_prompt": "a blue cat"}]
            })))
            .mount(&self.server)
            .await;
    }
}

/// One SSE data frame
pub fn sse_data(payload: &Value) -> String {
    format!("data: {payload}\n\n")
}

/// One named SSE event
pub fn claude_event(event: &str, payload: &Value) -> String {
    format!("event: {event}\ndata: {payload}\n\n")
}

/// Generate an OpenAI chat completion response
pub fn openai_chat_response(model: &str, content: &str) -> Value {
    json!({
        "id": "chatcmpl-test123",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
    })
}

/// Generate an OpenAI streaming chunk
pub fn openai_streaming_chunk(model: &str, content: &str, finish_reason: Option<&str>) -> Value {
    let delta = if content.is_empty() {
        json!({})
    } else {
        json!({"content": content})
    };
    json!({
        "id": "chatcmpl-test123",
        "object": "chat.completion.chunk",
        "model": model,
        "choices": [{"index": 0, "delta": delta, "finish_reason": finish_reason}]
    })
}

/// Generate an OpenAI error response
pub fn openai_error_response(error_type: &str, message: &str) -> Value {
    json!({
        "error": {"message": message, "type": error_type, "code": null}
    })
}

/// Generate a Claude message response
pub fn claude_message_response(model: &str, content: &str) -> Value {
    json!({
        "id": "msg_test123",
        "type": "message",
        "role": "assistant",
        "model": model,
        "content": [{"type": "text", "text": content}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 10, "output_tokens": 20}
    })
}
