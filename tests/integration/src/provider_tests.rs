//! Protocol adapter integration tests
//!
//! Wire-level checks of the OpenAI-compatible and Claude-compatible adapters
//! through the full streaming pipeline.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use futures::StreamExt;
use gateway_core::{UnifiedChunk, UsageSource};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn done_of(events: &[UnifiedChunk]) -> (Option<String>, gateway_core::TokenUsage) {
    match events.last() {
        Some(UnifiedChunk::Done { finish_reason, usage }) => (finish_reason.clone(), usage.clone()),
        other => panic!("expected Done, got {other:?}"),
    }
}

// ============================================================================
// OpenAI-compatible
// ============================================================================

#[tokio::test]
async fn test_openai_stream_text_and_usage() {
    let openai = MockOpenAi::new().await;
    openai.mock_streaming_response("gpt-x", &["Hel", "lo"]).await;
    let test = TestGateway::new(&config_from_yaml(&single_default_pool_yaml(&openai.url())));

    let events = collect(test.gateway.stream(chat_request("hi")).await.unwrap()).await;

    assert_event_order(&events);
    assert_eq!(text_of(&events), "Hello");
    assert!(!text_of(&events).contains("after-done"));

    let (finish_reason, usage) = done_of(&events);
    assert_eq!(finish_reason.as_deref(), Some("stop"));
    assert_eq!(usage.input_tokens, Some(12));
    assert_eq!(usage.output_tokens, Some(7));
    assert_eq!(usage.source, UsageSource::Stream);

    match &events[0] {
        UnifiedChunk::Start(start) => {
            assert_eq!(start.model_id, "gpt-x");
            assert_eq!(start.platform_id, "p1");
            assert_eq!(start.pool_name.as_deref(), Some("Default chat"));
        }
        other => panic!("expected Start, got {other:?}"),
    }
}

#[tokio::test]
async fn test_openai_think_tags_split_across_frames() {
    let openai = MockOpenAi::new().await;
    openai
        .mock_streaming_response("gpt-x", &["An", "swer <thi", "nk>secret", " plan</th", "ink> done"])
        .await;
    let test = TestGateway::new(&config_from_yaml(&single_default_pool_yaml(&openai.url())));

    let events = collect(test.gateway.stream(chat_request("hi")).await.unwrap()).await;

    assert_event_order(&events);
    assert_eq!(text_of(&events), "Answer  done");
    assert_eq!(thinking_of(&events), "secret plan");
}

#[tokio::test]
async fn test_think_tags_kept_when_stripping_disabled() {
    let openai = MockOpenAi::new().await;
    openai
        .mock_streaming_response("gpt-x", &["a <think>b</think> c"])
        .await;
    let yaml = format!(
        "streaming:\n  strip_think_tags: false\n{}",
        single_default_pool_yaml(&openai.url())
    );
    let test = TestGateway::new(&config_from_yaml(&yaml));

    let events = collect(test.gateway.stream(chat_request("hi")).await.unwrap()).await;

    assert_eq!(text_of(&events), "a <think>b</think> c");
    assert!(thinking_of(&events).is_empty());
}

#[tokio::test]
async fn test_malformed_frame_is_skipped() {
    let openai = MockOpenAi::new().await;
    let body = format!(
        "{}data: {{not json}}\n\n{}{}data: [DONE]\n\n",
        sse_data(&openai_streaming_chunk("gpt-x", "one ", None)),
        sse_data(&openai_streaming_chunk("gpt-x", "two", None)),
        sse_data(&openai_streaming_chunk("gpt-x", "", Some("stop"))),
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&openai.server)
        .await;
    let test = TestGateway::new(&config_from_yaml(&single_default_pool_yaml(&openai.url())));

    let events = collect(test.gateway.stream(chat_request("hi")).await.unwrap()).await;

    assert_event_order(&events);
    assert_eq!(text_of(&events), "one two");
    assert!(matches!(events.last(), Some(UnifiedChunk::Done { .. })));
}

#[tokio::test]
async fn test_stream_truncated_before_terminal_still_finishes() {
    let openai = MockOpenAi::new().await;
    let body = sse_data(&openai_streaming_chunk("gpt-x", "partial", None));
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&openai.server)
        .await;
    let test = TestGateway::new(&config_from_yaml(&single_default_pool_yaml(&openai.url())));

    let mut stream = test.gateway.stream(chat_request("hi")).await.unwrap();
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }

    assert_event_order(&events);
    assert_eq!(text_of(&events), "partial");
}

// ============================================================================
// Claude-compatible
// ============================================================================

#[tokio::test]
async fn test_claude_stream_thinking_and_usage() {
    let openai = MockOpenAi::new().await;
    let claude = MockClaude::new().await;
    claude
        .mock_streaming_response("claude-x", Some("let me think"), &["The answer", " is 4"])
        .await;
    let exchange = MockImageExchange::new().await;
    let test = TestGateway::new(&config_from_yaml(&full_yaml(
        &openai.url(),
        &claude.url(),
        &exchange.url(),
    )));

    let events = collect(test.gateway.stream(chat_request("2+2?")).await.unwrap()).await;

    assert_event_order(&events);
    assert_eq!(thinking_of(&events), "let me think");
    assert_eq!(text_of(&events), "The answer is 4");

    let first_text = events
        .iter()
        .position(|event| matches!(event, UnifiedChunk::Text { .. }))
        .unwrap();
    let first_thinking = events
        .iter()
        .position(|event| matches!(event, UnifiedChunk::Thinking { .. }))
        .unwrap();
    assert!(first_thinking < first_text);

    let (finish_reason, usage) = done_of(&events);
    assert_eq!(finish_reason.as_deref(), Some("end_turn"));
    assert_eq!(usage.input_tokens, Some(25));
    assert_eq!(usage.output_tokens, Some(15));
    assert_eq!(usage.cache_read_tokens, Some(10));
    assert_eq!(openai.calls().await, 0);
}

#[tokio::test]
async fn test_claude_buffered_message() {
    let openai = MockOpenAi::new().await;
    let claude = MockClaude::new().await;
    claude.mock_messages("claude-x", "Paris").await;
    let exchange = MockImageExchange::new().await;
    let test = TestGateway::new(&config_from_yaml(&full_yaml(
        &openai.url(),
        &claude.url(),
        &exchange.url(),
    )));

    let response = test
        .gateway
        .send(chat_request("Capital of France?"))
        .await
        .unwrap();

    assert_eq!(response.content, "Paris");
    assert_eq!(response.model_id, "claude-x");
    assert_eq!(response.platform_id.as_str(), "anthropic");
    assert_eq!(response.usage.input_tokens, Some(10));
    assert_eq!(response.usage.output_tokens, Some(20));
    assert!(!response.is_fallback);
}
