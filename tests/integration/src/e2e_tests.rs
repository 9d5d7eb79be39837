//! End-to-end integration tests
//!
//! Complete request flows from a configuration file through resolution,
//! dispatch and the request log.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use futures::StreamExt;
use gateway_config::load_config;
use gateway_core::{Capability, GatewayError, GatewayRequest, ResolutionType, UnifiedChunk};
use gateway_orchestrator::Gateway;
use gateway_providers::{MultipartFile, MultipartInput};
use gateway_telemetry::RequestOutcome;
use serde_json::json;
use std::io::Write;
use std::time::Duration;

/// E2E test: configuration file on disk to a buffered answer
#[tokio::test]
async fn test_e2e_config_file_to_response() {
    init_tracing();
    let openai = MockOpenAi::new().await;
    openai.mock_chat_completion("gpt-x", "The capital of France is Paris.").await;

    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(single_default_pool_yaml(&openai.url()).as_bytes())
        .unwrap();
    let config = load_config(file.path()).await.unwrap();
    let gateway = Gateway::from_config(&config).unwrap();

    let response = gateway
        .send(chat_request("What is the capital of France?"))
        .await
        .unwrap();

    assert_eq!(response.content, "The capital of France is Paris.");
    assert_eq!(response.http_status, 200);
    assert_eq!(response.resolution_type, ResolutionType::DefaultPool);
    assert_eq!(response.usage.input_tokens, Some(10));
    assert_eq!(response.usage.output_tokens, Some(20));
    assert_eq!(openai.calls().await, 1);
}

/// E2E test: the request log sees one start and one finish per call
#[tokio::test]
async fn test_e2e_request_log_records_success() {
    let openai = MockOpenAi::new().await;
    openai.mock_chat_completion("gpt-x", "ok").await;
    let claude = MockClaude::new().await;
    let exchange = MockImageExchange::new().await;
    let test = TestGateway::new(&config_from_yaml(&full_yaml(
        &openai.url(),
        &claude.url(),
        &exchange.url(),
    )));

    let long_prompt = "x".repeat(1_000);
    let response = test
        .gateway
        .send(request_for("batch-job", Capability::Chat, &long_prompt))
        .await
        .unwrap();

    let finishes = test.sink.wait_for_finishes(1).await;
    let starts = test.sink.starts.lock().unwrap().clone();
    assert_eq!(starts.len(), 1);
    assert_eq!(finishes.len(), 1);

    let start = &starts[0];
    assert_eq!(start.request_id, response.request_id);
    assert_eq!(start.model_id.as_deref(), Some("gpt-x"));
    assert_eq!(start.platform_id.as_deref(), Some("p1"));
    assert_eq!(start.resolution_type, ResolutionType::DefaultPool);
    assert!(!start.stream);
    assert!(start.request_body.ends_with("...[truncated]"));
    assert!(start.request_body.chars().count() <= 200 + "...[truncated]".len());

    let (log_id, finish) = &finishes[0];
    assert_eq!(log_id, &format!("log-{}", response.request_id));
    assert_eq!(finish.outcome, RequestOutcome::Succeeded);
    assert_eq!(finish.http_status, Some(200));
    assert_eq!(finish.response_text.as_deref(), Some("ok"));
}

/// E2E test: an upstream failure is logged as failed with its status
#[tokio::test]
async fn test_e2e_request_log_records_failure() {
    let openai = MockOpenAi::new().await;
    openai.mock_error(503, "Service unavailable").await;
    let test = TestGateway::new(&config_from_yaml(&single_default_pool_yaml(&openai.url())));

    let err = test.gateway.send(chat_request("hi")).await.unwrap_err();
    assert_eq!(err.status_code(), 502);

    let finishes = test.sink.wait_for_finishes(1).await;
    let (_, finish) = &finishes[0];
    assert_eq!(finish.outcome, RequestOutcome::Failed);
    assert_eq!(finish.http_status, Some(503));
    assert_eq!(finish.error_kind.as_deref(), Some("upstream_error"));
    assert!(finish
        .error
        .as_deref()
        .is_some_and(|error| error.contains("Service unavailable")));
}

/// E2E test: a request timeout maps to 504 and counts against the model
#[tokio::test]
async fn test_e2e_request_timeout() {
    let openai = MockOpenAi::new().await;
    openai
        .mock_chat_completion_delayed("gpt-x", "too late", Duration::from_secs(5))
        .await;
    let test = TestGateway::new(&config_from_yaml(&single_default_pool_yaml(&openai.url())));

    let mut request = chat_request("hi");
    request.timeout = Some(Duration::from_millis(100));
    let err = test.gateway.send(request).await.unwrap_err();

    assert!(matches!(err, GatewayError::Upstream { timed_out: true, .. }));
    assert_eq!(err.status_code(), 504);
    assert_eq!(test.gateway.health_snapshots()[0].1.consecutive_failures, 1);
}

/// E2E test: streamed call logs the accumulated text once it completes
#[tokio::test]
async fn test_e2e_stream_logged_on_completion() {
    let openai = MockOpenAi::new().await;
    openai.mock_streaming_response("gpt-x", &["streamed ", "answer"]).await;
    let test = TestGateway::new(&config_from_yaml(&single_default_pool_yaml(&openai.url())));

    let events = collect(test.gateway.stream(chat_request("hi")).await.unwrap()).await;
    assert_event_order(&events);

    let finishes = test.sink.wait_for_finishes(1).await;
    let (_, finish) = &finishes[0];
    assert_eq!(finish.outcome, RequestOutcome::Succeeded);
    assert_eq!(finish.response_text.as_deref(), Some("streamed answer"));
    assert_eq!(finish.usage.output_tokens, Some(7));
    assert!(test.sink.starts.lock().unwrap()[0].stream);
}

/// E2E test: a stream dropped by the caller is logged as cancelled and
/// leaves health untouched
#[tokio::test]
async fn test_e2e_cancelled_stream() {
    let openai = MockOpenAi::new().await;
    openai.mock_streaming_response("gpt-x", &["a", "b", "c"]).await;
    let test = TestGateway::new(&config_from_yaml(&single_default_pool_yaml(&openai.url())));

    let mut stream = test.gateway.stream(chat_request("hi")).await.unwrap();
    let first = stream.next().await.unwrap();
    assert!(matches!(first, UnifiedChunk::Start(_)));
    stream.cancel();
    assert!(stream.is_cancelled());
    assert!(stream.next().await.is_none());
    drop(stream);

    let finishes = test.sink.wait_for_finishes(1).await;
    assert_eq!(finishes[0].1.outcome, RequestOutcome::Cancelled);

    let snapshot = &test.gateway.health_snapshots()[0].1;
    assert_eq!(snapshot.consecutive_failures, 0);
}

/// E2E test: text-to-image and image-to-image through the exchange platform
#[tokio::test]
async fn test_e2e_image_exchange() {
    let openai = MockOpenAi::new().await;
    let claude = MockClaude::new().await;
    let exchange = MockImageExchange::new().await;
    exchange.mock_endpoints().await;
    let test = TestGateway::new(&config_from_yaml(&full_yaml(
        &openai.url(),
        &claude.url(),
        &exchange.url(),
    )));

    let request = GatewayRequest::builder()
        .caller(CALLER)
        .capability(Capability::Generation)
        .body(json!({"prompt": "a cat"}))
        .build()
        .unwrap();
    let response = test.gateway.send(request).await.unwrap();
    assert_eq!(response.model_id, "painter-v2");
    assert_eq!(
        response.raw,
        Some(json!({"images": [{"url": "https://cdn.example/generated.png"}]}))
    );

    let input = MultipartInput::new()
        .with_field("prompt", "make it blue")
        .with_file(MultipartFile::new("image", "image/png", vec![1_u8, 2, 3]));
    let builder = GatewayRequest::builder()
        .caller(CALLER)
        .capability(Capability::Generation);
    let response = test.gateway.send_multipart(builder, input).await.unwrap();
    assert_eq!(
        response.raw,
        Some(json!({"images": [{"b64_json": "aGVsbG8=", "revised_prompt": "a blue cat"}]}))
    );
}

/// E2E test: reloading the store changes routing for the next request
#[tokio::test]
async fn test_e2e_hot_reload_changes_routing() {
    let first = MockOpenAi::new().await;
    first.mock_chat_completion("gpt-x", "from first").await;
    let second = MockOpenAi::new().await;
    second.mock_chat_completion("gpt-x", "from second").await;
    let test = TestGateway::new(&config_from_yaml(&single_default_pool_yaml(&first.url())));

    let response = test.gateway.send(chat_request("hi")).await.unwrap();
    assert_eq!(response.content, "from first");

    test.store
        .reload(&config_from_yaml(&single_default_pool_yaml(&second.url())))
        .unwrap();

    let response = test.gateway.send(chat_request("hi")).await.unwrap();
    assert_eq!(response.content, "from second");
    assert_eq!(first.calls().await, 1);
    assert_eq!(second.calls().await, 1);
}

/// E2E test: concurrent calls share one gateway
#[tokio::test]
async fn test_e2e_concurrent_requests() {
    let openai = MockOpenAi::new().await;
    openai.mock_chat_completion("gpt-x", "ok").await;
    let test = TestGateway::new(&config_from_yaml(&single_default_pool_yaml(&openai.url())));

    let calls = (0..10).map(|i| {
        let gateway = test.gateway.clone();
        tokio::spawn(async move { gateway.send(chat_request(&format!("question {i}"))).await })
    });
    let results = futures::future::join_all(calls).await;

    for result in results {
        assert_eq!(result.unwrap().unwrap().content, "ok");
    }
    assert_eq!(openai.calls().await, 10);
    assert_eq!(test.gateway.health_snapshots()[0].1.consecutive_successes, 10);
}
