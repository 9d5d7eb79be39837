//! Routing integration tests
//!
//! Resolution tiers, fallback signals and health degradation driven by real
//! dispatches against mock upstreams.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use gateway_core::{Capability, GatewayError, HealthState, ResolutionType};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

/// Single healthy entry: three failures degrade it, five make it
/// unavailable, and the next resolution finds nothing
#[tokio::test]
async fn test_failures_exhaust_only_default_entry() {
    let openai = MockOpenAi::new().await;
    openai.mock_error(500, "Internal server error").await;
    let test = TestGateway::new(&config_from_yaml(&single_default_pool_yaml(&openai.url())));

    let resolution = test
        .gateway
        .resolve(CALLER, Capability::Chat, None)
        .await
        .unwrap();
    assert_eq!(resolution.resolution_type, ResolutionType::DefaultPool);
    assert_eq!(resolution.actual_model(), Some("gpt-x"));
    assert!(!resolution.is_fallback);

    for attempt in 1..=5 {
        let err = test.gateway.send(chat_request("hi")).await.unwrap_err();
        assert!(err.is_upstream_failure(), "attempt {attempt}: {err}");

        let state = test.gateway.health_snapshots()[0].1.state;
        match attempt {
            1 | 2 => assert_eq!(state, HealthState::Healthy),
            3 | 4 => assert_eq!(state, HealthState::Degraded),
            _ => assert_eq!(state, HealthState::Unavailable),
        }
    }

    let resolution = test
        .gateway
        .resolve(CALLER, Capability::Chat, None)
        .await
        .unwrap();
    assert_eq!(resolution.resolution_type, ResolutionType::NotFound);

    let err = test.gateway.send(chat_request("hi")).await.unwrap_err();
    assert!(matches!(err, GatewayError::ModelNotFound { .. }));
    assert_eq!(err.status_code(), 404);
    assert_eq!(openai.calls().await, 5, "no call once nothing resolves");
}

/// The dedicated pool wins until its only entry is unavailable, then the
/// default pool serves as a flagged fallback
#[tokio::test]
async fn test_dedicated_pool_then_default_fallback() {
    let openai = MockOpenAi::new().await;
    openai.mock_chat_completion("gpt-x", "from openai").await;
    let claude = MockClaude::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(529)
                .set_body_json(json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}})),
        )
        .mount(&claude.server)
        .await;
    let exchange = MockImageExchange::new().await;

    let test = TestGateway::new(&config_from_yaml(&full_yaml(
        &openai.url(),
        &claude.url(),
        &exchange.url(),
    )));

    for _ in 0..5 {
        let err = test.gateway.send(chat_request("hi")).await.unwrap_err();
        match err {
            GatewayError::Upstream {
                platform_id,
                status,
                message,
                ..
            } => {
                assert_eq!(platform_id, "anthropic");
                assert_eq!(status, Some(529));
                assert_eq!(message, "Overloaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    let response = test.gateway.send(chat_request("hi")).await.unwrap();
    assert_eq!(response.content, "from openai");
    assert_eq!(response.resolution_type, ResolutionType::DefaultPool);
    assert!(response.is_fallback);
    assert_eq!(response.fallback_reason.as_deref(), Some("no usable dedicated model"));
    assert_eq!(response.pool_name.as_deref(), Some("Default chat"));
}

/// Within a pool a healthy entry beats a degraded one with a better priority
#[tokio::test]
async fn test_healthy_entry_beats_degraded_priority() {
    let failing = MockOpenAi::new().await;
    failing.mock_error(502, "bad gateway").await;
    let healthy = MockOpenAi::new().await;
    healthy.mock_chat_completion("backup", "from backup").await;

    let yaml = format!(
        r#"
callers:
  - id: {CALLER}
    capabilities:
      chat: []
platforms:
  - {{ id: primary, base_url: "{}", type: openai, credential: sk-openai }}
  - {{ id: secondary, base_url: "{}", type: openai, credential: sk-openai }}
pools:
  - id: pool
    capability: chat
    is_default: true
    entries:
      - {{ model_id: preferred, platform_id: primary, priority: 1 }}
      - {{ model_id: backup, platform_id: secondary, priority: 2 }}
"#,
        failing.url(),
        healthy.url()
    );
    let test = TestGateway::new(&config_from_yaml(&yaml));

    for _ in 0..3 {
        assert!(test.gateway.send(chat_request("hi")).await.is_err());
    }

    let response = test.gateway.send(chat_request("hi")).await.unwrap();
    assert_eq!(response.model_id, "backup");
    assert_eq!(response.platform_id.as_str(), "secondary");
    assert!(!response.is_fallback);
    assert_eq!(failing.calls().await, 3);
}

/// Legacy slots serve when no pool applies and record no health
#[tokio::test]
async fn test_legacy_slot_serves_vision() {
    let openai = MockOpenAi::new().await;
    openai.mock_chat_completion("gpt-vision", "a cat on a mat").await;
    let claude = MockClaude::new().await;
    let exchange = MockImageExchange::new().await;
    let test = TestGateway::new(&config_from_yaml(&full_yaml(
        &openai.url(),
        &claude.url(),
        &exchange.url(),
    )));

    let response = test
        .gateway
        .send(request_for(CALLER, Capability::Vision, "describe"))
        .await
        .unwrap();
    assert_eq!(response.resolution_type, ResolutionType::Legacy);
    assert_eq!(response.model_id, "gpt-vision");
    assert!(response.pool_name.is_none());
    assert!(test.gateway.health_snapshots().is_empty());
}

/// The expected model is reported, never enforced
#[tokio::test]
async fn test_expected_model_signal() {
    let openai = MockOpenAi::new().await;
    openai.mock_chat_completion("gpt-x", "ok").await;
    let test = TestGateway::new(&config_from_yaml(&single_default_pool_yaml(&openai.url())));

    let mut matching = chat_request("hi");
    matching.expected_model = Some("GPT-X".to_string());
    let response = test.gateway.send(matching).await.unwrap();
    assert_eq!(response.expected_model_matched, Some(true));

    let mut mismatching = chat_request("hi");
    mismatching.expected_model = Some("gpt-other".to_string());
    let response = test.gateway.send(mismatching).await.unwrap();
    assert_eq!(response.expected_model_matched, Some(false));
    assert_eq!(response.model_id, "gpt-x");

    let response = test.gateway.send(chat_request("hi")).await.unwrap();
    assert_eq!(response.expected_model_matched, None);
}

/// Unregistered caller/capability pairs fail before any network call
#[tokio::test]
async fn test_unregistered_capability_is_rejected() {
    let openai = MockOpenAi::new().await;
    openai.mock_chat_completion("gpt-x", "ok").await;
    let claude = MockClaude::new().await;
    let exchange = MockImageExchange::new().await;
    let test = TestGateway::new(&config_from_yaml(&full_yaml(
        &openai.url(),
        &claude.url(),
        &exchange.url(),
    )));

    let err = test
        .gateway
        .send(request_for("batch-job", Capability::Vision, "describe"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidCaller { .. }));
    assert_eq!(err.status_code(), 400);

    let err = test
        .gateway
        .send(request_for("nobody", Capability::Chat, "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidCaller { .. }));
    assert_eq!(openai.calls().await, 0);
    assert!(test.sink.starts.lock().unwrap().is_empty());
}
