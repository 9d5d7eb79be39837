//! Test fixtures: configurations and requests

use gateway_config::{parse_config, ConfigFormat, GatewayConfig};
use gateway_core::{Capability, GatewayRequest};
use serde_json::json;
use std::path::Path;

/// Caller used throughout the tests
pub const CALLER: &str = "visual-agent";

/// Configuration with one default chat pool holding `gpt-x` on `p1`
pub fn single_default_pool_yaml(openai_url: &str) -> String {
    format!(
        r#"
callers:
  - id: {CALLER}
    capabilities:
      chat: []
platforms:
  - id: p1
    base_url: "{openai_url}"
    type: openai
    credential: sk-openai
pools:
  - id: pool-default
    name: Default chat
    capability: chat
    is_default: true
    entries:
      - model_id: gpt-x
        platform_id: p1
"#
    )
}

/// Configuration with a dedicated Claude pool, a default OpenAI pool, a
/// legacy vision slot and an image exchange
pub fn full_yaml(openai_url: &str, claude_url: &str, exchange_url: &str) -> String {
    format!(
        r#"
health:
  degraded_after: 3
  unavailable_after: 5
timeouts:
  default: 30s
  generation: 2m
request_log:
  max_body_chars: 200
callers:
  - id: {CALLER}
    capabilities:
      chat: [pool-dedicated]
      vision: []
      generation: []
  - id: batch-job
    capabilities:
      chat: []
platforms:
  - id: p1
    base_url: "{openai_url}"
    type: openai
    credential: sk-openai
  - id: anthropic
    name: Anthropic
    base_url: "{claude_url}"
    type: claude
    credential: sk-ant
  - id: img
    base_url: "{exchange_url}"
    type: exchange
    credential: img-key
    exchange:
      transformer_type: image-generation
      auth_scheme: key
      transformer_config:
        textToImagePath: /v1/text2image
        imageToImagePath: /v1/image2image
pools:
  - id: pool-dedicated
    name: Visual agent
    capability: chat
    entries:
      - model_id: claude-x
        platform_id: anthropic
  - id: pool-default
    name: Default chat
    capability: chat
    is_default: true
    entries:
      - model_id: gpt-x
        platform_id: p1
  - id: pool-images
    name: Images
    capability: generation
    is_default: true
    entries:
      - model_id: painter-v2
        platform_id: img
legacy:
  - capability: vision
    model_id: gpt-vision
    platform_id: p1
"#
    )
}

/// Parse a YAML fixture
pub fn config_from_yaml(yaml: &str) -> GatewayConfig {
    let config = parse_config(yaml, ConfigFormat::Yaml, Path::new("fixture.yaml")).unwrap();
    config.validate().unwrap();
    config
}

/// Chat request from the default caller
pub fn chat_request(prompt: &str) -> GatewayRequest {
    request_for(CALLER, Capability::Chat, prompt)
}

/// Request for any caller and capability
pub fn request_for(caller: &str, capability: Capability, prompt: &str) -> GatewayRequest {
    GatewayRequest::builder()
        .caller(caller)
        .capability(capability)
        .body(json!({
            "model": "ignored-by-gateway",
            "messages": [{"role": "user", "content": prompt}]
        }))
        .build()
        .unwrap()
}
