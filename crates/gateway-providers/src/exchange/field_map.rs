//! Declarative field mapping.
//!
//! ```yaml
//! transformer_type: field-mapping
//! transformer_config:
//!   path: /v1/predict
//!   request:            # provider path <- generic path
//!     input.prompt: messages.0.content
//!     input.model: model
//!   requestConstants:
//!     input.safety: strict
//!   dropFields: [stream]
//!   response:           # generic path <- provider path
//!     choices.0.message.content: output.text
//! ```
//!
//! An empty `request` mapping forwards the generic body; an empty `response`
//! mapping returns the provider body untouched.

use super::path::{get_path, remove_path, set_path};
use super::{join_path, ExchangeTransformer};
use gateway_core::{GatewayError, GatewayResult};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FieldMapConfig {
    path: Option<String>,
    request: BTreeMap<String, String>,
    request_constants: BTreeMap<String, Value>,
    drop_fields: Vec<String>,
    response: BTreeMap<String, String>,
}

impl FieldMapConfig {
    fn parse(config: &Value) -> GatewayResult<Self> {
        if config.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(config.clone())
            .map_err(|e| GatewayError::transformer(format!("invalid field-mapping config: {e}")))
    }
}

/// Copies values between dotted paths
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldMapTransformer;

fn map_fields(source: &Value, mapping: &BTreeMap<String, String>) -> GatewayResult<Value> {
    let mut out = Value::Object(Map::new());
    for (target, from) in mapping {
        if let Some(value) = get_path(source, from) {
            set_path(&mut out, target, value.clone())?;
        }
    }
    Ok(out)
}

impl ExchangeTransformer for FieldMapTransformer {
    fn name(&self) -> &str {
        "field-mapping"
    }

    fn resolve_target_url(&self, base_endpoint: &str, _body: &Value, config: &Value) -> Option<String> {
        let config = FieldMapConfig::parse(config).ok()?;
        config.path.map(|path| join_path(base_endpoint, &path))
    }

    fn transform_request(&self, body: &Value, config: &Value) -> GatewayResult<Value> {
        let config = FieldMapConfig::parse(config)?;

        let mut out = if config.request.is_empty() {
            body.clone()
        } else {
            map_fields(body, &config.request)?
        };

        for (path, value) in &config.request_constants {
            set_path(&mut out, path, value.clone())?;
        }
        for path in &config.drop_fields {
            remove_path(&mut out, path);
        }

        Ok(out)
    }

    fn transform_response(&self, body: &Value, config: &Value) -> GatewayResult<Value> {
        let config = FieldMapConfig::parse(config)?;
        if config.response.is_empty() {
            return Ok(body.clone());
        }
        map_fields(body, &config.response)
    }
}
