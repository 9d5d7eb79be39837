use super::ExchangeTransformer;
use gateway_core::GatewayResult;
use serde_json::Value;

/// Sends the generic body as-is and returns the provider body as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTransformer;

impl ExchangeTransformer for PassthroughTransformer {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn transform_request(&self, body: &Value, _config: &Value) -> GatewayResult<Value> {
        Ok(body.clone())
    }

    fn transform_response(&self, body: &Value, _config: &Value) -> GatewayResult<Value> {
        Ok(body.clone())
    }
}
