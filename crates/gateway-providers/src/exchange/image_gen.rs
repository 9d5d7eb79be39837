//! Image generation exchanges.
//!
//! Many image providers expose separate text-to-image and image-to-image
//! endpoints under one base URL. The endpoint is chosen by whether the
//! generic body carries a non-empty source image, and the response is
//! normalized to `{"images": [{"url": ...} | {"b64_json": ...}]}`.

use super::{join_path, ExchangeTransformer};
use gateway_core::{GatewayError, GatewayResult};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

const DEFAULT_IMAGE_FIELDS: [&str; 4] = ["image_url", "image_urls", "image", "images"];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ImageGenConfig {
    text_to_image_path: Option<String>,
    image_to_image_path: Option<String>,
    image_field: Option<String>,
    drop_model: bool,
}

impl ImageGenConfig {
    fn parse(config: &Value) -> GatewayResult<Self> {
        if config.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(config.clone())
            .map_err(|e| GatewayError::transformer(format!("invalid image-generation config: {e}")))
    }

    fn has_source_image(&self, body: &Value) -> bool {
        match &self.image_field {
            Some(field) => body.get(field).is_some_and(is_present),
            None => DEFAULT_IMAGE_FIELDS
                .iter()
                .any(|field| body.get(*field).is_some_and(is_present)),
        }
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// Routes text-to-image and image-to-image calls and normalizes image output
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageGenerationTransformer;

impl ExchangeTransformer for ImageGenerationTransformer {
    fn name(&self) -> &str {
        "image-generation"
    }

    fn resolve_target_url(&self, base_endpoint: &str, body: &Value, config: &Value) -> Option<String> {
        let config = ImageGenConfig::parse(config).ok()?;
        let path = if config.has_source_image(body) {
            config.image_to_image_path
        } else {
            config.text_to_image_path
        };
        path.map(|path| join_path(base_endpoint, &path))
    }

    fn transform_request(&self, body: &Value, config: &Value) -> GatewayResult<Value> {
        let config = ImageGenConfig::parse(config)?;
        let mut out = body.clone();
        if let Some(object) = out.as_object_mut() {
            object.remove("stream");
            if config.drop_model {
                object.remove("model");
            }
        }
        Ok(out)
    }

    fn transform_response(&self, body: &Value, _config: &Value) -> GatewayResult<Value> {
        let images = collect_images(body);
        if images.is_empty() {
            debug!("No images recognized in exchange response, returning it unchanged");
            return Ok(body.clone());
        }
        Ok(json!({ "images": images }))
    }
}

fn collect_images(body: &Value) -> Vec<Value> {
    for pointer in ["/images", "/data", "/output/images", "/output"] {
        if let Some(Value::Array(items)) = body.pointer(pointer) {
            let images: Vec<Value> = items.iter().filter_map(normalize_image).collect();
            if !images.is_empty() {
                return images;
            }
        }
    }

    ["url", "image_url", "image"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(normalize_image)
        .into_iter()
        .collect()
}

fn normalize_image(item: &Value) -> Option<Value> {
    let mut image = Map::new();
    match item {
        Value::String(s) if s.starts_with("data:") || s.starts_with("http") => {
            image.insert("url".to_string(), Value::String(s.clone()));
        }
        Value::String(s) if !s.is_empty() => {
            image.insert("b64_json".to_string(), Value::String(s.clone()));
        }
        Value::Object(map) => {
            if let Some(url) = ["url", "image_url"].iter().find_map(|k| map.get(*k).and_then(Value::as_str)) {
                image.insert("url".to_string(), Value::String(url.to_string()));
            } else if let Some(b64) = ["b64_json", "base64"].iter().find_map(|k| map.get(*k).and_then(Value::as_str)) {
                image.insert("b64_json".to_string(), Value::String(b64.to_string()));
            } else {
                return None;
            }
            if let Some(prompt) = map.get("revised_prompt") {
                image.insert("revised_prompt".to_string(), prompt.clone());
            }
        }
        _ => return None,
    }
    Some(Value::Object(image))
}
