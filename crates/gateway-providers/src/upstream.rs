//! Upstream error bodies.

use serde_json::Value;

/// Maximum characters of a raw body quoted in an error message
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Best human-readable message in a non-2xx body.
///
/// Looks for `error.message`, then `message`, then a string `error`, then
/// falls back to the raw body truncated to [`MAX_ERROR_BODY_CHARS`].
pub fn extract_error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    let extracted = parsed.as_ref().and_then(|json| {
        json.pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| json.get("message").and_then(Value::as_str))
            .or_else(|| json.get("error").and_then(Value::as_str))
            .map(str::to_string)
    });

    match extracted {
        Some(message) if !message.trim().is_empty() => message,
        _ if body.trim().is_empty() => "empty response body".to_string(),
        _ => truncate_chars(body.trim(), MAX_ERROR_BODY_CHARS),
    }
}

/// Truncate to at most `max_chars` characters, marking the cut with `...`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
