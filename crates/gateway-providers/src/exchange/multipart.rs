//! Multipart form input for exchanges.
//!
//! Exchanges only speak JSON, so uploaded files are folded into the generic
//! body as `data:` URIs before the transformer runs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde_json::{Map, Value};

/// One uploaded file
#[derive(Debug, Clone)]
pub struct MultipartFile {
    /// Form field name
    pub field_name: String,
    /// Original file name
    pub file_name: Option<String>,
    /// MIME type
    pub content_type: String,
    /// File contents
    pub data: Bytes,
}

impl MultipartFile {
    /// Create a file part
    pub fn new(field_name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: None,
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Set the original file name
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Contents as a `data:` URI
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.content_type, STANDARD.encode(&self.data))
    }
}

/// Text fields and files of a multipart form
#[derive(Debug, Clone, Default)]
pub struct MultipartInput {
    /// Text fields in form order
    pub fields: Vec<(String, String)>,
    /// File parts in form order
    pub files: Vec<MultipartFile>,
}

impl MultipartInput {
    /// Empty form
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Add a file part
    #[must_use]
    pub fn with_file(mut self, file: MultipartFile) -> Self {
        self.files.push(file);
        self
    }

    /// Fold the form into a JSON object.
    ///
    /// Text fields holding a JSON object or array are parsed, other values
    /// stay strings. One file on a field becomes a `data:` URI string; several
    /// files on the same field become an array of URIs. Files win over text
    /// fields of the same name.
    #[must_use]
    pub fn into_json(self) -> Value {
        let mut body = Map::new();

        for (name, value) in self.fields {
            body.insert(name, parse_field(value));
        }

        let mut grouped: Vec<(String, Vec<Value>)> = Vec::new();
        for file in &self.files {
            let uri = Value::String(file.to_data_uri());
            match grouped.iter_mut().find(|(name, _)| *name == file.field_name) {
                Some((_, uris)) => uris.push(uri),
                None => grouped.push((file.field_name.clone(), vec![uri])),
            }
        }

        for (name, mut uris) in grouped {
            let value = if uris.len() == 1 {
                uris.remove(0)
            } else {
                Value::Array(uris)
            };
            body.insert(name, value);
        }

        Value::Object(body)
    }
}

fn parse_field(value: String) -> Value {
    let trimmed = value.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str::<Value>(&value) {
            return parsed;
        }
    }
    Value::String(value)
}
