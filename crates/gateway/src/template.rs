//! Webhook body templating.
//!
//! A template is plain text with `{{$.path.to.field}}` references. The API
//! stores it as a tokenized body: literal parts and object references.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TOKEN: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\{\{\$\.(.*?)\}\}"));

/// Tokenized webhook body as the API stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookBody {
    /// Always `ANY`.
    pub data_type: String,
    /// Always `TOKENIZED`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Literal and reference parts, in template order.
    #[serde(default)]
    pub parts: Vec<BodyPart>,
}

/// One part of a tokenized body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BodyPart {
    /// Literal text.
    #[serde(rename = "VALUE")]
    Value {
        /// Always `STRING` for literals.
        #[serde(rename = "dataType", default = "string_data_type")]
        data_type: String,
        /// Literal text; omitted on the wire when empty.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        value: String,
    },
    /// Reference to a field of the incoming object.
    #[serde(rename = "OBJECT_VALUE")]
    ObjectValue {
        /// Dot-separated path, split.
        #[serde(default)]
        path: Vec<String>,
        /// First path segment.
        #[serde(default)]
        name: String,
    },
}

fn string_data_type() -> String {
    "STRING".to_string()
}

impl BodyPart {
    fn literal(value: &str) -> Self {
        Self::Value {
            data_type: string_data_type(),
            value: value.to_string(),
        }
    }

    fn reference(path: &str) -> Self {
        let path: Vec<String> = path.split('.').map(str::to_string).collect();
        let name = path.first().cloned().unwrap_or_default();
        Self::ObjectValue { path, name }
    }
}

/// Split a template into literal and reference parts.
///
/// Every reference is preceded by a literal part, even an empty one. Text
/// after the last reference becomes a trailing literal when non-empty.
pub fn tokenize(input: &str) -> Result<WebhookBody> {
    let pattern = TOKEN
        .as_ref()
        .map_err(|e| Error::Template(e.to_string()))?;

    let mut parts = Vec::new();
    let mut last = 0;
    for caps in pattern.captures_iter(input) {
        let (Some(token), Some(path)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        parts.push(BodyPart::literal(&input[last..token.start()]));
        parts.push(BodyPart::reference(path.as_str()));
        last = token.end();
    }
    if last < input.len() {
        parts.push(BodyPart::literal(&input[last..]));
    }

    Ok(WebhookBody {
        data_type: "ANY".to_string(),
        kind: "TOKENIZED".to_string(),
        parts,
    })
}

/// Turn a tokenized body back into template text.
///
/// References with an empty path render as nothing.
pub fn render(body: &WebhookBody) -> String {
    let mut out = String::new();
    for part in &body.parts {
        match part {
            BodyPart::Value { value, .. } => out.push_str(value),
            BodyPart::ObjectValue { path, .. } if !path.is_empty() => {
                out.push_str("{{$.");
                out.push_str(&path.join("."));
                out.push_str("}}");
            }
            BodyPart::ObjectValue { .. } => {}
        }
    }
    out
}
