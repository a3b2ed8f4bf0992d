//! Response Parser
//!
//! Makes untrusted, semi-structured model output safe to consume. `sanitize`
//! isolates the JSON payload from markdown fences and surrounding prose;
//! `parse` deserializes it with case-insensitive field names. Pure functions,
//! no I/O.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::utils::error::{AppError, AppResult};

// ============================================================================
// Payload shapes
// ============================================================================
// Field names are matched after lowercasing every object key, so the model
// may answer in camelCase, PascalCase or snake_case.

/// Expected shape of a pre-analysis response
#[derive(Debug, Clone, Deserialize)]
pub struct PreAnalysisResponse {
    #[serde(default)]
    pub indices: Vec<IndexPayload>,
}

/// One index entry as emitted by the model
#[derive(Debug, Clone, Deserialize)]
pub struct IndexPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "indicatorname", alias = "indicator_name")]
    pub indicator: Option<String>,
    #[serde(default)]
    pub references: Vec<ReferencePayload>,
}

/// One document citation as emitted by the model
#[derive(Debug, Clone, Deserialize)]
pub struct ReferencePayload {
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub page: Option<Value>,
    #[serde(rename = "quotedcontent", alias = "quoted_content", default)]
    pub quoted_content: Option<String>,
}

/// Expected shape of an exploration response
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorationResponse {
    #[serde(default)]
    pub categories: Vec<CategoryPayload>,
}

/// One category as emitted by the model
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub frequency: Option<Value>,
    #[serde(rename = "registerunits", alias = "register_units", default)]
    pub register_units: Vec<RegisterUnitPayload>,
}

/// One register unit as emitted by the model
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUnitPayload {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub page: Option<Value>,
    #[serde(default)]
    pub justification: Option<String>,
    #[serde(rename = "foundindices", alias = "found_indices", default)]
    pub found_indices: Vec<Value>,
    #[serde(default)]
    pub indicator: Option<String>,
}

// ============================================================================
// Sanitizing
// ============================================================================

/// Strip markdown code fences and surrounding prose, isolating the JSON
/// payload. Already-bare JSON passes through unchanged (idempotent).
pub fn sanitize(raw: &str) -> String {
    let text = raw.trim();

    // Input that already parses as JSON is returned untouched. Checked
    // before fence stripping: a quoted value may itself contain a markdown
    // fence (verbatim excerpts often do).
    if serde_json::from_str::<Value>(text).is_ok() {
        return text.to_string();
    }

    // Fenced block next: the model was asked to answer in one.
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let after = after
            .strip_prefix("json")
            .or_else(|| after.strip_prefix("JSON"))
            .unwrap_or(after);
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    // Bare JSON, or JSON embedded in explanatory prose
    if let Some(payload) = extract_balanced(text) {
        return payload.to_string();
    }

    text.to_string()
}

/// Extract the first balanced JSON object or array from the text.
/// String literals and escapes are respected so braces inside quoted
/// content do not confuse the depth count.
fn extract_balanced(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

// ============================================================================
// Parsing
// ============================================================================

/// Deserialize sanitized text into the expected shape.
///
/// Field names are case-insensitive (keys are lowercased before matching)
/// and unknown fields are ignored. Blank input fails with `EmptyResponse`;
/// invalid JSON or a null root fails with `MalformedResponse`.
pub fn parse<T: DeserializeOwned>(text: &str) -> AppResult<T> {
    if text.trim().is_empty() {
        return Err(AppError::EmptyResponse(
            "model response was empty".to_string(),
        ));
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| AppError::MalformedResponse(format!("invalid JSON: {}", e)))?;
    if value.is_null() {
        return Err(AppError::MalformedResponse(
            "response root is null".to_string(),
        ));
    }

    serde_json::from_value(lowercase_keys(value))
        .map_err(|e| AppError::MalformedResponse(format!("unexpected response shape: {}", e)))
}

fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, val)| (key.to_lowercase(), lowercase_keys(val)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// Render a JSON scalar the model sent for a free-form field (pages come
/// back as both `"2"` and `2`).
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Interpret a JSON scalar as an integer id
pub fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
