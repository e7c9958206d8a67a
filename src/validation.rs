//! Model Output JSON Extraction
//!
//! Models asked for JSON still wrap it in markdown fences or stray prose
//! often enough to matter. This module makes exactly one recovery attempt:
//! strip fences, and if a direct parse still fails, take the outermost
//! brace/bracket slice. Anything beyond that is a shape-validation failure
//! the caller handles through its own single fallback path - recovery
//! heuristics are deliberately not chained.

use serde_json::Value;

use crate::types::{LensError, Result};

/// Parse a model's JSON answer, tolerating markdown fences and surrounding
/// prose.
pub fn extract_json(raw: &str) -> Result<Value> {
    let cleaned = strip_code_fences(raw.trim());

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Ok(value);
    }

    // Single recovery attempt: the outermost JSON-looking slice.
    if let Some(slice) = outermost_json_slice(cleaned)
        && let Ok(value) = serde_json::from_str::<Value>(slice)
    {
        return Ok(value);
    }

    Err(LensError::ModelOutput(format!(
        "Not valid JSON. Content preview: {}",
        cleaned.chars().take(120).collect::<String>()
    )))
}

/// Unwrap a single-element array: models sometimes return `[{...}]` where
/// `{...}` was asked for.
pub fn unwrap_singleton(value: Value) -> Value {
    match value {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    }
}

fn strip_code_fences(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop the info string ("json") up to the first newline, and the
    // closing fence if present.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    body.rsplit_once("```").map(|(b, _)| b).unwrap_or(body).trim()
}

fn outermost_json_slice(s: &str) -> Option<&str> {
    let start = s.find(['{', '['])?;
    let open = s.as_bytes()[start];
    let close = if open == b'{' { '}' } else { ']' };
    let end = s.rfind(close)?;
    (end > start).then(|| &s[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let value = extract_json(r#"{"ok": true}"#).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_fenced_json() {
        let value = extract_json("```json\n{\"ok\": true}\n```").unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_json_embedded_in_prose() {
        let value = extract_json("Here is the result:\n{\"ok\": true}\nHope that helps!").unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(extract_json("I cannot answer that.").is_err());
    }

    #[test]
    fn test_unwrap_singleton_array() {
        let value = unwrap_singleton(serde_json::json!([{"a": 1}]));
        assert_eq!(value["a"], 1);

        // Multi-element arrays pass through untouched.
        let list = unwrap_singleton(serde_json::json!([1, 2]));
        assert!(list.is_array());
    }
}
