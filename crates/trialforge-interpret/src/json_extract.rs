//! Tolerant JSON extraction from LLM text output. Same strip-fences /
//! regex-extract strategy as `trialforge_extract::json_parse` (itself
//! ported from `two_phase_extractor.py::_parse_json_response`); kept as a
//! separate small copy here rather than a cross-crate dependency, since
//! the interpretation pipeline is a different consumer with its own error
//! type and mostly parses arrays rather than objects.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static JSON_ARRAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());
static JSON_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

fn strip_fences(response: &str) -> &str {
    let mut text = response.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse a JSON array out of `response`, tolerating markdown fences and
/// surrounding prose.
pub fn extract_json_array(response: &str) -> Result<Value, String> {
    let text = strip_fences(response);

    if let Ok(value @ Value::Array(_)) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    if let Some(found) = JSON_ARRAY_RE.find(text) {
        if let Ok(value) = serde_json::from_str::<Value>(found.as_str()) {
            return Ok(value);
        }
    }

    Err(text.chars().take(500).collect())
}

/// Parse a JSON object out of `response`, same tolerance as above.
pub fn extract_json_object(response: &str) -> Result<Value, String> {
    let text = strip_fences(response);

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    if let Some(found) = JSON_OBJECT_RE.find(text) {
        if let Ok(value) = serde_json::from_str::<Value>(found.as_str()) {
            return Ok(value);
        }
    }

    Err(text.chars().take(500).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_array_from_fenced_response() {
        let v = extract_json_array("```json\n[{\"a\": 1}]\n```").unwrap();
        assert_eq!(v, json!([{"a": 1}]));
    }

    #[test]
    fn extracts_array_from_surrounding_prose() {
        let v = extract_json_array("Here is the result:\n[1, 2, 3]\nLet me know if you need more.").unwrap();
        assert_eq!(v, json!([1, 2, 3]));
    }

    #[test]
    fn extracts_object_from_fenced_response() {
        let v = extract_json_object("```\n{\"ok\": true}\n```").unwrap();
        assert_eq!(v, json!({"ok": true}));
    }

    #[test]
    fn unparsable_array_text_is_an_error() {
        assert!(extract_json_array("no json here").is_err());
    }
}
