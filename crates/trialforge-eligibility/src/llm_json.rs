//! Lenient JSON response parsing — the same strip-fences-then-regex-
//! fallback shape as `trialforge_extract::json_parse` and
//! `trialforge_soa::llm_json`, duplicated per crate since each has its
//! own unrelated error type.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::EligibilityError;

static JSON_ARRAY_OR_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)[\{\[].*[\}\]]").unwrap());

pub fn parse_json_response(response: &str) -> Result<Value, EligibilityError> {
    let mut text = response.trim();

    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text = text.trim();

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    if let Some(found) = JSON_ARRAY_OR_OBJECT_RE.find(text) {
        if let Ok(value) = serde_json::from_str::<Value>(found.as_str()) {
            return Ok(value);
        }
    }

    let snippet: String = text.chars().take(500).collect();
    Err(EligibilityError::JsonParse(snippet))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fences() {
        let parsed = parse_json_response("```json\n[{\"text\":\"Age 18+\"}]\n```").unwrap();
        assert_eq!(parsed, serde_json::json!([{"text": "Age 18+"}]));
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_json_response("no json here").is_err());
    }
}
