//! Lenient JSON response parsing, ported from
//! `two_phase_extractor.py::_parse_json_response`: strip markdown code
//! fences, then fall back to a regex-extracted `{...}` span if the model
//! wrapped the JSON in prose.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::ExtractError;

static JSON_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

pub fn parse_json_response(response: &str) -> Result<Value, ExtractError> {
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

    if let Some(found) = JSON_OBJECT_RE.find(text) {
        if let Ok(value) = serde_json::from_str::<Value>(found.as_str()) {
            return Ok(value);
        }
    }

    let snippet: String = text.chars().take(500).collect();
    Err(ExtractError::JsonParse(snippet))
}
