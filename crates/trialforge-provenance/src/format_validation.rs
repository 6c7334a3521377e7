//! Provenance shape validation, ported from
//! `provenance_compliance.py::validate_provenance_format`. Distinct from
//! [`crate::coverage`]: coverage asks "does every field have provenance?",
//! this asks "is the provenance present well-formed?".

use serde_json::Value;

const MAX_SNIPPET_LENGTH: usize = 300;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FormatIssue {
    pub path: String,
    pub issue: String,
}

pub fn validate_provenance_format(data: &Value) -> Vec<FormatIssue> {
    let mut issues = Vec::new();
    traverse(data, "$", &mut issues);
    issues
}

fn traverse(obj: &Value, path: &str, issues: &mut Vec<FormatIssue>) {
    match obj {
        Value::Object(map) => {
            if let Some(provenance) = map.get("provenance") {
                issues.extend(check_provenance_format(provenance, path));
            }
            for (key, value) in map {
                if value.is_object() || value.is_array() {
                    traverse(value, &format!("{path}.{key}"), issues);
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                traverse(item, &format!("{path}[{i}]"), issues);
            }
        }
        _ => {}
    }
}

fn check_provenance_format(provenance: &Value, path: &str) -> Vec<FormatIssue> {
    let mut issues = Vec::new();
    let kind = provenance.get("kind").and_then(Value::as_str);

    match kind {
        Some("explicit") => {
            let explicit = provenance.get("explicit").cloned().unwrap_or(Value::Null);
            if !matches!(explicit.get("page_number"), Some(Value::Number(_))) {
                issues.push(FormatIssue {
                    path: format!("{path}.provenance.explicit.page_number"),
                    issue: "page_number must be an integer".to_string(),
                });
            }
            let snippet_len = explicit
                .get("text_snippet")
                .and_then(Value::as_str)
                .map(|s| s.chars().count())
                .unwrap_or(0);
            if snippet_len > MAX_SNIPPET_LENGTH {
                issues.push(FormatIssue {
                    path: format!("{path}.provenance.explicit.text_snippet"),
                    issue: format!("text_snippet exceeds {MAX_SNIPPET_LENGTH} chars"),
                });
            }
        }
        Some("derived") => {
            let confidence = provenance
                .get("derived")
                .and_then(|d| d.get("confidence"))
                .and_then(Value::as_str);
            if !matches!(confidence, Some("high" | "medium" | "low")) {
                issues.push(FormatIssue {
                    path: format!("{path}.provenance.derived.confidence"),
                    issue: "confidence must be high, medium, or low".to_string(),
                });
            }
        }
        None => {
            if !matches!(provenance.get("page_number"), Some(Value::Number(_))) {
                issues.push(FormatIssue {
                    path: format!("{path}.provenance.page_number"),
                    issue: "page_number must be an integer".to_string(),
                });
            }
        }
        Some(_) => {}
    }

    issues
}
