//! Accuracy checks, ported from `quality_checker.py::_check_accuracy`:
//! date-format sanity, page-number sanity, placeholder-text detection, and
//! minimum snippet length.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::score::AccuracyIssue;

static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}(-\d{2}(-\d{2})?)?$").unwrap());

const PLACEHOLDER_PATTERNS: &[&str] = &[
    "TBD",
    "TODO",
    "PLACEHOLDER",
    "N/A",
    "???",
    "[PLACEHOLDER]",
    "[TBD]",
    "[TODO]",
    "[N/A]",
    "NOT AVAILABLE",
    "NOT SPECIFIED",
    "VALUE_NOT_FOUND",
    "EXTRACTED_VALUE",
    "UNKNOWN",
    "UNSPECIFIED",
    "TO BE DETERMINED",
    "TO BE CONFIRMED",
    "PENDING",
    "<PLACEHOLDER>",
    "<TBD>",
    "STRING",
    "NULL",
    "NONE",
];

const MIN_SNIPPET_LENGTH: usize = 15;

pub fn check_accuracy(data: &Value) -> (f64, Vec<AccuracyIssue>) {
    let mut issues = Vec::new();
    let mut total = 0u64;
    let mut passed = 0u64;
    traverse(data, "$", &mut total, &mut passed, &mut issues);

    let accuracy = if total == 0 { 1.0 } else { passed as f64 / total as f64 };
    (accuracy, issues)
}

fn traverse(obj: &Value, path: &str, total: &mut u64, passed: &mut u64, issues: &mut Vec<AccuracyIssue>) {
    match obj {
        Value::Object(map) => {
            for (key, value) in map {
                let field_path = format!("{path}.{key}");

                if key.to_lowercase().contains("date") {
                    if let Some(s) = value.as_str().filter(|s| !s.is_empty()) {
                        *total += 1;
                        if DATE_RE.is_match(s) {
                            *passed += 1;
                        } else {
                            issues.push(AccuracyIssue {
                                path: field_path.clone(),
                                issue: "invalid_date_format".to_string(),
                                value: s.to_string(),
                            });
                        }
                    }
                }

                if key == "page_number" {
                    *total += 1;
                    match value {
                        Value::Number(n) if n.as_i64().map(|v| v >= 1).unwrap_or(false) => *passed += 1,
                        Value::Null => *passed += 1,
                        other => issues.push(AccuracyIssue {
                            path: field_path.clone(),
                            issue: "invalid_page_number".to_string(),
                            value: other.to_string(),
                        }),
                    }
                }

                if let Some(s) = value.as_str().filter(|s| !s.is_empty()) {
                    *total += 1;
                    let upper = s.to_uppercase();
                    if PLACEHOLDER_PATTERNS.iter().any(|p| upper.contains(p)) {
                        issues.push(AccuracyIssue {
                            path: field_path.clone(),
                            issue: "placeholder_text".to_string(),
                            value: s.chars().take(100).collect(),
                        });
                    } else {
                        *passed += 1;
                    }
                }

                if key == "text_snippet" {
                    if let Some(s) = value.as_str() {
                        *total += 1;
                        if s.trim().chars().count() >= MIN_SNIPPET_LENGTH {
                            *passed += 1;
                        } else {
                            issues.push(AccuracyIssue {
                                path: field_path.clone(),
                                issue: "snippet_too_short".to_string(),
                                value: s.to_string(),
                            });
                        }
                    }
                }

                if value.is_object() || value.is_array() {
                    traverse(value, &field_path, total, passed, issues);
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                traverse(item, &format!("{path}[{i}]"), total, passed, issues);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_data_scores_perfectly() {
        let data = json!({"studyTitle": "A Phase 3 Study", "startDate": "2024-01-15"});
        let (score, issues) = check_accuracy(&data);
        assert_eq!(score, 1.0);
        assert!(issues.is_empty());
    }

    #[test]
    fn placeholder_text_is_flagged() {
        let data = json!({"sponsorName": "TBD"});
        let (_, issues) = check_accuracy(&data);
        assert!(issues.iter().any(|i| i.issue == "placeholder_text"));
    }

    #[test]
    fn malformed_date_is_flagged() {
        let data = json!({"enrollmentDate": "15/01/2024"});
        let (_, issues) = check_accuracy(&data);
        assert!(issues.iter().any(|i| i.issue == "invalid_date_format"));
    }

    #[test]
    fn null_page_number_is_accepted() {
        let data = json!({"page_number": null});
        let (score, issues) = check_accuracy(&data);
        assert_eq!(score, 1.0);
        assert!(issues.is_empty());
    }
}
