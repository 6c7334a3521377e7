//! Completeness check, ported from `quality_checker.py::_check_completeness`:
//! fraction of the schema's top-level `required` fields that are present
//! and non-empty.

use serde_json::Value;

use crate::score::CompletenessIssue;

pub fn check_completeness(data: &Value, schema: &Value) -> (f64, Vec<CompletenessIssue>) {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if required.is_empty() {
        return (1.0, Vec::new());
    }

    let mut issues = Vec::new();
    let mut present = 0u64;

    for field in &required {
        let is_present = match data.get(field) {
            Some(Value::Null) | None => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(_) => true,
        };
        if is_present {
            present += 1;
        } else {
            issues.push(CompletenessIssue { field: (*field).to_string() });
        }
    }

    (present as f64 / required.len() as f64, issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn all_required_fields_present_scores_one() {
        let schema = json!({"required": ["studyTitle", "studyPhase"]});
        let data = json!({"studyTitle": "X", "studyPhase": "III"});
        let (score, issues) = check_completeness(&data, &schema);
        assert_eq!(score, 1.0);
        assert!(issues.is_empty());
    }

    #[test]
    fn missing_field_reduces_score_proportionally() {
        let schema = json!({"required": ["a", "b", "c", "d"]});
        let data = json!({"a": "x", "b": "y"});
        let (score, issues) = check_completeness(&data, &schema);
        assert_eq!(score, 0.5);
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let schema = json!({"required": ["studyTitle"]});
        let data = json!({"studyTitle": ""});
        let (score, _) = check_completeness(&data, &schema);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn schema_with_no_required_fields_scores_one() {
        let schema = json!({});
        let data = json!({});
        let (score, issues) = check_completeness(&data, &schema);
        assert_eq!(score, 1.0);
        assert!(issues.is_empty());
    }
}
