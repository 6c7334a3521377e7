//! USDM JSON-Schema adherence check, ported from
//! `quality_checker.py::_check_usdm_adherence`. A fully valid document
//! scores `1.0`; each violation reduces the score, capped at 10 errors
//! (beyond that, more errors don't make the output any less wrong).

use jsonschema::Validator;
use serde_json::Value;

use crate::score::SchemaIssue;

const MAX_PENALIZED_ERRORS: usize = 10;
const PENALTY_PER_ERROR: f64 = 0.1;

pub fn check_usdm_adherence(data: &Value, schema: &Value) -> (f64, Vec<SchemaIssue>) {
    let validator = match jsonschema::validator_for(schema) {
        Ok(v) => v,
        Err(e) => {
            return (
                0.0,
                vec![SchemaIssue {
                    path: "$".to_string(),
                    message: format!("schema failed to compile: {e}"),
                }],
            )
        }
    };

    let errors = collect_errors(&validator, data);
    if errors.is_empty() {
        return (1.0, Vec::new());
    }

    let adherence = (1.0 - (errors.len().min(MAX_PENALIZED_ERRORS) as f64 * PENALTY_PER_ERROR)).max(0.0);
    (adherence, errors)
}

fn collect_errors(validator: &Validator, data: &Value) -> Vec<SchemaIssue> {
    validator
        .iter_errors(data)
        .map(|e| SchemaIssue {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_document_scores_one() {
        let schema = json!({
            "type": "object",
            "required": ["studyTitle"],
            "properties": {"studyTitle": {"type": "string"}}
        });
        let data = json!({"studyTitle": "A Phase 3 Study"});
        let (score, issues) = check_usdm_adherence(&data, &schema);
        assert_eq!(score, 1.0);
        assert!(issues.is_empty());
    }

    #[test]
    fn missing_required_field_reduces_score() {
        let schema = json!({
            "type": "object",
            "required": ["studyTitle"],
            "properties": {"studyTitle": {"type": "string"}}
        });
        let data = json!({});
        let (score, issues) = check_usdm_adherence(&data, &schema);
        assert!(score < 1.0);
        assert!(!issues.is_empty());
    }

    #[test]
    fn error_count_is_capped_at_ten() {
        let schema = json!({
            "type": "object",
            "properties": (0..20).map(|i| (format!("f{i}"), json!({"type": "string"}))).collect::<serde_json::Map<_,_>>(),
            "required": (0..20).map(|i| format!("f{i}")).collect::<Vec<_>>(),
        });
        let data = json!({});
        let (score, _) = check_usdm_adherence(&data, &schema);
        assert!((score - 0.0).abs() < 1e-9);
    }
}
