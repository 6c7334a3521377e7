//! Top-level evaluation entry points, ported from
//! `quality_checker.py::QualityChecker.evaluate` / `.evaluate_pass1`.

use serde_json::Value;

use crate::accuracy::check_accuracy;
use crate::completeness::check_completeness;
use crate::schema_adherence::check_usdm_adherence;
use crate::score::QualityScore;

/// Which extraction pass produced `data`. Pass 1 (values only) skips
/// provenance and terminology — those are only meaningful once Pass 2 has
/// attached citations (spec §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassType {
    Pass1,
    Pass2,
    Combined,
}

/// Full evaluation across all five dimensions (Pass 2 output, or a combined
/// / cached result).
#[must_use]
pub fn evaluate(data: &Value, schema: &Value) -> QualityScore {
    evaluate_with_pass(data, schema, PassType::Combined)
}

/// Pass 1 evaluation: accuracy, completeness, and schema adherence only.
/// Provenance and terminology default to `1.0` (not yet checked) rather
/// than `0.0`, so a Pass-1-only score isn't mistaken for a failing one.
#[must_use]
pub fn evaluate_pass1(data: &Value, schema: &Value) -> QualityScore {
    evaluate_with_pass(data, schema, PassType::Pass1)
}

fn evaluate_with_pass(data: &Value, schema: &Value, pass_type: PassType) -> QualityScore {
    let (accuracy, accuracy_issues) = check_accuracy(data);
    let (completeness, completeness_issues) = check_completeness(data, schema);
    let (usdm_adherence, usdm_adherence_issues) = check_usdm_adherence(data, schema);

    let (provenance, provenance_issues, provenance_format_issues, terminology, terminology_issues) =
        if pass_type == PassType::Pass1 {
            (1.0, Vec::new(), Vec::new(), 1.0, Vec::new())
        } else {
            let (provenance, provenance_issues) = trialforge_provenance::calculate_coverage(data);
            let provenance_format_issues = trialforge_provenance::validate_provenance_format(data);
            let terminology_issues = trialforge_provenance::validate_extraction_data(data);
            let stats = trialforge_provenance::get_validation_stats(data);

            let terminology = if terminology_issues.is_empty() {
                1.0
            } else if stats.recognized_fields == 0 {
                1.0
            } else {
                (1.0 - (terminology_issues.len() as f64 / stats.recognized_fields as f64)).max(0.0)
            };

            (
                provenance,
                provenance_issues,
                provenance_format_issues,
                terminology,
                terminology_issues,
            )
        };

    QualityScore {
        accuracy,
        completeness,
        usdm_adherence,
        provenance,
        terminology,
        accuracy_issues,
        completeness_issues,
        usdm_adherence_issues,
        provenance_issues,
        provenance_format_issues,
        terminology_issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_schema() -> Value {
        json!({
            "type": "object",
            "required": ["studyTitle"],
            "properties": {"studyTitle": {"type": "string"}}
        })
    }

    #[test]
    fn pass1_skips_provenance_and_terminology() {
        let data = json!({"studyTitle": "A Study"});
        let score = evaluate_pass1(&data, &sample_schema());
        assert_eq!(score.provenance, 1.0);
        assert_eq!(score.terminology, 1.0);
        assert!(score.provenance_issues.is_empty());
    }

    #[test]
    fn combined_pass_checks_provenance() {
        let data = json!({"studyTitle": "A Study"});
        let score = evaluate(&data, &sample_schema());
        assert!(score.provenance < 1.0);
        assert!(!score.provenance_issues.is_empty());
    }
}
