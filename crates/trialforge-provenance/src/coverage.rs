//! Provenance coverage calculation (spec §4.H), ported from
//! `provenance_compliance.py::ProvenanceCompliance.calculate_coverage`.
//!
//! Every extracted scalar field must carry provenance, either:
//! - nested: the containing object has a `provenance` key (explicit or derived), or
//! - inherited: an ancestor object has valid provenance, or
//! - sibling: a `<field>Provenance` key sits next to the scalar field.
//!
//! Open Question decision: when both nested and sibling provenance exist for
//! the same field, nested wins — it is checked first and short-circuits the
//! sibling lookup, matching the original traversal order.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashSet;

const MIN_SNIPPET_LENGTH: usize = 10;
const MAX_PAGE_NUMBER: i64 = 10_000;

static EXEMPT_FIELDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "id",
        "instanceType",
        "schemaVersion",
        "name",
        "label",
        "provenance",
        "extraction_statistics",
        "ich_m11_section",
        "extensionAttributes",
        "extractedAt",
        "modelVersion",
        "sectionNumber",
        "title",
        "_metadata",
        "module_id",
        "instance_type",
        "pass1_duration_seconds",
        "pass2_duration_seconds",
        "quality_score",
        "endpoint_ids",
        "endpoint_id",
        "analysis_population_id",
        "for_endpoint_ids",
        "is_primary_for_endpoints",
        "is_sensitivity_for_endpoints",
        "sensitivity_analysis_ids",
        "target_estimand_id",
        "assessment_timepoints_weeks",
        "primary_timepoint_weeks",
        "stratification_factors",
        "covariates",
        "categories",
        "inclusion_criteria",
        "exclusion_criteria",
        "assumptions",
        "exclusions",
        "exceptions",
        "recipients",
        "responsibilities",
        "grade_definitions",
        "stopping_conditions",
        "levels",
        "actions",
        "system_capabilities",
        "language_requirements",
        "forms",
        "visit_schedule",
        "standard_checks",
        "protocol_specific_checks",
        "critical_data_points",
        "auto_query_triggers",
        "external_data_sources",
        "calculated_fields",
        "derived_variables",
        "prerequisites",
        "signoff_required",
        "archival_format",
        "data_included",
        "data_collected",
        "instruments_collected",
        "adjudication_types",
        "accreditations",
        "analytes",
        "allowed_tests",
        "notification_recipients",
        "timepoints",
        "timepoint_name",
        "timepoint_type",
        "window",
        "conditions",
        "data_handling_options",
        "required_assessments",
        "documentation_requirements",
        "assessments",
        "information_collected",
        "contact_methods",
        "documentation_required",
        "replacement_conditions",
        "reasons",
        "notification_requirements",
        "analysis_populations",
        "prevention_measures",
        "incentives",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MissingField {
    pub path: String,
    pub value: String,
}

/// Is `obj` (a JSON object) itself carrying valid nested provenance — either
/// dual-mode (`kind: explicit|derived`) or the legacy single-mode shape?
pub fn has_valid_provenance(obj: &Value) -> bool {
    let Some(provenance) = obj.get("provenance") else {
        return false;
    };
    if provenance.is_null() {
        return false;
    }

    match provenance.get("kind").and_then(Value::as_str) {
        Some("explicit") => provenance
            .get("explicit")
            .map(validate_explicit_provenance)
            .unwrap_or(false),
        Some("derived") => provenance
            .get("derived")
            .map(validate_derived_provenance)
            .unwrap_or(false),
        _ => validate_explicit_provenance(provenance),
    }
}

pub fn validate_explicit_provenance(provenance: &Value) -> bool {
    let page_ok = match provenance.get("page_number") {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|p| (1..=MAX_PAGE_NUMBER).contains(&p))
            .unwrap_or(false),
        _ => false,
    };
    if !page_ok {
        return false;
    }

    match provenance.get("text_snippet").and_then(Value::as_str) {
        Some(snippet) => snippet.trim().chars().count() >= MIN_SNIPPET_LENGTH,
        None => false,
    }
}

pub fn validate_derived_provenance(provenance: &Value) -> bool {
    let reasoning = provenance.get("reasoning").and_then(Value::as_str);
    let confidence = provenance.get("confidence").and_then(Value::as_str);

    match (reasoning, confidence) {
        (Some(reasoning), Some(confidence)) => {
            reasoning.chars().count() >= 50 && matches!(confidence, "high" | "medium" | "low")
        }
        _ => false,
    }
}

fn has_sibling_provenance(parent: &Value, key: &str) -> bool {
    let provenance_key = format!("{key}Provenance");
    match parent.get(&provenance_key) {
        Some(sibling) if sibling.is_object() => validate_explicit_provenance(sibling),
        _ => false,
    }
}

/// Walk `data` and return (coverage_ratio, missing_fields). `coverage_ratio`
/// is `1.0` when there is nothing to cover.
pub fn calculate_coverage(data: &Value) -> (f64, Vec<MissingField>) {
    let mut total = 0u64;
    let mut covered = 0u64;
    let mut missing = Vec::new();

    traverse(data, "$", false, None, None, &mut total, &mut covered, &mut missing);

    let coverage = if total == 0 { 1.0 } else { covered as f64 / total as f64 };
    (coverage, missing)
}

#[allow(clippy::too_many_arguments)]
fn traverse(
    obj: &Value,
    current_path: &str,
    parent_has_provenance: bool,
    parent_obj: Option<&Value>,
    field_key: Option<&str>,
    total: &mut u64,
    covered: &mut u64,
    missing: &mut Vec<MissingField>,
) {
    match obj {
        Value::Object(map) => {
            let has_provenance = has_valid_provenance(obj);

            for (key, value) in map {
                if EXEMPT_FIELDS.contains(key.as_str()) || key.ends_with("Provenance") {
                    continue;
                }
                let field_path = format!("{current_path}.{key}");

                if value.is_object() || value.is_array() {
                    traverse(
                        value,
                        &field_path,
                        has_provenance || parent_has_provenance,
                        Some(obj),
                        Some(key),
                        total,
                        covered,
                        missing,
                    );
                } else if !value.is_null() {
                    *total += 1;
                    let has_sibling = has_sibling_provenance(obj, key);
                    if has_provenance || parent_has_provenance || has_sibling {
                        *covered += 1;
                    } else {
                        missing.push(MissingField {
                            path: field_path,
                            value: truncated(value),
                        });
                    }
                }
            }
        }
        Value::Array(items) => {
            let mut array_provenance = false;
            if let (Some(parent), Some(key)) = (parent_obj, field_key) {
                array_provenance = has_sibling_provenance(parent, key);
                if !array_provenance {
                    array_provenance = has_valid_provenance(parent);
                }
            }

            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{current_path}[{i}]");
                if item.is_object() {
                    traverse(item, &item_path, false, Some(obj), None, total, covered, missing);
                } else if !item.is_null() {
                    *total += 1;
                    if array_provenance {
                        *covered += 1;
                    } else {
                        missing.push(MissingField {
                            path: item_path,
                            value: truncated(item),
                        });
                    }
                }
            }
        }
        _ => {}
    }
}

fn truncated(value: &Value) -> String {
    let s = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    s.chars().take(100).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fully_covered_explicit_provenance_yields_full_coverage() {
        let data = json!({
            "studyTitle": "A Phase 3 Study",
            "provenance": {
                "kind": "explicit",
                "explicit": {"page_number": 1, "text_snippet": "A Phase 3 Study of Drug X"}
            }
        });
        let (coverage, missing) = calculate_coverage(&data);
        assert_eq!(coverage, 1.0);
        assert!(missing.is_empty());
    }

    #[test]
    fn missing_provenance_is_reported() {
        let data = json!({"studyTitle": "A Phase 3 Study"});
        let (coverage, missing) = calculate_coverage(&data);
        assert_eq!(coverage, 0.0);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].path, "$.studyTitle");
    }

    #[test]
    fn sibling_provenance_pattern_counts_as_covered() {
        let data = json!({
            "therapeuticArea": "Oncology",
            "therapeuticAreaProvenance": {"page_number": 3, "text_snippet": "Therapeutic Area: Oncology"}
        });
        let (coverage, missing) = calculate_coverage(&data);
        assert_eq!(coverage, 1.0);
        assert!(missing.is_empty());
    }

    #[test]
    fn derived_provenance_requires_substantive_reasoning_and_valid_confidence() {
        let obj = json!({
            "kind": "derived",
            "derived": {
                "reasoning": "short",
                "confidence": "high"
            }
        });
        assert!(!has_valid_provenance(&json!({"provenance": obj})));
    }

    #[test]
    fn exempt_fields_never_count_against_coverage() {
        let data = json!({"id": "abc", "instanceType": "StudyDesign"});
        let (coverage, missing) = calculate_coverage(&data);
        assert_eq!(coverage, 1.0);
        assert!(missing.is_empty());
    }
}
