//! Surgical retry: re-extract only the fields that failed quality checks
//! instead of regenerating the whole module output. Ported from
//! `two_phase_extractor.py`'s `_extract_failed_paths`,
//! `_get_top_level_fields_from_paths`, `_build_surgical_prompt`,
//! `_deep_merge`, and `_should_use_surgical_retry`.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use trialforge_config::thresholds::RetryConfig;
use trialforge_quality::QualityScore;

const MAX_ISSUES_SHOWN: usize = 10;

static TOP_LEVEL_FIELD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([a-zA-Z_][a-zA-Z0-9_]*)").unwrap());

#[derive(Debug, Clone, Default)]
pub struct FailedPaths {
    pub accuracy: Vec<String>,
    pub completeness: Vec<String>,
    pub usdm_adherence: Vec<String>,
    pub provenance: Vec<String>,
    pub terminology: Vec<String>,
}

impl FailedPaths {
    fn all_paths(&self) -> impl Iterator<Item = &String> {
        self.accuracy
            .iter()
            .chain(self.usdm_adherence.iter())
            .chain(self.provenance.iter())
            .chain(self.terminology.iter())
    }
}

/// Collect the distinct field paths behind each dimension's issue list.
#[must_use]
pub fn extract_failed_paths(quality: &QualityScore) -> FailedPaths {
    let mut failed = FailedPaths::default();

    for issue in &quality.accuracy_issues {
        if !failed.accuracy.contains(&issue.path) {
            failed.accuracy.push(issue.path.clone());
        }
    }
    for issue in &quality.completeness_issues {
        if !failed.completeness.contains(&issue.field) {
            failed.completeness.push(issue.field.clone());
        }
    }
    for issue in &quality.usdm_adherence_issues {
        if !failed.usdm_adherence.contains(&issue.path) {
            failed.usdm_adherence.push(issue.path.clone());
        }
    }
    for issue in &quality.provenance_issues {
        if !failed.provenance.contains(&issue.path) {
            failed.provenance.push(issue.path.clone());
        }
    }
    for issue in &quality.terminology_issues {
        if !failed.terminology.contains(&issue.path) {
            failed.terminology.push(issue.path.clone());
        }
    }

    failed
}

/// `"$.studyPhase.code"` -> `"studyPhase"`, `"$.arms[0].name"` -> `"arms"`.
#[must_use]
pub fn top_level_fields_from_paths<'a>(paths: impl IntoIterator<Item = &'a String>) -> BTreeSet<String> {
    let mut top_level = BTreeSet::new();
    for path in paths {
        let clean = path.trim_start_matches("$.").trim_start_matches('.');
        if let Some(caps) = TOP_LEVEL_FIELD_RE.captures(clean) {
            top_level.insert(caps[1].to_string());
        }
    }
    top_level
}

#[must_use]
pub fn failed_top_level_fields(failed: &FailedPaths) -> BTreeSet<String> {
    let mut fields = top_level_fields_from_paths(failed.all_paths());
    fields.extend(failed.completeness.iter().cloned());
    fields
}

/// Build the "only re-extract these fields" prompt suffix.
#[must_use]
pub fn build_surgical_prompt(failed: &FailedPaths, pass_type: &str) -> String {
    let failed_fields = failed_top_level_fields(failed);
    if failed_fields.is_empty() {
        return String::new();
    }

    let mut lines = vec![
        "\n\n## SURGICAL RETRY - ONLY RE-EXTRACT SPECIFIC FIELDS".to_string(),
        String::new(),
        "IMPORTANT: Your previous extraction was mostly correct. Only the following".to_string(),
        "fields have issues and need to be re-extracted. Return ONLY these fields".to_string(),
        "in your JSON response - do NOT include fields that were already correct.".to_string(),
        String::new(),
        "### FIELDS REQUIRING RE-EXTRACTION:".to_string(),
    ];
    for field in &failed_fields {
        lines.push(format!("- `{field}`"));
    }

    lines.push(String::new());
    lines.push("### SPECIFIC ISSUES TO FIX:".to_string());

    if !failed.accuracy.is_empty() {
        lines.push("\n**Accuracy Issues:**".to_string());
        for path in failed.accuracy.iter().take(MAX_ISSUES_SHOWN) {
            lines.push(format!("- `{path}`: contains placeholder or invalid value"));
        }
    }
    if !failed.completeness.is_empty() {
        lines.push("\n**Missing Required Fields:**".to_string());
        for field in failed.completeness.iter().take(MAX_ISSUES_SHOWN) {
            lines.push(format!("- `{field}`: REQUIRED but missing or empty"));
        }
    }
    if !failed.usdm_adherence.is_empty() {
        lines.push("\n**Schema Adherence Issues:**".to_string());
        for path in failed.usdm_adherence.iter().take(MAX_ISSUES_SHOWN) {
            lines.push(format!("- `{path}`: violates JSON schema"));
        }
    }
    if !failed.provenance.is_empty() && pass_type == "pass2" {
        lines.push("\n**Missing Provenance:**".to_string());
        for path in failed.provenance.iter().take(MAX_ISSUES_SHOWN) {
            lines.push(format!("- `{path}`: needs page_number and text_snippet"));
        }
    }
    if !failed.terminology.is_empty() {
        lines.push("\n**CDISC Terminology Issues:**".to_string());
        for path in failed.terminology.iter().take(MAX_ISSUES_SHOWN) {
            lines.push(format!("- `{path}`: invalid code/decode pair"));
        }
    }

    lines.push(String::new());
    lines.push("### RESPONSE FORMAT:".to_string());
    lines.push("Return a JSON object containing ONLY the fields listed above.".to_string());
    lines.push("Do NOT include any fields that were already correct.".to_string());

    lines.join("\n")
}

/// Replace only `failed_fields` in `base` with their counterparts from
/// `updates`; every other field of `base` is preserved untouched.
#[must_use]
pub fn deep_merge(base: &Value, updates: &Value, failed_fields: &BTreeSet<String>) -> Value {
    let mut result = base.clone();
    let Some(result_map) = result.as_object_mut() else {
        return result;
    };
    let updates_map = updates.as_object();

    for field in failed_fields {
        match updates_map.and_then(|m| m.get(field)) {
            Some(value) => {
                result_map.insert(field.clone(), value.clone());
            }
            None => {
                tracing::warn!(field = %field, "surgical merge: field not in retry response, keeping original");
            }
        }
    }

    result
}

/// Mirrors `_should_use_surgical_retry`: only worth it when issues are
/// localized (decent average quality on the dimensions that failed) and
/// the JSON isn't structurally broken (schema adherence not catastrophic).
#[must_use]
pub fn should_use_surgical_retry(quality: &QualityScore, thresholds: &trialforge_config::thresholds::QualityThresholds, retry: &RetryConfig) -> bool {
    let total_issues = quality.accuracy_issues.len()
        + quality.completeness_issues.len()
        + quality.usdm_adherence_issues.len()
        + quality.provenance_issues.len()
        + quality.terminology_issues.len();
    if total_issues == 0 {
        return false;
    }

    if quality.usdm_adherence < retry.surgical_min_schema_adherence {
        return false;
    }

    let avg = quality.avg_score_on_failed_dimensions(thresholds);
    avg >= retry.surgical_min_avg_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trialforge_quality::score::{AccuracyIssue, CompletenessIssue};

    #[test]
    fn top_level_fields_strip_subpaths_and_indices() {
        let paths = vec!["$.studyPhase.code".to_string(), "$.arms[0].name".to_string()];
        let fields = top_level_fields_from_paths(paths.iter());
        assert_eq!(fields, BTreeSet::from(["studyPhase".to_string(), "arms".to_string()]));
    }

    #[test]
    fn deep_merge_only_touches_failed_fields() {
        let base = json!({"a": 1, "b": 2, "c": 3});
        let updates = json!({"a": 99, "b": 98});
        let failed = BTreeSet::from(["a".to_string()]);

        let merged = deep_merge(&base, &updates, &failed);
        assert_eq!(merged, json!({"a": 99, "b": 2, "c": 3}));
    }

    #[test]
    fn deep_merge_keeps_original_when_update_missing_field() {
        let base = json!({"a": 1});
        let updates = json!({});
        let failed = BTreeSet::from(["a".to_string()]);
        assert_eq!(deep_merge(&base, &updates, &failed), json!({"a": 1}));
    }

    #[test]
    fn no_issues_means_no_surgical_retry_needed() {
        let quality = QualityScore {
            accuracy: 1.0,
            completeness: 1.0,
            usdm_adherence: 1.0,
            provenance: 1.0,
            terminology: 1.0,
            ..Default::default()
        };
        let thresholds = Default::default();
        let retry = RetryConfig::default();
        assert!(!should_use_surgical_retry(&quality, &thresholds, &retry));
    }

    #[test]
    fn low_schema_adherence_forces_full_retry() {
        let quality = QualityScore {
            usdm_adherence: 0.3,
            usdm_adherence_issues: vec![trialforge_quality::score::SchemaIssue {
                path: "$.x".into(),
                message: "bad".into(),
            }],
            ..Default::default()
        };
        let thresholds = Default::default();
        let retry = RetryConfig::default();
        assert!(!should_use_surgical_retry(&quality, &thresholds, &retry));
    }

    #[test]
    fn localized_high_quality_issues_use_surgical_retry() {
        let quality = QualityScore {
            accuracy: 0.8,
            completeness: 1.0,
            usdm_adherence: 1.0,
            provenance: 1.0,
            terminology: 1.0,
            accuracy_issues: vec![AccuracyIssue {
                path: "$.foo".into(),
                issue: "placeholder".into(),
                value: "TBD".into(),
            }],
            completeness_issues: vec![CompletenessIssue { field: "bar".into() }],
            ..Default::default()
        };
        let thresholds = Default::default();
        let retry = RetryConfig::default();
        assert!(should_use_surgical_retry(&quality, &thresholds, &retry));
    }
}
