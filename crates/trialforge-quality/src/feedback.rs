//! Retry feedback prompt generation, ported from
//! `quality_checker.py::generate_feedback_prompt` /
//! `generate_pass1_feedback` / `generate_pass2_feedback`. These produce the
//! text appended to a retry prompt so the model sees exactly what failed
//! last time instead of re-guessing blind.

use trialforge_config::thresholds::QualityThresholds;

use crate::score::QualityScore;

const MAX_ISSUES: usize = 10;

fn truncate_value(value: &str, max: usize) -> String {
    if value.chars().count() > max {
        format!("{}...", value.chars().take(max).collect::<String>())
    } else {
        value.to_string()
    }
}

/// Combined-pass feedback: only surfaces issues for dimensions that
/// actually failed their threshold.
#[must_use]
pub fn generate_feedback_prompt(quality: &QualityScore, thresholds: &QualityThresholds) -> String {
    let failed = quality.failed_dimensions(thresholds);
    if failed.is_empty() {
        return String::new();
    }

    let mut lines = vec![
        "\n\n## QUALITY FEEDBACK - CORRECTIONS REQUIRED".to_string(),
        "Your previous extraction had the following issues that MUST be fixed:\n".to_string(),
    ];

    if failed.contains(&"accuracy") && !quality.accuracy_issues.is_empty() {
        lines.push("### Accuracy Issues:".to_string());
        for issue in quality.accuracy_issues.iter().take(MAX_ISSUES) {
            lines.push(format!(
                "- `{}`: {} (value: {})",
                issue.path,
                issue.issue,
                truncate_value(&issue.value, 50)
            ));
        }
        lines.push(String::new());
    }

    if failed.contains(&"completeness") && !quality.completeness_issues.is_empty() {
        lines.push("### Missing Required Fields:".to_string());
        for issue in quality.completeness_issues.iter().take(MAX_ISSUES) {
            lines.push(format!("- `{}`: REQUIRED but not provided", issue.field));
        }
        lines.push(String::new());
    }

    if failed.contains(&"usdm_adherence") && !quality.usdm_adherence_issues.is_empty() {
        lines.push("### Schema Adherence Errors:".to_string());
        for issue in quality.usdm_adherence_issues.iter().take(MAX_ISSUES) {
            lines.push(format!("- `{}`: {}", issue.path, issue.message));
        }
        lines.push(String::new());
    }

    if failed.contains(&"provenance") && !quality.provenance_issues.is_empty() {
        lines.push("### Fields Missing Provenance:".to_string());
        for issue in quality.provenance_issues.iter().take(MAX_ISSUES) {
            lines.push(format!("- `{}`: value={}", issue.path, truncate_value(&issue.value, 50)));
        }
        lines.push(String::new());
    }

    if failed.contains(&"terminology") && !quality.terminology_issues.is_empty() {
        lines.push("### CDISC Terminology Issues:".to_string());
        for issue in quality.terminology_issues.iter().take(MAX_ISSUES) {
            lines.push(format!("- `{}`: {} - {}", issue.path, issue.issue, issue.error));
        }
        lines.push(String::new());
    }

    lines.push("### CORRECTIONS REQUIRED:".to_string());
    lines.push("1. Fix ALL issues listed above".to_string());
    lines.push("2. Ensure all required fields have values".to_string());
    lines.push("3. Add provenance (page_number, text_snippet) for every field".to_string());
    lines.push("4. Ensure text_snippet is an EXACT quote from the PDF (10-500 chars)".to_string());
    lines.push("5. Use valid CDISC CT codes (e.g., C49686 for Phase 3, C98388 for Interventional)".to_string());

    lines.join("\n")
}

/// Pass 1 retry feedback: accuracy, completeness, and schema-adherence
/// issues plus a truncated echo of the previous output, so the model can
/// see and avoid repeating its own mistakes.
#[must_use]
pub fn generate_pass1_feedback(quality: &QualityScore, previous_result: &serde_json::Value) -> String {
    let mut lines = vec![
        "\n\n## QUALITY FEEDBACK - CORRECTIONS REQUIRED".to_string(),
        "Your previous extraction had the following issues that MUST be fixed:\n".to_string(),
    ];

    if !quality.accuracy_issues.is_empty() {
        lines.push("### Accuracy Issues:".to_string());
        for issue in quality.accuracy_issues.iter().take(5) {
            lines.push(format!("- `{}`: {} (value: {})", issue.path, issue.issue, issue.value));
        }
        lines.push(String::new());
    }

    if !quality.completeness_issues.is_empty() {
        lines.push("### Missing Required Fields:".to_string());
        for issue in quality.completeness_issues.iter().take(5) {
            lines.push(format!("- `{}`: REQUIRED but not provided", issue.field));
        }
        lines.push(String::new());
    }

    if !quality.usdm_adherence_issues.is_empty() {
        lines.push("### Schema Adherence Errors:".to_string());
        for issue in quality.usdm_adherence_issues.iter().take(5) {
            lines.push(format!("- `{}`: {}", issue.path, issue.message));
        }
        lines.push(String::new());
    }

    lines.push("### PREVIOUS OUTPUT (DO NOT REPEAT THESE ERRORS):".to_string());
    lines.push("```json".to_string());
    let prev_json = serde_json::to_string_pretty(previous_result).unwrap_or_default();
    lines.push(truncate_value(&prev_json, 2000));
    lines.push("```".to_string());
    lines.push(String::new());
    lines.push("Provide a CORRECTED extraction addressing ALL issues above.".to_string());

    lines.join("\n")
}

/// Pass 2 retry feedback. `quality` is `None` when the previous attempt
/// failed to parse as JSON at all.
#[must_use]
pub fn generate_pass2_feedback(quality: Option<&QualityScore>) -> String {
    let Some(quality) = quality else {
        return "\n\n## QUALITY FEEDBACK - RETRY REQUIRED\n\
            The previous extraction attempt failed to produce valid JSON.\n\
            Please ensure your response is a complete, valid JSON object.\n\
            Do not include any text before or after the JSON.\n"
            .to_string();
    };

    let mut lines = vec![
        "\n\n## QUALITY FEEDBACK - PROVENANCE CORRECTIONS REQUIRED".to_string(),
        "Your previous provenance extraction had the following issues:\n".to_string(),
    ];

    if !quality.provenance_issues.is_empty() {
        lines.push("### Fields Missing Provenance:".to_string());
        for issue in quality.provenance_issues.iter().take(MAX_ISSUES) {
            lines.push(format!("- `{}`: value={}", issue.path, truncate_value(&issue.value, 50)));
        }
        lines.push(String::new());
    }

    if !quality.usdm_adherence_issues.is_empty() {
        lines.push("### Schema Adherence Errors:".to_string());
        for issue in quality.usdm_adherence_issues.iter().take(MAX_ISSUES) {
            lines.push(format!("- `{}`: {}", issue.path, issue.message));
        }
        lines.push(String::new());
    }

    lines.push("### CORRECTIONS REQUIRED:".to_string());
    lines.push("1. Add provenance with page_number and text_snippet for EVERY field listed above".to_string());
    lines.push("2. Ensure text_snippet is an EXACT quote from the PDF (10-500 chars)".to_string());
    lines.push("3. Fix all schema compliance errors".to_string());
    lines.push("4. page_number must be a positive integer".to_string());

    lines.join("\n")
}
