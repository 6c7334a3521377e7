//! Extraction-process metadata block, ported from
//! `usdm_combiner.py::_build_extraction_metadata`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use trialforge_store::types::ModuleResult;

const PIPELINE_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize)]
pub struct PageNumberingInfo {
    pub first_numbered_page: u32,
    pub page_offset: i64,
    pub detected_at: DateTime<Utc>,
    pub confidence: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualitySummaryEntry {
    pub overall_score: f64,
    pub from_cache: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionMetadata {
    pub extraction_timestamp: DateTime<Utc>,
    pub pipeline_version: &'static str,
    pub primary_model: String,
    pub agent_count: usize,
    pub successful_agents: Vec<String>,
    pub failed_agents: Vec<String>,
    pub page_numbering_info: Option<PageNumberingInfo>,
    pub quality_summary: BTreeMap<String, QualitySummaryEntry>,
    pub average_quality_score: Option<f64>,
}

#[must_use]
pub fn build_extraction_metadata(
    module_results: &[ModuleResult],
    model_name: &str,
    page_offset: Option<i64>,
    now: DateTime<Utc>,
) -> ExtractionMetadata {
    let mut successful_agents = Vec::new();
    let mut failed_agents = Vec::new();
    let mut quality_summary = BTreeMap::new();
    let mut valid_scores = Vec::new();

    for result in module_results {
        match result.status {
            trialforge_store::types::ModuleResultStatus::Completed => {
                successful_agents.push(result.module_id.clone());
                let overall = overall_score(&result.quality_score);
                quality_summary.insert(
                    result.module_id.clone(),
                    QualitySummaryEntry {
                        overall_score: overall,
                        from_cache: result.from_cache,
                    },
                );
                valid_scores.push(overall);
            }
            trialforge_store::types::ModuleResultStatus::Failed => {
                failed_agents.push(result.module_id.clone());
            }
        }
    }

    let average_quality_score = if valid_scores.is_empty() {
        None
    } else {
        Some(valid_scores.iter().sum::<f64>() / valid_scores.len() as f64)
    };

    let page_numbering_info = page_offset.map(|offset| PageNumberingInfo {
        first_numbered_page: 1,
        page_offset: offset,
        detected_at: now,
        confidence: if offset == 0 { "none" } else { "high" },
    });

    ExtractionMetadata {
        extraction_timestamp: now,
        pipeline_version: PIPELINE_VERSION,
        primary_model: model_name.to_string(),
        agent_count: module_results.len(),
        successful_agents,
        failed_agents,
        page_numbering_info,
        quality_summary,
        average_quality_score,
    }
}

fn overall_score(quality_score: &Value) -> f64 {
    quality_score.get("overall").and_then(Value::as_f64).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trialforge_store::types::ModuleResultStatus;

    fn result(module_id: &str, status: ModuleResultStatus, overall: f64) -> ModuleResult {
        ModuleResult {
            job_id: "job-1".into(),
            module_id: module_id.into(),
            status,
            extracted_data: json!({}),
            provenance_coverage: 1.0,
            quality_score: json!({"overall": overall}),
            pass1_duration_ms: 0,
            pass2_duration_ms: 0,
            retry_count: 0,
            from_cache: false,
            error_details: None,
        }
    }

    #[test]
    fn categorizes_successful_and_failed_agents_separately() {
        let now = Utc::now();
        let results = vec![
            result("study_metadata", ModuleResultStatus::Completed, 0.95),
            result("adverse_events", ModuleResultStatus::Failed, 0.0),
        ];
        let meta = build_extraction_metadata(&results, "claude-x", Some(2), now);
        assert_eq!(meta.successful_agents, vec!["study_metadata".to_string()]);
        assert_eq!(meta.failed_agents, vec!["adverse_events".to_string()]);
        assert_eq!(meta.average_quality_score, Some(0.95));
        assert_eq!(meta.page_numbering_info.unwrap().page_offset, 2);
    }

    #[test]
    fn empty_results_produce_no_average_score() {
        let meta = build_extraction_metadata(&[], "claude-x", None, Utc::now());
        assert_eq!(meta.average_quality_score, None);
        assert!(meta.page_numbering_info.is_none());
    }
}
