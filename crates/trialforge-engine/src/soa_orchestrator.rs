//! SOA orchestrator (spec §4.F SOA job): drives the
//! `detecting_pages → awaiting_page_confirmation → extracting → saving
//! → analyzing_merges → awaiting_merge_confirmation` states, calling into
//! `trialforge-soa` for the actual detection/parsing/analysis work and
//! `trialforge-store::soa`/`jobs` for persistence — the same split
//! `ModuleOrchestrator` uses between orchestration and pipeline logic.

use rusqlite::Connection;
use serde_json::json;

use trialforge_llm::{LlmBackend, RemoteFileHandle};
use trialforge_soa::{analyze_merges, parse_html_table, summarize, DetectedPage, PageDetector};
use trialforge_store::types::{SoaTableCategory, TableResult};
use trialforge_store::{events, jobs, soa};

use crate::error::EngineError;
use crate::soa_state::{transition, SoaJobState};

pub struct SoaOrchestrator<'a> {
    pub backend: &'a dyn LlmBackend,
    pub model: String,
}

impl<'a> SoaOrchestrator<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn LlmBackend, model: impl Into<String>) -> Self {
        Self { backend, model: model.into() }
    }

    /// `detecting_pages → awaiting_page_confirmation`: one LLM call over
    /// the uploaded protocol naming candidate SOA table pages.
    pub async fn detect_pages(
        &self,
        conn: &Connection,
        job_id: &str,
        remote_file: Option<RemoteFileHandle>,
    ) -> Result<Vec<DetectedPage>, EngineError> {
        jobs::start(conn, job_id)?;
        events::emit(conn, job_id, "soa_detecting_pages", None, &json!({}))?;

        let detector = PageDetector::new(self.backend, self.model.clone());
        let pages = detector.detect(remote_file).await?;

        let payload = json!({"pages": pages.iter().map(|p| json!({
            "tableId": p.table_id, "category": p.category,
            "pageStart": p.page_start, "pageEnd": p.page_end,
        })).collect::<Vec<_>>()});
        jobs::save_result(conn, job_id, &payload)?;
        transition(conn, job_id, SoaJobState::DetectingPages, SoaJobState::AwaitingPageConfirmation)?;
        events::emit(conn, job_id, "soa_pages_detected", None, &payload)?;

        Ok(pages)
    }

    /// `awaiting_page_confirmation → extracting → saving`: given the
    /// caller-confirmed pages and the model's HTML transcription of each
    /// table, parse and persist every [`TableResult`].
    pub fn confirm_pages_and_extract(
        &self,
        conn: &Connection,
        job_id: &str,
        confirmed: &[(DetectedPage, String)],
    ) -> Result<Vec<TableResult>, EngineError> {
        transition(conn, job_id, SoaJobState::AwaitingPageConfirmation, SoaJobState::Extracting)?;

        let mut results = Vec::with_capacity(confirmed.len());
        for (page, html) in confirmed {
            let grid = parse_html_table(html)?;
            let summary = summarize(&page.table_id, &grid);
            let result = TableResult {
                job_id: job_id.to_string(),
                table_id: page.table_id.clone(),
                category: parse_category(&page.category),
                page_start: page.page_start,
                page_end: page.page_end,
                status: "extracted".to_string(),
                output: summary.schedule_fragment.clone(),
                visit_count: summary.visit_count,
                activity_count: summary.activity_count,
                instance_count: summary.instance_count,
                footnote_count: summary.footnote_count,
            };
            soa::upsert_table_result(conn, &result)?;
            events::emit(conn, job_id, "soa_table_extracted", Some(&page.table_id), &json!({}))?;
            results.push(result);
        }

        transition(conn, job_id, SoaJobState::Extracting, SoaJobState::Saving)?;
        Ok(results)
    }

    /// `saving → analyzing_merges → awaiting_merge_confirmation`: run the
    /// 8-level merge analyzer over every persisted table.
    pub fn analyze(&self, conn: &Connection, job_id: &str) -> Result<trialforge_store::types::MergePlan, EngineError> {
        transition(conn, job_id, SoaJobState::Saving, SoaJobState::AnalyzingMerges)?;

        let tables = soa::list_table_results(conn, job_id)?;
        let plan = analyze_merges(job_id, &tables);
        soa::save_merge_plan(conn, &plan)?;
        events::emit(conn, job_id, "soa_merges_analyzed", None, &json!({"groupCount": plan.groups.len()}))?;

        transition(conn, job_id, SoaJobState::AnalyzingMerges, SoaJobState::AwaitingMergeConfirmation)?;
        Ok(plan)
    }

    /// `awaiting_merge_confirmation → interpreting`: union the confirmed
    /// groups' table fragments into one schedule document, ready for the
    /// shared interpret phase.
    pub fn confirm_merge(&self, conn: &Connection, job_id: &str) -> Result<serde_json::Value, EngineError> {
        transition(conn, job_id, SoaJobState::AwaitingMergeConfirmation, SoaJobState::Interpreting)?;

        let tables = soa::list_table_results(conn, job_id)?;
        let mut encounters = Vec::new();
        let mut activities = Vec::new();
        let mut instances = Vec::new();
        for table in &tables {
            if let Some(arr) = table.output.get("encounters").and_then(serde_json::Value::as_array) {
                encounters.extend(arr.iter().cloned());
            }
            if let Some(arr) = table.output.get("activities").and_then(serde_json::Value::as_array) {
                activities.extend(arr.iter().cloned());
            }
            if let Some(arr) = table.output.get("scheduledActivityInstances").and_then(serde_json::Value::as_array) {
                instances.extend(arr.iter().cloned());
            }
        }

        let document = json!({"encounters": encounters, "activities": activities, "scheduledActivityInstances": instances});
        jobs::save_result(conn, job_id, &document)?;
        Ok(document)
    }
}

fn parse_category(s: &str) -> SoaTableCategory {
    match s {
        "PK_SOA" => SoaTableCategory::PkSoa,
        "SAFETY_SOA" => SoaTableCategory::SafetySoa,
        "PD_SOA" => SoaTableCategory::PdSoa,
        _ => SoaTableCategory::MainSoa,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trialforge_llm::StubBackend;
    use trialforge_store::{protocols, schema, types::JobKind};

    const TABLE_HTML: &str = r#"
        <table>
          <tr><th></th><th>Screening</th><th>Day 1</th></tr>
          <tr><td>Informed consent</td><td>X</td><td></td></tr>
        </table>
    "#;

    #[tokio::test]
    async fn full_happy_path_drives_every_soa_state() {
        let mut conn = schema::open(":memory:").unwrap();
        let proto = protocols::get_or_create(&conn, "a.pdf", "h1", 10).unwrap();
        let job = jobs::create_job(&mut conn, &proto.id, JobKind::Soa).unwrap();
        jobs::set_status(&conn, &job.id, SoaJobState::DetectingPages.as_str(), Some(SoaJobState::DetectingPages.as_str())).unwrap();

        let backend = StubBackend::always_returning(r#"[{"pageStart": 10, "pageEnd": 11, "category": "MAIN_SOA"}]"#.to_string());
        let orchestrator = SoaOrchestrator::new(&backend, "test-model");

        let pages = orchestrator.detect_pages(&conn, &job.id, None).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(jobs::get(&conn, &job.id).unwrap().status, "awaiting_page_confirmation");

        let confirmed: Vec<_> = pages.into_iter().map(|p| (p, TABLE_HTML.to_string())).collect();
        let tables = orchestrator.confirm_pages_and_extract(&conn, &job.id, &confirmed).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(jobs::get(&conn, &job.id).unwrap().status, "saving");

        let plan = orchestrator.analyze(&conn, &job.id).unwrap();
        assert!(plan.groups.is_empty());
        assert_eq!(jobs::get(&conn, &job.id).unwrap().status, "awaiting_merge_confirmation");

        let document = orchestrator.confirm_merge(&conn, &job.id).unwrap();
        assert_eq!(jobs::get(&conn, &job.id).unwrap().status, "interpreting");
        assert_eq!(document["activities"].as_array().unwrap().len(), 1);
    }
}
