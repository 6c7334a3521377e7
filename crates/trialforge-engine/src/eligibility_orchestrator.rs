//! Eligibility orchestrator (spec §4.F eligibility job): drives
//! `detecting_sections → awaiting_section_confirmation → extracting →
//! interpreting → validating → completed`, calling into
//! `trialforge-eligibility` for detection/funnel logic and
//! `trialforge-provenance::calculate_coverage` for the validating gate.

use rusqlite::Connection;
use serde_json::json;

use trialforge_eligibility::{run_funnel, DetectedCriterion, SectionDetector};
use trialforge_llm::{LlmBackend, RemoteFileHandle};
use trialforge_store::types::CriterionRecord;
use trialforge_store::{eligibility, events, jobs};

use crate::eligibility_state::{transition, EligibilityJobState};
use crate::error::EngineError;

pub struct EligibilityOrchestrator<'a> {
    pub backend: &'a dyn LlmBackend,
    pub model: String,
}

impl<'a> EligibilityOrchestrator<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn LlmBackend, model: impl Into<String>) -> Self {
        Self { backend, model: model.into() }
    }

    /// `detecting_sections → awaiting_section_confirmation`.
    pub async fn detect_sections(
        &self,
        conn: &Connection,
        job_id: &str,
        remote_file: Option<RemoteFileHandle>,
    ) -> Result<Vec<DetectedCriterion>, EngineError> {
        jobs::start(conn, job_id)?;
        events::emit(conn, job_id, "eligibility_detecting_sections", None, &json!({}))?;

        let detector = SectionDetector::new(self.backend, self.model.clone());
        let criteria = detector.detect(remote_file).await?;

        for criterion in &criteria {
            eligibility::upsert_criterion(
                conn,
                &CriterionRecord {
                    job_id: job_id.to_string(),
                    criterion_id: criterion.criterion_id.clone(),
                    section: criterion.section,
                    text: criterion.text.clone(),
                    status: "detected".to_string(),
                    queryability: None,
                    funnel_rank: None,
                },
            )?;
        }

        transition(conn, job_id, EligibilityJobState::DetectingSections, EligibilityJobState::AwaitingSectionConfirmation)?;
        events::emit(conn, job_id, "eligibility_sections_detected", None, &json!({"count": criteria.len()}))?;

        Ok(criteria)
    }

    /// `awaiting_section_confirmation → extracting → interpreting`: mark
    /// the caller-confirmed criteria ids as confirmed and run the funnel
    /// over them, persisting each criterion's queryability and rank.
    pub fn confirm_and_run_funnel(
        &self,
        conn: &Connection,
        job_id: &str,
        confirmed_ids: &[String],
    ) -> Result<serde_json::Value, EngineError> {
        transition(conn, job_id, EligibilityJobState::AwaitingSectionConfirmation, EligibilityJobState::Extracting)?;

        let detected = eligibility::list_criteria(conn, job_id)?;
        let mut confirmed: Vec<CriterionRecord> = detected
            .into_iter()
            .filter(|c| confirmed_ids.iter().any(|id| id == &c.criterion_id))
            .collect();
        for record in &mut confirmed {
            record.status = "confirmed".to_string();
            eligibility::upsert_criterion(conn, record)?;
        }

        let funnel_result = run_funnel(&confirmed);
        for ordered in &funnel_result.ordered {
            if let Some(record) = confirmed.iter_mut().find(|c| c.criterion_id == ordered.criterion_id) {
                record.queryability = Some(ordered.queryability);
                record.funnel_rank = Some(ordered.rank);
                eligibility::upsert_criterion(conn, record)?;
            }
        }
        events::emit(
            conn,
            job_id,
            "eligibility_funnel_run",
            None,
            &json!({"stages": funnel_result.stages.iter().map(|s| json!({"name": s.name, "in": s.input_count, "out": s.output_count})).collect::<Vec<_>>()}),
        )?;

        let document = json!({
            "criteria": confirmed.iter().map(|c| json!({
                "id": c.criterion_id,
                "section": c.section.as_str(),
                "text": c.text,
                "queryability": c.queryability.map(trialforge_store::Queryability::as_str),
                "rank": c.funnel_rank,
            })).collect::<Vec<_>>(),
        });
        jobs::save_result(conn, job_id, &document)?;

        transition(conn, job_id, EligibilityJobState::Extracting, EligibilityJobState::Interpreting)?;
        Ok(document)
    }

    /// `interpreting → validating → completed | failed`: check the
    /// interpreted document's provenance coverage against the configured
    /// threshold, the eligibility job's equivalent of the module
    /// extraction pipeline's quality gate.
    pub fn validate_and_complete(
        &self,
        conn: &Connection,
        job_id: &str,
        document: &serde_json::Value,
        provenance_threshold: f64,
    ) -> Result<(), EngineError> {
        transition(conn, job_id, EligibilityJobState::Interpreting, EligibilityJobState::Validating)?;

        let (coverage_ratio, _missing) = trialforge_provenance::calculate_coverage(document);
        if coverage_ratio >= provenance_threshold {
            jobs::complete(conn, job_id, "completed", document)?;
            transition(conn, job_id, EligibilityJobState::Validating, EligibilityJobState::Completed)?;
        } else {
            jobs::fail(conn, job_id, &format!("provenance coverage {coverage_ratio:.2} below threshold {provenance_threshold:.2}"))?;
            transition(conn, job_id, EligibilityJobState::Validating, EligibilityJobState::Failed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trialforge_llm::StubBackend;
    use trialforge_store::{protocols, schema, types::JobKind};

    #[tokio::test]
    async fn full_happy_path_drives_every_eligibility_state() {
        let mut conn = schema::open(":memory:").unwrap();
        let proto = protocols::get_or_create(&conn, "a.pdf", "h1", 10).unwrap();
        let job = jobs::create_job(&mut conn, &proto.id, JobKind::Eligibility).unwrap();
        jobs::set_status(
            &conn,
            &job.id,
            EligibilityJobState::DetectingSections.as_str(),
            Some(EligibilityJobState::DetectingSections.as_str()),
        )
        .unwrap();

        let backend = StubBackend::always_returning(
            r#"[{"section": "inclusion", "text": "Age 18 years of age or older"},
                {"section": "exclusion", "text": "Known hypersensitivity to study drug"}]"#
                .to_string(),
        );
        let orchestrator = EligibilityOrchestrator::new(&backend, "test-model");

        let criteria = orchestrator.detect_sections(&conn, &job.id, None).await.unwrap();
        assert_eq!(criteria.len(), 2);
        assert_eq!(jobs::get(&conn, &job.id).unwrap().status, "awaiting_section_confirmation");

        let ids: Vec<String> = criteria.iter().map(|c| c.criterion_id.clone()).collect();
        let document = orchestrator.confirm_and_run_funnel(&conn, &job.id, &ids).unwrap();
        assert_eq!(jobs::get(&conn, &job.id).unwrap().status, "interpreting");
        assert_eq!(document["criteria"].as_array().unwrap().len(), 2);

        orchestrator.validate_and_complete(&conn, &job.id, &document, 0.0).unwrap();
        assert_eq!(jobs::get(&conn, &job.id).unwrap().status, "completed");
    }

    #[tokio::test]
    async fn low_coverage_fails_the_job_instead_of_completing() {
        let mut conn = schema::open(":memory:").unwrap();
        let proto = protocols::get_or_create(&conn, "a.pdf", "h1", 10).unwrap();
        let job = jobs::create_job(&mut conn, &proto.id, JobKind::Eligibility).unwrap();
        jobs::set_status(&conn, &job.id, EligibilityJobState::Interpreting.as_str(), Some(EligibilityJobState::Interpreting.as_str())).unwrap();

        let backend = StubBackend::always_returning("[]".to_string());
        let orchestrator = EligibilityOrchestrator::new(&backend, "test-model");

        let document = json!({"criteria": [{"id": "C1", "text": "Age 18 or older"}]});
        orchestrator.validate_and_complete(&conn, &job.id, &document, 0.99).unwrap();
        assert_eq!(jobs::get(&conn, &job.id).unwrap().status, "failed");
    }
}
