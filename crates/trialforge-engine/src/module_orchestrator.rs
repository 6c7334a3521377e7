//! Module orchestrator (spec §4.D): runs the configured, ordered module
//! registry over one protocol, checkpointing each module's result so a
//! later run can resume from where a prior one stopped.

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::Connection;
use serde_json::json;

use trialforge_cache::Cache;
use trialforge_combiner::{combine, CombineInput, UnifiedDocument};
use trialforge_config::Config;
use trialforge_extract::{extract_with_cache, TwoPhaseExtractor};
use trialforge_llm::LlmBackend;
use trialforge_store::types::{ModuleResult, ModuleResultStatus, Progress};
use trialforge_store::{events, jobs, module_results};

use crate::error::EngineError;

pub struct ModuleOrchestrator<'a> {
    pub backend: &'a dyn LlmBackend,
    pub config: &'a Config,
}

pub struct OrchestratorOutcome {
    pub unified_document: UnifiedDocument,
    /// `"completed"` | `"completed_with_errors"` | `"failed"` (spec §4.D
    /// step 6).
    pub final_status: &'static str,
}

impl<'a> ModuleOrchestrator<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn LlmBackend, config: &'a Config) -> Self {
        Self { backend, config }
    }

    /// Runs every pending module for `job_id` in registry order, then
    /// combines all completed results into a unified document (spec §4.D
    /// algorithm, steps 1–7).
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        conn: &mut Connection,
        cache: &Cache,
        job_id: &str,
        protocol_id: &str,
        filename: &str,
        source_bytes: &[u8],
        page_texts: &[String],
        resume: bool,
    ) -> Result<OrchestratorOutcome, EngineError> {
        jobs::start(conn, job_id)?;

        // Spec §4.D step 2: "ensure remote-file handle / upload, cache
        // URI" — obtained once per run and reused across every module so
        // the PDF bytes are not resent per module.
        let content_hash = trialforge_utils::hash::sha256_hex(source_bytes);
        let remote_file = self.backend.get_or_upload(source_bytes, &content_hash).await.map_err(|err| {
            trialforge_extract::ExtractError::from(err)
        })?;

        let already_completed: HashSet<String> = if resume {
            module_results::completed_module_ids(conn, job_id)?.into_iter().collect()
        } else {
            HashSet::new()
        };

        let pending: Vec<_> = self
            .config
            .module_registry
            .enabled()
            .filter(|m| !already_completed.contains(&m.module_id))
            .collect();

        let total = pending.len().max(1);
        let mut any_new_failure = false;

        for (idx, module) in pending.iter().enumerate() {
            jobs::set_status(conn, job_id, "running", Some(&module.module_id))?;
            jobs::update_progress(
                conn,
                job_id,
                &Progress {
                    phase: "module_extraction".to_string(),
                    percent: (idx as f64 / total as f64) * 100.0,
                    sub_stage: Some(module.module_id.clone()),
                },
            )?;
            events::emit(conn, job_id, "module_started", Some(&module.module_id), &json!({}))?;

            let extractor = TwoPhaseExtractor {
                backend: self.backend,
                model: self.config.llm.primary_model.clone(),
                thresholds: self.config.quality_thresholds.clone(),
                retry: self.config.retry.clone(),
                quality_retry_delay: std::time::Duration::from_millis(0),
            };

            // Resilient per-module execution (spec §4.D step 4: "on
            // exception, record failure and continue — one module cannot
            // veto the others").
            match extract_with_cache(&extractor, cache, module, protocol_id, source_bytes, remote_file.clone(), true).await {
                Ok((outcome, from_cache)) => {
                    let quality_score = serde_json::to_value(&outcome.quality).unwrap_or(json!({}));
                    let result = ModuleResult {
                        job_id: job_id.to_string(),
                        module_id: module.module_id.clone(),
                        status: ModuleResultStatus::Completed,
                        extracted_data: outcome.result,
                        provenance_coverage: outcome.quality.provenance,
                        quality_score,
                        pass1_duration_ms: outcome.metadata.pass1_duration.as_millis() as i64,
                        pass2_duration_ms: outcome.metadata.pass2_duration.as_millis() as i64,
                        retry_count: outcome.metadata.pass1_surgical_retries + outcome.metadata.pass2_surgical_retries,
                        from_cache,
                        error_details: None,
                    };
                    module_results::upsert(conn, &result)?;
                    events::emit(
                        conn,
                        job_id,
                        "module_completed",
                        Some(&module.module_id),
                        &json!({"fromCache": from_cache, "qualityScore": result.quality_score}),
                    )?;
                }
                Err(err) => {
                    any_new_failure = true;
                    let result = ModuleResult {
                        job_id: job_id.to_string(),
                        module_id: module.module_id.clone(),
                        status: ModuleResultStatus::Failed,
                        extracted_data: json!({}),
                        provenance_coverage: 0.0,
                        quality_score: json!({}),
                        pass1_duration_ms: 0,
                        pass2_duration_ms: 0,
                        retry_count: 0,
                        from_cache: false,
                        error_details: Some(err.to_string()),
                    };
                    module_results::upsert(conn, &result)?;
                    events::emit(conn, job_id, "module_failed", Some(&module.module_id), &json!({"error": err.to_string()}))?;
                    tracing::warn!(module_id = %module.module_id, error = %err, "module extraction failed, continuing with remaining modules");
                }
            }
        }

        // Partial-results guarantee (spec §4.D): build the unified
        // document from whatever completed, even if some or all modules
        // in this run failed.
        let all_results = module_results::list_for_job(conn, job_id)?;
        let any_completed = all_results.iter().any(|r| r.status == ModuleResultStatus::Completed);

        let unified_document = combine(CombineInput {
            module_results: &all_results,
            filename,
            source_bytes,
            page_texts,
            model_name: &self.config.llm.primary_model,
            include_agent_documentation: true,
            now: Utc::now(),
        });

        let final_status: &'static str = if !any_new_failure && all_results.iter().all(|r| r.status == ModuleResultStatus::Completed) {
            "completed"
        } else if any_completed {
            "completed_with_errors"
        } else {
            "failed"
        };

        let result_payload = serde_json::to_value(&unified_document).unwrap_or(json!({}));
        match final_status {
            "failed" => jobs::fail(conn, job_id, "all modules failed to extract")?,
            _ => jobs::complete(conn, job_id, final_status, &result_payload)?,
        }

        Ok(OrchestratorOutcome { unified_document, final_status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trialforge_config::module::ModuleSpec;
    use trialforge_config::{Config, ModuleRegistry};
    use trialforge_llm::StubBackend;
    use trialforge_store::{protocols, schema, types::JobKind};

    fn write_module(dir: &std::path::Path, module_id: &str, required_field: &str) -> ModuleSpec {
        let pass1 = dir.join(format!("{module_id}_pass1.txt"));
        let pass2 = dir.join(format!("{module_id}_pass2.txt"));
        let schema_path = dir.join(format!("{module_id}_schema.json"));
        std::fs::write(&pass1, "Extract values").unwrap();
        std::fs::write(&pass2, "Add provenance to {{ pass1_output }}").unwrap();
        std::fs::write(
            &schema_path,
            format!(r#"{{"type":"object","required":["{required_field}"],"properties":{{"{required_field}":{{"type":"string"}}}}}}"#),
        )
        .unwrap();
        ModuleSpec {
            module_id: module_id.to_string(),
            name: module_id.to_string(),
            pass1_prompt_path: pass1,
            pass2_prompt_path: pass2,
            schema_path,
            instance_type: "StudyDesign".to_string(),
            enabled: true,
        }
    }

    #[tokio::test]
    async fn runs_all_modules_and_combines_into_a_unified_document() {
        let dir = tempfile::tempdir().unwrap();
        let module = write_module(dir.path(), "study_metadata", "studyTitle");

        let mut config = Config::default();
        config.module_registry = ModuleRegistry { modules: vec![module] };

        let response = serde_json::json!({
            "id": "P-1",
            "instanceType": "StudyDesign",
            "studyTitle": "A Study",
            "provenance": {"kind": "explicit", "page_number": 1, "text_snippet": "A Study of Something Great and Good"}
        })
        .to_string();
        let backend = StubBackend::always_returning(response);

        let mut conn = schema::open(":memory:").unwrap();
        let proto = protocols::get_or_create(&conn, "a.pdf", "h1", 10).unwrap();
        let job = trialforge_store::jobs::create_job(&mut conn, &proto.id, JobKind::ModuleExtraction).unwrap();
        let cache = Cache::open(":memory:", dir.path().join("file_cache")).unwrap();

        let orchestrator = ModuleOrchestrator::new(&backend, &config);
        let outcome = orchestrator
            .run(&mut conn, &cache, &job.id, &proto.id, "a.pdf", b"pdf bytes", &["page one".to_string()], false)
            .await
            .unwrap();

        assert_eq!(outcome.final_status, "completed");
        assert!(outcome.unified_document.study.is_some());

        let stored = trialforge_store::jobs::get(&conn, &job.id).unwrap();
        assert_eq!(stored.status, "completed");
    }

    #[tokio::test]
    async fn a_failing_module_still_yields_a_partial_unified_document() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_module(dir.path(), "study_identification", "studyTitle");
        let bad = write_module(dir.path(), "endpoints", "endpointList");

        let mut config = Config::default();
        config.module_registry = ModuleRegistry { modules: vec![good, bad] };
        config.retry.max_retries = 0;

        // A response missing both modules' required fields and with no
        // provenance block fails schema adherence for every module,
        // eventually exhausting the zero-retry budget and failing both —
        // which still must not crash the orchestrator run itself.
        let backend = StubBackend::always_returning("not json at all".to_string());

        let mut conn = schema::open(":memory:").unwrap();
        let proto = protocols::get_or_create(&conn, "a.pdf", "h1", 10).unwrap();
        let job = trialforge_store::jobs::create_job(&mut conn, &proto.id, JobKind::ModuleExtraction).unwrap();
        let cache = Cache::open(":memory:", dir.path().join("file_cache")).unwrap();

        let orchestrator = ModuleOrchestrator::new(&backend, &config);
        let outcome = orchestrator
            .run(&mut conn, &cache, &job.id, &proto.id, "a.pdf", b"pdf bytes", &[], false)
            .await
            .unwrap();

        assert_eq!(outcome.final_status, "failed");
        let results = module_results::list_for_job(&conn, &job.id).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == ModuleResultStatus::Failed));
    }
}
