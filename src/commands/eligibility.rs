//! `trialforge eligibility` / `trialforge confirm-sections` — drives the
//! eligibility job's human-in-the-loop pause state in-process (spec
//! §4.F eligibility job), the same in-process confirmation shape
//! `commands::soa` uses for the SOA pipeline.

use std::path::Path;

use serde_json::json;

use trialforge_config::Config;
use trialforge_engine::{EligibilityJobState, EligibilityOrchestrator};
use trialforge_store::{jobs, protocols, types::JobKind};
use trialforge_utils::error::EngineError;
use trialforge_utils::hash::sha256_hex;

use crate::{backend_factory, commands, db};

pub async fn run_detect(config: &Config, file: &Path, out: Option<&Path>) -> Result<(), EngineError> {
    let bytes = std::fs::read(file).map_err(|source| EngineError::MissingPath {
        path: file.display().to_string(),
        reason: source.to_string(),
    })?;
    let filename = file.file_name().and_then(|n| n.to_str()).unwrap_or("protocol.pdf").to_string();
    let content_hash = sha256_hex(&bytes);

    let mut conn = db::open_store(config)?;
    let protocol = protocols::get_or_create(&conn, &filename, &content_hash, bytes.len() as i64).map_err(|e| EngineError::Store(e.to_string()))?;
    let job = jobs::create_job(&mut conn, &protocol.id, JobKind::Eligibility).map_err(|e| EngineError::Store(e.to_string()))?;
    jobs::set_status(
        &conn,
        &job.id,
        EligibilityJobState::DetectingSections.as_str(),
        Some(EligibilityJobState::DetectingSections.as_str()),
    )
    .map_err(|e| EngineError::Store(e.to_string()))?;

    let backend = backend_factory::build_backend(config)?;
    let remote_file = backend.get_or_upload(&bytes, &content_hash).await.map_err(|e| EngineError::Llm(e.to_string()))?;

    let orchestrator = EligibilityOrchestrator::new(backend.as_ref(), config.llm.primary_model.clone());
    let criteria = orchestrator.detect_sections(&conn, &job.id, remote_file).await.map_err(EngineError::from)?;

    let payload = json!({
        "jobId": job.id,
        "protocolId": protocol.id,
        "criteria": criteria.iter().map(|c| json!({
            "criterionId": c.criterion_id, "section": c.section.as_str(), "text": c.text,
        })).collect::<Vec<_>>(),
    });
    let text = serde_json::to_string_pretty(&payload)?;
    match out {
        Some(path) => std::fs::write(path, text)?,
        None => println!("{text}"),
    }
    Ok(())
}

/// Supplies the human-confirmed criterion ids (spec §4.F
/// `awaiting_section_confirmation`), runs the classification/ordering
/// funnel over them, then runs the shared interpret phase to completion.
pub async fn run_confirm_sections(config: &Config, job_id: &str, confirmed_ids: &[String]) -> Result<(), EngineError> {
    let conn = db::open_store(config)?;
    let job = jobs::get(&conn, job_id).map_err(|e| EngineError::Store(e.to_string()))?;

    let backend = backend_factory::build_backend(config)?;
    let orchestrator = EligibilityOrchestrator::new(backend.as_ref(), config.llm.primary_model.clone());
    let document = orchestrator.confirm_and_run_funnel(&conn, job_id, confirmed_ids).map_err(EngineError::from)?;
    drop(conn);

    println!("{}", serde_json::to_string_pretty(&document)?);
    commands::worker::run(config, "interpret", "eligibility", job_id, &job.protocol_id, None).await
}
