//! `trialforge soa` / `trialforge confirm-pages` / `trialforge
//! confirm-merge` — drives the SOA job's human-in-the-loop pause states
//! in-process (spec §4.F SOA job). Each external-confirmation command
//! opens its own fresh store connection, mirroring the worker phases'
//! "fresh connection per update" discipline even though these commands
//! run synchronously rather than as spawned processes.

use std::path::Path;

use serde::Deserialize;
use serde_json::json;

use trialforge_config::Config;
use trialforge_engine::{SoaJobState, SoaOrchestrator};
use trialforge_soa::DetectedPage;
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
    let job = jobs::create_job(&mut conn, &protocol.id, JobKind::Soa).map_err(|e| EngineError::Store(e.to_string()))?;
    jobs::set_status(&conn, &job.id, SoaJobState::DetectingPages.as_str(), Some(SoaJobState::DetectingPages.as_str()))
        .map_err(|e| EngineError::Store(e.to_string()))?;

    let backend = backend_factory::build_backend(config)?;
    let remote_file = backend.get_or_upload(&bytes, &content_hash).await.map_err(|e| EngineError::Llm(e.to_string()))?;

    let orchestrator = SoaOrchestrator::new(backend.as_ref(), config.llm.primary_model.clone());
    let pages = orchestrator.detect_pages(&conn, &job.id, remote_file).await.map_err(EngineError::from)?;

    let payload = json!({
        "jobId": job.id,
        "protocolId": protocol.id,
        "pages": pages.iter().map(|p| json!({
            "tableId": p.table_id, "category": p.category, "pageStart": p.page_start, "pageEnd": p.page_end,
        })).collect::<Vec<_>>(),
    });
    write_output(&payload, out)?;
    Ok(())
}

#[derive(Deserialize)]
struct PageTranscription {
    #[serde(rename = "tableId")]
    table_id: String,
    html: String,
}

/// Supplies the human-confirmed page list and each table's HTML
/// transcription, driving `awaiting_page_confirmation` through
/// `extracting`/`saving` and straight into the automatic merge analysis
/// (spec §4.F: no human step is needed between a table being saved and
/// its merge plan being proposed).
pub async fn run_confirm_pages(config: &Config, job_id: &str, input: &Path) -> Result<(), EngineError> {
    let conn = db::open_store(config)?;
    let job = jobs::get(&conn, job_id).map_err(|e| EngineError::Store(e.to_string()))?;

    let detected_pages: Vec<DetectedPage> = job
        .result
        .get("pages")
        .and_then(serde_json::Value::as_array)
        .map(|arr| {
            arr.iter()
                .map(|p| DetectedPage {
                    table_id: p["tableId"].as_str().unwrap_or_default().to_string(),
                    category: p["category"].as_str().unwrap_or("MAIN_SOA").to_string(),
                    page_start: p["pageStart"].as_i64().unwrap_or(1),
                    page_end: p["pageEnd"].as_i64().unwrap_or(1),
                })
                .collect()
        })
        .unwrap_or_default();

    let raw = std::fs::read_to_string(input).map_err(|source| EngineError::MissingPath {
        path: input.display().to_string(),
        reason: source.to_string(),
    })?;
    let transcriptions: Vec<PageTranscription> = serde_json::from_str(&raw)?;

    let confirmed: Vec<(DetectedPage, String)> = detected_pages
        .into_iter()
        .filter_map(|page| {
            transcriptions
                .iter()
                .find(|t| t.table_id == page.table_id)
                .map(|t| (page, t.html.clone()))
        })
        .collect();

    let backend = backend_factory::build_backend(config)?;
    let orchestrator = SoaOrchestrator::new(backend.as_ref(), config.llm.primary_model.clone());
    orchestrator.confirm_pages_and_extract(&conn, job_id, &confirmed).map_err(EngineError::from)?;
    let plan = orchestrator.analyze(&conn, job_id).map_err(EngineError::from)?;

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

/// Supplies the human-confirmed merge plan (spec §4.F: "external call
/// supplies confirmed merge plan"), then runs the shared twelve-stage
/// interpret phase to completion.
pub async fn run_confirm_merge(config: &Config, job_id: &str) -> Result<(), EngineError> {
    let conn = db::open_store(config)?;
    let job = jobs::get(&conn, job_id).map_err(|e| EngineError::Store(e.to_string()))?;

    let backend = backend_factory::build_backend(config)?;
    let orchestrator = SoaOrchestrator::new(backend.as_ref(), config.llm.primary_model.clone());
    orchestrator.confirm_merge(&conn, job_id).map_err(EngineError::from)?;
    drop(conn);

    commands::worker::run(config, "interpret", "soa", job_id, &job.protocol_id, None).await
}

fn write_output(payload: &serde_json::Value, out: Option<&Path>) -> Result<(), EngineError> {
    let text = serde_json::to_string_pretty(payload)?;
    match out {
        Some(path) => std::fs::write(path, text)?,
        None => println!("{text}"),
    }
    Ok(())
}
