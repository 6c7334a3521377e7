//! `trialforge extract` — runs the module orchestrator over a protocol
//! PDF in-process (spec §4.D).

use std::path::Path;

use trialforge_config::Config;
use trialforge_engine::ModuleOrchestrator;
use trialforge_store::{jobs, protocols, types::JobKind};
use trialforge_utils::error::EngineError;
use trialforge_utils::hash::sha256_hex;

use crate::{backend_factory, db};

pub async fn run(config: &Config, file: &Path, resume: bool, job_id: Option<String>, out: Option<&Path>) -> Result<(), EngineError> {
    let bytes = std::fs::read(file).map_err(|source| EngineError::MissingPath {
        path: file.display().to_string(),
        reason: source.to_string(),
    })?;
    let filename = file.file_name().and_then(|n| n.to_str()).unwrap_or("protocol.pdf").to_string();
    let content_hash = sha256_hex(&bytes);

    let mut conn = db::open_store(config)?;
    let cache = db::open_cache(config)?;

    let protocol = protocols::get_or_create(&conn, &filename, &content_hash, bytes.len() as i64).map_err(|e| EngineError::Store(e.to_string()))?;

    let job = if resume {
        let job_id = job_id.ok_or_else(|| EngineError::Config("--resume requires --job <id>".to_string()))?;
        jobs::get(&conn, &job_id).map_err(|e| EngineError::Store(e.to_string()))?
    } else {
        jobs::create_job(&mut conn, &protocol.id, JobKind::ModuleExtraction).map_err(|e| EngineError::Store(e.to_string()))?
    };

    let backend = backend_factory::build_backend(config)?;
    let orchestrator = ModuleOrchestrator::new(backend.as_ref(), config);
    let outcome = orchestrator
        .run(&mut conn, &cache, &job.id, &protocol.id, &filename, &bytes, &[], resume)
        .await
        .map_err(EngineError::from)?;

    let document_json = serde_json::to_string_pretty(&outcome.unified_document)?;
    match out {
        Some(path) => std::fs::write(path, document_json)?,
        None => println!("{document_json}"),
    }

    tracing::info!(job_id = %job.id, status = outcome.final_status, "extraction run finished");
    Ok(())
}
