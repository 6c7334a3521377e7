//! `trialforge resume` — continues a module-extraction job from its last
//! completed module (spec §4.D "compute pending modules ... only
//! not-yet-completed on resume").

use std::path::Path;

use trialforge_config::Config;
use trialforge_engine::ModuleOrchestrator;
use trialforge_store::jobs;
use trialforge_utils::error::EngineError;

use crate::{backend_factory, db};

pub async fn run(config: &Config, job_id: &str, file: &Path, out: Option<&Path>) -> Result<(), EngineError> {
    let bytes = std::fs::read(file).map_err(|source| EngineError::MissingPath {
        path: file.display().to_string(),
        reason: source.to_string(),
    })?;
    let filename = file.file_name().and_then(|n| n.to_str()).unwrap_or("protocol.pdf").to_string();

    let mut conn = db::open_store(config)?;
    let cache = db::open_cache(config)?;

    let job = jobs::get(&conn, job_id).map_err(|e| EngineError::Store(e.to_string()))?;

    let backend = backend_factory::build_backend(config)?;
    let orchestrator = ModuleOrchestrator::new(backend.as_ref(), config);
    let outcome = orchestrator
        .run(&mut conn, &cache, &job.id, &job.protocol_id, &filename, &bytes, &[], true)
        .await
        .map_err(EngineError::from)?;

    let document_json = serde_json::to_string_pretty(&outcome.unified_document)?;
    match out {
        Some(path) => std::fs::write(path, document_json)?,
        None => println!("{document_json}"),
    }

    tracing::info!(job_id = %job.id, status = outcome.final_status, "resume run finished");
    Ok(())
}
