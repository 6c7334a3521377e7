//! `trialforge worker` — the process-per-phase entrypoint the
//! supervisor spawns (spec §4.E: "every long-running pipeline phase
//! executes in a freshly spawned OS process"; "the child is responsible
//! for writing final job state to the store before exiting").

use std::sync::Arc;

use trialforge_config::Config;
use trialforge_engine::{soa_transition, EligibilityOrchestrator, EventSinkProgressBridge, ModuleOrchestrator, SoaJobState};
use trialforge_interpret::{InterpretationPipeline, StageContext};
use trialforge_llm::FallbackChain;
use trialforge_store::jobs;
use trialforge_utils::error::EngineError;

use crate::{backend_factory, db};

pub async fn run(config: &Config, phase: &str, kind: &str, job_id: &str, protocol_id: &str, file: Option<&std::path::Path>) -> Result<(), EngineError> {
    match phase {
        "module_extraction" => run_module_extraction(config, job_id, protocol_id, file).await,
        "interpret" => run_interpret(config, kind, job_id).await,
        other => Err(EngineError::Config(format!("unknown worker phase '{other}'"))),
    }
}

async fn run_module_extraction(config: &Config, job_id: &str, protocol_id: &str, file: Option<&std::path::Path>) -> Result<(), EngineError> {
    let file = file.ok_or_else(|| EngineError::Config("--file is required for the module_extraction phase".to_string()))?;
    let bytes = std::fs::read(file).map_err(|source| EngineError::MissingPath {
        path: file.display().to_string(),
        reason: source.to_string(),
    })?;
    let filename = file.file_name().and_then(|n| n.to_str()).unwrap_or("protocol.pdf").to_string();

    let mut conn = db::open_store(config)?;
    let cache = db::open_cache(config)?;
    let backend = backend_factory::build_backend(config)?;

    let orchestrator = ModuleOrchestrator::new(backend.as_ref(), config);
    orchestrator
        .run(&mut conn, &cache, job_id, protocol_id, &filename, &bytes, &[], true)
        .await
        .map_err(EngineError::from)?;
    Ok(())
}

/// Runs the twelve-stage interpretation pipeline over the job's current
/// document (the "interpreting" phase shared by the SOA and eligibility
/// state machines, spec §4.F/§4.G), then advances the owning job's state
/// machine to `completed` — or to `failed` if a stage halted it.
async fn run_interpret(config: &Config, kind: &str, job_id: &str) -> Result<(), EngineError> {
    let conn = db::open_store(config)?;
    let job = jobs::get(&conn, job_id).map_err(|e| EngineError::Store(e.to_string()))?;

    let backend = backend_factory::build_backend(config)?;
    let mut models = vec![config.llm.primary_model.clone()];
    models.extend(config.llm.secondary_model.clone());
    models.extend(config.llm.tertiary_model.clone());
    let chain = Arc::new(FallbackChain::new(Arc::clone(&backend), models));

    let ctx = StageContext {
        confidence_bands: config.confidence_bands.clone(),
        interpretation: config.interpretation.clone(),
        llm: Some(chain),
    };

    let progress_conn = db::open_store(config)?;
    let bridge = Arc::new(EventSinkProgressBridge::new(progress_conn, job_id.to_string()));
    let pipeline = InterpretationPipeline::with_progress_sink(bridge);

    let outcome = pipeline.run(job.result.clone(), &ctx).await.map_err(|e| EngineError::Interpretation {
        stage: outcome_stage_hint(&e),
        reason: e.to_string(),
    })?;

    let halted = outcome.halted_at_stage.is_some();
    let result_payload = serde_json::to_value(&outcome.document)?;
    if halted {
        jobs::fail(&conn, job_id, "interpretation pipeline halted on a compliance error").map_err(|e| EngineError::Store(e.to_string()))?;
        return Ok(());
    }

    match kind {
        "soa" => {
            soa_transition(&conn, job_id, SoaJobState::Interpreting, SoaJobState::Completed).map_err(|e| EngineError::Orchestrator(e.to_string()))?;
            jobs::complete(&conn, job_id, "completed", &result_payload).map_err(|e| EngineError::Store(e.to_string()))?;
        }
        "eligibility" => {
            // The eligibility state machine inserts a `validating` gate
            // between `interpreting` and `completed` (spec §4.F) that
            // `SoaJobState` doesn't have. `validate_and_complete` makes no
            // generate() call, so `backend` only satisfies the
            // orchestrator's constructor.
            let orchestrator = EligibilityOrchestrator::new(backend.as_ref(), config.llm.primary_model.clone());
            orchestrator
                .validate_and_complete(&conn, job_id, &outcome.document, config.quality_thresholds.provenance)
                .map_err(EngineError::from)?;
        }
        other => return Err(EngineError::Config(format!("unknown job kind '{other}' for the interpret phase"))),
    }

    Ok(())
}

fn outcome_stage_hint(err: &trialforge_interpret::InterpretError) -> u8 {
    use trialforge_interpret::InterpretError;
    match err {
        InterpretError::ComplianceFailed { stage_number, .. } | InterpretError::JsonParse { stage_number, .. } | InterpretError::Llm { stage_number, .. } => *stage_number,
        InterpretError::MissingField(_) => 0,
    }
}
