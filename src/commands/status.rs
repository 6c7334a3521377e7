//! `trialforge status` — shows a job's current state (spec §7
//! "User-visible failure behavior": "a failed job always leaves a row in
//! the state store with status, error message, and the last-completed
//! stage/module").

use trialforge_config::Config;
use trialforge_store::{events, jobs};
use trialforge_utils::error::EngineError;

use crate::db;

pub async fn run(config: &Config, job_id: &str, json: bool) -> Result<(), EngineError> {
    let conn = db::open_store(config)?;
    let job = jobs::get(&conn, job_id).map_err(|e| EngineError::Store(e.to_string()))?;
    let recent_events = events::list_for_job(&conn, job_id).map_err(|e| EngineError::Store(e.to_string()))?;

    if json {
        let payload = serde_json::json!({
            "jobId": job.id,
            "protocolId": job.protocol_id,
            "kind": job.kind.as_str(),
            "status": job.status,
            "currentPhase": job.current_phase,
            "progress": job.progress,
            "errorMessage": job.error_message,
            "eventCount": recent_events.len(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("job {} ({})", job.id, job.kind.as_str());
    println!("  status:   {}", job.status);
    if let Some(phase) = &job.current_phase {
        println!("  phase:    {phase}");
    }
    println!("  progress: {:.0}% ({})", job.progress.percent, job.progress.phase);
    if let Some(err) = &job.error_message {
        println!("  error:    {err}");
    }
    println!("  events:   {}", recent_events.len());
    Ok(())
}
