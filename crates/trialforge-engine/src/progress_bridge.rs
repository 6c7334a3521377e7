//! Bridges `trialforge_interpret::ProgressSink` into persisted job events,
//! so the interpretation pipeline can report progress without depending
//! on `trialforge-store` itself (spec §4.G "A shared progress callback
//! receives (stage_number, stage_name, status) after every stage
//! completes").

use std::sync::Mutex;

use rusqlite::Connection;
use trialforge_interpret::{ProgressSink, StageStatus};

/// Forwards each stage completion to `trialforge_store::events::emit` as
/// an `interpretation_stage_completed` event. Holds its own connection
/// behind a mutex since `ProgressSink::on_stage_complete` is a `&self`
/// callback invoked synchronously from the async pipeline.
pub struct EventSinkProgressBridge {
    conn: Mutex<Connection>,
    job_id: String,
}

impl EventSinkProgressBridge {
    #[must_use]
    pub fn new(conn: Connection, job_id: impl Into<String>) -> Self {
        Self {
            conn: Mutex::new(conn),
            job_id: job_id.into(),
        }
    }
}

impl ProgressSink for EventSinkProgressBridge {
    fn on_stage_complete(&self, stage_number: u8, stage_name: &str, status: StageStatus) {
        let payload = serde_json::json!({
            "stageNumber": stage_number,
            "stageName": stage_name,
            "status": status.as_str(),
        });
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Err(err) = trialforge_store::events::emit(&conn, &self.job_id, "interpretation_stage_completed", None, &payload) {
            tracing::warn!(job_id = %self.job_id, stage_number, error = %err, "failed to persist interpretation stage progress event");
        }
    }
}
