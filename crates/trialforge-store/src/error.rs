use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protocol not found: {0}")]
    ProtocolNotFound(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error(
        "a non-terminal job of kind {kind} already exists for protocol {protocol_id} (job {existing_job_id})"
    )]
    ConcurrentJob {
        protocol_id: String,
        kind: String,
        existing_job_id: String,
    },
}
