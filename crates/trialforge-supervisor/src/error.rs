use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn worker process {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no worker registered for job {0}")]
    NotFound(String),
    #[error("a worker is already registered for job {0}")]
    AlreadyRunning(String),
    #[error("failed to wait on worker for job {job_id}: {source}")]
    WaitFailed {
        job_id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to cancel worker for job {job_id}: {source}")]
    CancelFailed {
        job_id: String,
        #[source]
        source: std::io::Error,
    },
}
