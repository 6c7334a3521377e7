//! Registry of live worker processes keyed by job id (spec §4.E). One
//! registry per supervisor; workers across jobs run with no imposed upper
//! bound other than system resources (spec §5).

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::child::{ChildHandle, ExitOutcome};
use crate::command_spec::CommandSpec;
use crate::error::SupervisorError;

#[derive(Default)]
pub struct Registry {
    workers: Mutex<HashMap<String, ChildHandle>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a worker for `job_id` running phase `phase`. Fails if a
    /// worker is already registered for that job — one phase worker per
    /// job at a time (spec §4.E: "one worker per pipeline phase per job").
    pub async fn spawn(&self, job_id: &str, phase: &str, spec: &CommandSpec) -> Result<(), SupervisorError> {
        let mut workers = self.workers.lock().await;
        if workers.contains_key(job_id) {
            return Err(SupervisorError::AlreadyRunning(job_id.to_string()));
        }

        let child = spec.to_tokio_command().spawn().map_err(|source| SupervisorError::SpawnFailed {
            program: spec.program.to_string_lossy().to_string(),
            source,
        })?;

        tracing::info!(job_id, phase, pid = ?child.id(), "spawned worker process");
        workers.insert(job_id.to_string(), ChildHandle::new(job_id.to_string(), phase.to_string(), child));
        Ok(())
    }

    /// Non-blocking liveness check. Reaps the entry from the registry once
    /// it reports an exit outcome.
    pub async fn poll(&self, job_id: &str) -> Result<Option<ExitOutcome>, SupervisorError> {
        let mut workers = self.workers.lock().await;
        let handle = workers.get_mut(job_id).ok_or_else(|| SupervisorError::NotFound(job_id.to_string()))?;
        match handle.try_wait()? {
            Some(outcome) => {
                workers.remove(job_id);
                Ok(Some(outcome))
            }
            None => Ok(None),
        }
    }

    /// Suspend until `job_id`'s worker exits, then reap it.
    pub async fn wait(&self, job_id: &str) -> Result<ExitOutcome, SupervisorError> {
        let mut handle = {
            let mut workers = self.workers.lock().await;
            workers.remove(job_id).ok_or_else(|| SupervisorError::NotFound(job_id.to_string()))?
        };
        handle.wait().await
    }

    /// Cancel the worker for `job_id`, if one is registered.
    pub async fn cancel(&self, job_id: &str) -> Result<(), SupervisorError> {
        let mut handle = {
            let mut workers = self.workers.lock().await;
            workers.remove(job_id).ok_or_else(|| SupervisorError::NotFound(job_id.to_string()))?
        };
        handle.cancel().await
    }

    pub async fn is_running(&self, job_id: &str) -> bool {
        self.workers.lock().await.contains_key(job_id)
    }

    pub async fn len(&self) -> usize {
        self.workers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of live and recently-exited children (spec §4.E): every
    /// job currently registered, keyed by job id, with its worker's
    /// phase and liveness. Unlike `poll`/`is_running`, this never reaps
    /// an exited entry — it reports the exit outcome in place and leaves
    /// the next `poll`/`wait` call to remove it.
    pub async fn list_active(&self) -> std::collections::HashMap<String, WorkerStatus> {
        let mut workers = self.workers.lock().await;
        let mut statuses = std::collections::HashMap::with_capacity(workers.len());
        for (job_id, handle) in workers.iter_mut() {
            let state = match handle.try_wait() {
                Ok(Some(outcome)) => WorkerState::Exited(outcome),
                Ok(None) => WorkerState::Running,
                Err(_) => WorkerState::Running,
            };
            statuses.insert(
                job_id.clone(),
                WorkerStatus {
                    phase: handle.phase.clone(),
                    pid: handle.pid,
                    state,
                },
            );
        }
        statuses
    }
}

/// One entry of a [`Registry::list_active`] snapshot.
#[derive(Debug, Clone)]
pub struct WorkerStatus {
    pub phase: String,
    pub pid: Option<u32>,
    pub state: WorkerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Exited(ExitOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawning_twice_for_the_same_job_fails() {
        let registry = Registry::new();
        let spec = CommandSpec::new("sleep").arg("5");
        registry.spawn("job-1", "soa_extract", &spec).await.unwrap();
        let err = registry.spawn("job-1", "soa_extract", &spec).await.unwrap_err();
        assert!(matches!(err, SupervisorError::AlreadyRunning(_)));
        registry.cancel("job-1").await.unwrap();
    }

    #[tokio::test]
    async fn wait_reaps_the_worker_and_reports_its_outcome() {
        let registry = Registry::new();
        let spec = CommandSpec::new("true");
        registry.spawn("job-2", "module_extraction", &spec).await.unwrap();
        let outcome = registry.wait("job-2").await.unwrap();
        assert!(outcome.is_success());
        assert!(!registry.is_running("job-2").await);
    }

    #[tokio::test]
    async fn polling_an_unknown_job_is_an_error() {
        let registry = Registry::new();
        let err = registry.poll("no-such-job").await.unwrap_err();
        assert!(matches!(err, SupervisorError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_active_reports_a_snapshot_of_every_registered_job() {
        let registry = Registry::new();
        let running = CommandSpec::new("sleep").arg("5");
        let exited = CommandSpec::new("true");
        registry.spawn("job-running", "soa_extract", &running).await.unwrap();
        registry.spawn("job-exited", "module_extraction", &exited).await.unwrap();

        // Give the short-lived child a moment to actually exit before the
        // snapshot, without reaping it the way `poll`/`wait` would.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let snapshot = registry.list_active().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["job-running"].phase, "soa_extract");
        assert_eq!(snapshot["job-running"].state, WorkerState::Running);
        assert!(matches!(snapshot["job-exited"].state, WorkerState::Exited(outcome) if outcome.is_success()));

        // list_active must not reap: both jobs are still registered.
        assert_eq!(registry.len().await, 2);
        registry.cancel("job-running").await.unwrap();
    }
}
