//! Child process handle: liveness, exit code, and cancellation over a
//! spawned worker. Ported from `xchecker-runner::process::ProcessOutput`'s
//! exit-code contract, re-expressed as an async handle since pipeline
//! workers are long-running (spec §4.E, §5).

use std::time::Instant;

use tokio::process::Child;

use crate::error::SupervisorError;

/// Spec §6: "Exit codes (pipeline worker processes): 0 success; non-zero
/// failure. The supervisor treats any non-zero code identically."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    Failure(Option<i32>),
}

impl ExitOutcome {
    #[must_use]
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::Success,
            other => Self::Failure(other),
        }
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// One live (or already-exited) worker process.
pub struct ChildHandle {
    pub job_id: String,
    pub phase: String,
    pub pid: Option<u32>,
    pub spawned_at: Instant,
    child: Child,
}

impl ChildHandle {
    #[must_use]
    pub fn new(job_id: String, phase: String, child: Child) -> Self {
        let pid = child.id();
        Self {
            job_id,
            phase,
            pid,
            spawned_at: Instant::now(),
            child,
        }
    }

    /// Non-blocking liveness check: `Some(outcome)` once the process has
    /// exited, `None` while it's still running.
    pub fn try_wait(&mut self) -> Result<Option<ExitOutcome>, SupervisorError> {
        let status = self.child.try_wait().map_err(|source| SupervisorError::WaitFailed {
            job_id: self.job_id.clone(),
            source,
        })?;
        Ok(status.map(|s| ExitOutcome::from_code(s.code())))
    }

    /// Suspend until the process exits (spec §5: a valid async suspension
    /// point).
    pub async fn wait(&mut self) -> Result<ExitOutcome, SupervisorError> {
        let status = self.child.wait().await.map_err(|source| SupervisorError::WaitFailed {
            job_id: self.job_id.clone(),
            source,
        })?;
        Ok(ExitOutcome::from_code(status.code()))
    }

    /// Cancel this worker. Spec §5: "In-flight LLM calls are not cancelled
    /// mid-flight; the result is discarded" — this kills the OS process
    /// outright, which is the only cancellation primitive available once a
    /// phase has been handed to its own process.
    pub async fn cancel(&mut self) -> Result<(), SupervisorError> {
        self.child.start_kill().map_err(|source| SupervisorError::CancelFailed {
            job_id: self.job_id.clone(),
            source,
        })?;
        let _ = self.child.wait().await;
        Ok(())
    }
}
