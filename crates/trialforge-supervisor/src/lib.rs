//! Process supervisor (spec §4.E): spawns each pipeline phase as its own
//! OS process via `tokio::process::Command` and tracks liveness, exit
//! code, and cancellation through a registry keyed by job id. Grounded on
//! the teacher's `xchecker-runner` process-execution crate, adapted from
//! a synchronous `ProcessRunner` to an async handle since pipeline
//! workers are long-running rather than request/response.

pub mod child;
pub mod command_spec;
pub mod error;
pub mod registry;

pub use child::{ChildHandle, ExitOutcome};
pub use command_spec::CommandSpec;
pub use error::SupervisorError;
pub use registry::{Registry, WorkerState, WorkerStatus};
