//! Top-level orchestration: the module orchestrator (spec §4.D), the SOA
//! and eligibility job state machines (spec §4.F), and the bridge that
//! lets the interpretation pipeline (`trialforge-interpret`) report
//! progress into persisted job events without that crate depending on
//! `trialforge-store` directly.

mod eligibility_orchestrator;
mod eligibility_state;
mod error;
mod module_orchestrator;
mod progress_bridge;
mod soa_orchestrator;
mod soa_state;

pub use eligibility_orchestrator::EligibilityOrchestrator;
pub use eligibility_state::{transition as eligibility_transition, EligibilityJobState};
pub use error::EngineError;
pub use module_orchestrator::{ModuleOrchestrator, OrchestratorOutcome};
pub use progress_bridge::EventSinkProgressBridge;
pub use soa_orchestrator::SoaOrchestrator;
pub use soa_state::{transition as soa_transition, SoaJobState};
