use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] trialforge_store::StoreError),

    #[error("extract error: {0}")]
    Extract(#[from] trialforge_extract::ExtractError),

    #[error("combiner error: {0}")]
    Combiner(#[from] trialforge_combiner::CombinerError),

    #[error("interpret error: {0}")]
    Interpret(#[from] trialforge_interpret::InterpretError),

    #[error("soa pipeline error: {0}")]
    Soa(#[from] trialforge_soa::SoaError),

    #[error("eligibility pipeline error: {0}")]
    Eligibility(#[from] trialforge_eligibility::EligibilityError),

    #[error("invalid job state transition: {job_id} cannot go from {from} to {to}")]
    InvalidTransition { job_id: String, from: String, to: String },

    #[error("job {0} is not awaiting confirmation")]
    NotAwaitingConfirmation(String),
}

impl From<EngineError> for trialforge_utils::error::EngineError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidTransition { from, to, .. } => Self::InvalidTransition { from, to },
            other => Self::Orchestrator(other.to_string()),
        }
    }
}
