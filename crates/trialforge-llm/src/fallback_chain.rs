//! Primary → secondary → tertiary model fallback chain used by
//! interpretation-pipeline stages (spec §4.G "LLM usage").

use std::sync::Arc;

use crate::backend::LlmBackend;
use crate::error::LlmError;
use crate::types::GenerateRequest;

pub struct FallbackChain {
    backend: Arc<dyn LlmBackend>,
    models: Vec<String>,
}

impl FallbackChain {
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>, models: Vec<String>) -> Self {
        assert!(!models.is_empty(), "fallback chain needs at least one model");
        Self { backend, models }
    }

    /// Try each model in order; return the first success. The request's
    /// `model` field is overwritten per attempt.
    pub async fn generate(&self, mut request: GenerateRequest) -> Result<String, LlmError> {
        let mut attempts = 0;
        for model in &self.models {
            request.model = model.clone();
            attempts += 1;
            match self.backend.generate(&request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "model failed, trying next in chain");
                }
            }
        }
        Err(LlmError::FallbackExhausted { attempts })
    }
}
