//! In-process stub backend used by integration tests in place of a live
//! provider, grounded on the teacher crate's `claude-stub` test binary
//! pattern (there implemented as a subprocess; here as a plain struct
//! since this engine's worker processes talk to the LLM over HTTP, not a
//! spawned CLI).

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::backend::LlmBackend;
use crate::error::LlmError;
use crate::types::GenerateRequest;

/// Returns pre-programmed responses in order, or errors if exhausted.
/// Also records every prompt it was called with, for assertions.
pub struct StubBackend {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<String>>,
}

impl StubBackend {
    #[must_use]
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn always_returning(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            responses: Mutex::new(VecDeque::from([Ok(text)])),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("stub mutex not poisoned").clone()
    }
}

#[async_trait]
impl LlmBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        self.calls
            .lock()
            .expect("stub mutex not poisoned")
            .push(request.prompt.clone());

        let mut responses = self.responses.lock().expect("stub mutex not poisoned");
        if responses.len() > 1 {
            responses.pop_front().expect("checked non-empty above")
        } else {
            responses
                .front()
                .cloned()
                .unwrap_or_else(|| Err(LlmError::FallbackExhausted { attempts: 0 }))
        }
    }
}
