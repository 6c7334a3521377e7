//! Transport-layer timeout and retry wrapper (spec §5 "Timeouts"),
//! distinct from the quality-directed retries layered on top in
//! `trialforge-extract`. Grounded on the teacher crate's
//! `xchecker-llm::budgeted_backend`.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::backend::LlmBackend;
use crate::error::LlmError;
use crate::types::GenerateRequest;

pub struct BudgetedBackend {
    inner: Arc<dyn LlmBackend>,
    timeout: Duration,
    transport_retries: u32,
}

impl BudgetedBackend {
    #[must_use]
    pub fn new(inner: Arc<dyn LlmBackend>, timeout: Duration, transport_retries: u32) -> Self {
        Self {
            inner,
            timeout,
            transport_retries,
        }
    }
}

#[async_trait]
impl LlmBackend for BudgetedBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let mut last_err = None;

        for attempt in 0..=self.transport_retries {
            let call = tokio::time::timeout(self.timeout, self.inner.generate(request));
            match call.await {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(e)) if e.is_transient() && attempt < self.transport_retries => {
                    tracing::warn!(
                        model = %request.model,
                        attempt,
                        error = %e,
                        "transient LLM error, retrying at transport layer"
                    );
                    last_err = Some(e);
                    sleep(Duration::from_millis(200 * u64::from(attempt + 1))).await;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    let err = LlmError::Timeout {
                        model: request.model.clone(),
                        timeout_secs: self.timeout.as_secs(),
                    };
                    if attempt < self.transport_retries {
                        last_err = Some(err);
                        sleep(Duration::from_millis(200 * u64::from(attempt + 1))).await;
                    } else {
                        return Err(err);
                    }
                }
            }
        }

        Err(last_err.unwrap_or(LlmError::FallbackExhausted { attempts: 0 }))
    }

    async fn get_or_upload(
        &self,
        bytes: &[u8],
        hash: &str,
    ) -> Result<Option<crate::types::RemoteFileHandle>, LlmError> {
        self.inner.get_or_upload(bytes, hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub_backend::StubBackend;
    use crate::types::GenerateRequest;

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let stub = Arc::new(StubBackend::new(vec![
            Err(LlmError::Transport {
                model: "m".into(),
                reason: "connection reset".into(),
            }),
            Ok("final answer".into()),
        ]));
        let backend = BudgetedBackend::new(stub, Duration::from_secs(5), 2);
        let req = GenerateRequest::new("hello", "m");
        let result = backend.generate(&req).await.unwrap();
        assert_eq!(result, "final answer");
    }

    #[tokio::test]
    async fn exhausts_retries_and_returns_error() {
        let stub = Arc::new(StubBackend::new(vec![Err(LlmError::Transport {
            model: "m".into(),
            reason: "down".into(),
        })]));
        let backend = BudgetedBackend::new(stub, Duration::from_secs(5), 1);
        let req = GenerateRequest::new("hello", "m");
        assert!(backend.generate(&req).await.is_err());
    }
}
