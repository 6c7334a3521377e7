use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("transport error calling {model}: {reason}")]
    Transport { model: String, reason: String },

    #[error("call to {model} timed out after {timeout_secs}s")]
    Timeout { model: String, timeout_secs: u64 },

    #[error("remote file handle expired")]
    ExpiredHandle,

    #[error("all models in fallback chain failed: {attempts} attempt(s)")]
    FallbackExhausted { attempts: usize },
}

impl LlmError {
    /// Transient errors (spec §7) are retried at the transport layer;
    /// others are not worth retrying without a different model.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}
