//! Request/response shapes for the LLM client contract (spec §6
//! "LLM client contract").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A handle to a large source document already uploaded to the provider,
/// so callers don't resend the PDF bytes on every call (spec §6
/// "Source-document client contract").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFileHandle {
    pub uri: String,
    pub expires_at: DateTime<Utc>,
}

impl RemoteFileHandle {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Whether the caller wants raw text or is hinting that the response
/// should be JSON (the LLM client still returns raw text either way —
/// JSON shaping is the caller's job per spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub response_format: ResponseFormat,
    pub remote_file: Option<RemoteFileHandle>,
    /// Model identifier to use for this call; the fallback chain
    /// overwrites this per attempt.
    pub model: String,
}

impl GenerateRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response_format: ResponseFormat::Json,
            remote_file: None,
            model: model.into(),
        }
    }

    #[must_use]
    pub fn with_remote_file(mut self, handle: RemoteFileHandle) -> Self {
        self.remote_file = Some(handle);
        self
    }
}
