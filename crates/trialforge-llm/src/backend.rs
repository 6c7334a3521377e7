//! The `LlmBackend` trait is the engine's sole LLM transport contract
//! (spec §6): `generate(prompt, response_format?) -> text`. Everything
//! above this trait (prompt construction, JSON shaping, retries driven by
//! quality scores) lives in `trialforge-extract` and `trialforge-interpret`.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::types::GenerateRequest;

#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Human-readable backend name for logs (e.g. `"anthropic"`, `"stub"`).
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError>;

    /// Upload (or reuse) a remote handle for `bytes` keyed by `hash`, per
    /// the source-document client contract (spec §6). Backends that do not
    /// support remote files (e.g. the stub) return `None`.
    async fn get_or_upload(
        &self,
        _bytes: &[u8],
        _hash: &str,
    ) -> Result<Option<crate::types::RemoteFileHandle>, LlmError> {
        Ok(None)
    }
}
