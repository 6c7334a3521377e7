//! Builds the `LlmBackend` the engine talks to, from `Config` plus
//! environment credentials (spec §6 "Environment: ... LLM provider
//! credentials"). Wraps whichever transport is selected in
//! `BudgetedBackend` so every call path gets the same per-call timeout
//! and transport-retry behavior (spec §5 "Timeouts").

use std::sync::Arc;
use std::time::Duration;

use trialforge_config::Config;
use trialforge_llm::{AnthropicBackend, BudgetedBackend, LlmBackend, StubBackend};
use trialforge_utils::error::EngineError;

/// Environment variable holding the Anthropic API key (spec §6).
const ANTHROPIC_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

pub fn build_backend(config: &Config) -> Result<Arc<dyn LlmBackend>, EngineError> {
    let timeout = Duration::from_secs(config.llm.timeout_seconds);
    let inner: Arc<dyn LlmBackend> = match config.llm.provider.as_str() {
        "anthropic" => {
            let api_key = std::env::var(ANTHROPIC_API_KEY_VAR).map_err(|_| {
                EngineError::Config(format!("{ANTHROPIC_API_KEY_VAR} is not set; required for the anthropic provider"))
            })?;
            Arc::new(AnthropicBackend::new(api_key, timeout))
        }
        "stub" => Arc::new(StubBackend::always_returning("{}".to_string())),
        other => return Err(EngineError::Config(format!("unknown LLM provider '{other}'"))),
    };
    Ok(Arc::new(BudgetedBackend::new(inner, timeout, config.llm.transport_retries)))
}
