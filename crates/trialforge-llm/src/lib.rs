//! LLM client contract and supporting transport machinery (spec §6
//! "LLM client contract").
//!
//! `LlmBackend` is the abstract transport (`generate(prompt) -> text`).
//! [`BudgetedBackend`] adds per-call timeout and transport-layer retry.
//! [`FallbackChain`] adds primary/secondary/tertiary model fallback for
//! interpretation-pipeline stages. Everything above this crate (prompt
//! construction, JSON parsing, quality-directed retries) lives in
//! `trialforge-extract` and `trialforge-interpret`.

pub mod anthropic_backend;
pub mod backend;
pub mod budgeted_backend;
pub mod error;
pub mod fallback_chain;
pub mod stub_backend;
pub mod types;

pub use anthropic_backend::AnthropicBackend;
pub use backend::LlmBackend;
pub use budgeted_backend::BudgetedBackend;
pub use error::LlmError;
pub use fallback_chain::FallbackChain;
pub use stub_backend::StubBackend;
pub use types::{GenerateRequest, RemoteFileHandle, ResponseFormat};
