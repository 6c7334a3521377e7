//! Root error type shared across the engine.
//!
//! Every subsystem crate defines its own focused error enum (`CacheError`,
//! `QualityError`, `ExtractionError`, ...) and converts into `EngineError`
//! via `#[from]`. Library code returns `Result<T, EngineError>` or
//! propagates with `anyhow::Context`; only worker `main()` functions map an
//! `EngineError` to a process exit code.

use thiserror::Error;

/// Library-level error type for the extraction engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("quality evaluation error: {0}")]
    Quality(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("orchestrator error: {0}")]
    Orchestrator(String),

    #[error("process supervisor error: {0}")]
    Supervisor(String),

    #[error("job state machine error: {from} -> {to} is not a legal transition")]
    InvalidTransition { from: String, to: String },

    #[error("interpretation pipeline error at stage {stage}: {reason}")]
    Interpretation { stage: u8, reason: String },

    #[error("provenance validation error: {0}")]
    Provenance(String),

    #[error("data store error: {0}")]
    Store(String),

    #[error("LLM backend error: {0}")]
    Llm(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required configuration path: {path} ({reason})")]
    MissingPath { path: String, reason: String },
}

/// Category used for exit-code mapping and metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Transient,
    QualityThreshold,
    ParseFailure,
    ModuleLevel,
    PipelineFatal,
}

impl EngineError {
    /// Classify the error for propagation-policy purposes (spec §7).
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) | Self::MissingPath { .. } => ErrorCategory::Config,
            Self::Io(_) | Self::Llm(_) | Self::Supervisor(_) => ErrorCategory::Transient,
            Self::Quality(_) => ErrorCategory::QualityThreshold,
            Self::Json(_) => ErrorCategory::ParseFailure,
            Self::Extraction(_) | Self::Cache(_) => ErrorCategory::ModuleLevel,
            Self::Orchestrator(_)
            | Self::InvalidTransition { .. }
            | Self::Interpretation { .. }
            | Self::Provenance(_)
            | Self::Store(_) => ErrorCategory::PipelineFatal,
        }
    }

    /// First 1000 chars of the error's display, for a job record's
    /// `error_message` column (spec §7 "user-visible failure behavior").
    #[must_use]
    pub fn truncated_message(&self) -> String {
        let full = self.to_string();
        if full.len() <= 1000 {
            full
        } else {
            let mut s = full.chars().take(1000).collect::<String>();
            s.push('\u{2026}');
            s
        }
    }
}

/// Trait for human-facing error presentation, independent of the
/// programmatic `Display` impl used in logs.
pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestions(&self) -> Vec<String> {
        Vec::new()
    }
}

impl UserFriendlyError for EngineError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(msg) => format!("Configuration problem: {msg}"),
            Self::MissingPath { path, reason } => {
                format!("Required file not found at '{path}': {reason}")
            }
            Self::Cache(msg) => format!("Cache backend problem (degraded, not fatal): {msg}"),
            Self::Quality(msg) => format!("Quality evaluation could not complete: {msg}"),
            Self::Extraction(msg) => format!("Extraction failed: {msg}"),
            Self::Orchestrator(msg) => format!("Orchestrator failed: {msg}"),
            Self::Supervisor(msg) => format!("Worker process problem: {msg}"),
            Self::InvalidTransition { from, to } => {
                format!("Illegal job state transition from '{from}' to '{to}'")
            }
            Self::Interpretation { stage, reason } => {
                format!("Interpretation stage {stage} failed: {reason}")
            }
            Self::Provenance(msg) => format!("Provenance/terminology validation failed: {msg}"),
            Self::Store(msg) => format!("Data store error: {msg}"),
            Self::Llm(msg) => format!("LLM provider error: {msg}"),
            Self::Io(e) => format!("I/O error: {e}"),
            Self::Json(e) => format!("Could not parse JSON: {e}"),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::MissingPath { .. } => {
                vec!["Check the module registry / config file paths".to_string()]
            }
            Self::Cache(_) => vec!["Extraction will proceed without the cache".to_string()],
            _ => Vec::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
