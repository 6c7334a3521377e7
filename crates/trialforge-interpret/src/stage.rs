//! Stage interface (spec §4.G "Stage interface"): `run(document, config) ->
//! (document, stage_result)`. Every stage must be restartable from the
//! previous stage's output — no hidden in-memory state between stages,
//! hence `&self` methods take the whole document by value and hand it
//! back rather than mutating shared state across calls.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use trialforge_config::{ConfidenceBands, InterpretationConfig};
use trialforge_llm::FallbackChain;

use crate::error::InterpretError;
use crate::progress::StageStatus;

/// One finding recorded by a stage: a referential-integrity problem, a
/// low-confidence mapping flagged for review, or similar.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StageIssue {
    pub severity: IssueSeverity,
    pub code: String,
    pub message: String,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum IssueSeverity {
    Warning,
    Error,
}

impl StageIssue {
    #[must_use]
    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            code: code.into(),
            message: message.into(),
            path: None,
        }
    }

    #[must_use]
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            code: code.into(),
            message: message.into(),
            path: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StageResult {
    pub stage_number: u8,
    pub stage_name: &'static str,
    pub status: StageResultStatus,
    pub issues: Vec<StageIssue>,
    pub metrics: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum StageResultStatus {
    Ok,
    Warning,
    Error,
}

impl StageResultStatus {
    #[must_use]
    pub fn to_progress_status(self) -> StageStatus {
        match self {
            Self::Ok => StageStatus::Ok,
            Self::Warning => StageStatus::Warning,
            Self::Error => StageStatus::Error,
        }
    }
}

impl StageResult {
    #[must_use]
    pub fn from_issues(stage_number: u8, stage_name: &'static str, issues: Vec<StageIssue>, metrics: Value) -> Self {
        let status = if issues.iter().any(|i| i.severity == IssueSeverity::Error) {
            StageResultStatus::Error
        } else if issues.iter().any(|i| i.severity == IssueSeverity::Warning) {
            StageResultStatus::Warning
        } else {
            StageResultStatus::Ok
        };
        Self {
            stage_number,
            stage_name,
            status,
            issues,
            metrics,
        }
    }
}

/// Shared context threaded through every stage: confidence bands (spec
/// §4.G "Confidence semantics"), per-stage feature flags, and an optional
/// LLM fallback chain for the stages that call one.
#[derive(Clone)]
pub struct StageContext {
    pub confidence_bands: ConfidenceBands,
    pub interpretation: InterpretationConfig,
    pub llm: Option<Arc<FallbackChain>>,
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn number(&self) -> u8;
    fn name(&self) -> &'static str;

    async fn run(&self, document: Value, ctx: &StageContext) -> Result<(Value, StageResult), InterpretError>;
}
