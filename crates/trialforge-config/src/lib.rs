//! Layered configuration for the extraction engine.
//!
//! Layers, lowest to highest precedence: compiled-in defaults, an optional
//! TOML config file, environment variables, then CLI-supplied overrides
//! (applied by the caller after [`Config::load`] returns). This mirrors the
//! teacher crate's config-source layering, generalized from CLI flags to
//! the environment variables and static registries spec.md §6 calls for.

pub mod module;
pub mod thresholds;

pub use module::{ModuleRegistry, ModuleSpec};
pub use thresholds::{ConfidenceBands, ConfidenceDecision, QualityThresholds, RetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use trialforge_utils::error::EngineError;

/// Full runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data-store connection string (spec §6 "Environment: data-store URL").
    pub database_url: String,
    /// Directory for the cache's filesystem fallback tier (spec §4.A).
    pub cache_dir: PathBuf,
    /// Optional path to a local concept-search database used by the
    /// terminology validator's LLM-fallback tier (spec §6).
    pub concept_search_db_path: Option<String>,
    /// LLM provider configuration.
    pub llm: LlmConfig,
    /// Ordered module registry (spec §4.D).
    #[serde(default)]
    pub module_registry: ModuleRegistry,
    /// Quality thresholds (spec §4.B).
    #[serde(default)]
    pub quality_thresholds: QualityThresholds,
    /// Retry bounds (spec §4.C).
    #[serde(default)]
    pub retry: RetryConfig,
    /// Confidence bands shared by the interpretation pipeline (spec §4.G).
    #[serde(default)]
    pub confidence_bands: ConfidenceBands,
    /// Interpretation-pipeline stage configuration (spec §4.G).
    #[serde(default)]
    pub interpretation: InterpretationConfig,
}

/// LLM client configuration (spec §6 "LLM client contract").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub primary_model: String,
    pub secondary_model: Option<String>,
    pub tertiary_model: Option<String>,
    /// Per-call timeout in seconds (spec §5 "Timeouts", default 180s).
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Transport-layer retry count, distinct from quality-directed
    /// retries at the application layer (spec §5).
    #[serde(default = "default_transport_retries")]
    pub transport_retries: u32,
}

fn default_timeout_seconds() -> u64 {
    180
}

fn default_transport_retries() -> u32 {
    2
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            primary_model: "claude-opus-4".to_string(),
            secondary_model: Some("claude-sonnet-4".to_string()),
            tertiary_model: Some("claude-haiku-4".to_string()),
            timeout_seconds: default_timeout_seconds(),
            transport_retries: default_transport_retries(),
        }
    }
}

/// Per-stage interpretation pipeline flags (spec §4.G).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpretationConfig {
    /// Enable the batched concept-code enricher in stage 1.
    #[serde(default = "default_true")]
    pub enable_concept_enrichment: bool,
    /// Enable cross-referencing non-table protocol sections in stage 9.
    #[serde(default = "default_true")]
    pub enable_protocol_mining: bool,
}

fn default_true() -> bool {
    true
}

impl Default for InterpretationConfig {
    fn default() -> Self {
        Self {
            enable_concept_enrichment: true,
            enable_protocol_mining: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://trialforge.db".to_string(),
            cache_dir: PathBuf::from(".trialforge/cache"),
            concept_search_db_path: None,
            llm: LlmConfig::default(),
            module_registry: ModuleRegistry::default(),
            quality_thresholds: QualityThresholds::default(),
            retry: RetryConfig::default(),
            confidence_bands: ConfidenceBands::default(),
            interpretation: InterpretationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply
    /// environment-variable overrides. Fails fast (spec §7
    /// "Schema-load / configuration missing") if a given file path does
    /// not exist.
    pub fn load(file_path: Option<&Path>) -> Result<Self, EngineError> {
        let mut config = Self::default();

        if let Some(path) = file_path {
            let text = std::fs::read_to_string(path).map_err(|e| EngineError::MissingPath {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            config = toml::from_str(&text)
                .map_err(|e| EngineError::Config(format!("invalid config TOML: {e}")))?;
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(dir) = std::env::var("CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("CONCEPT_SEARCH_DB_PATH") {
            self.concept_search_db_path = Some(path);
        }
        if let Ok(model) = std::env::var("LLM_PRIMARY_MODEL") {
            self.llm.primary_model = model;
        }
    }
}
