//! Plain-record entity types (spec §3). These are never wrapped in an ORM
//! object graph with lazy relationships; every relationship is an opaque
//! id resolved by an explicit repository function (spec §9).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Protocol {
    pub id: String,
    pub filename: String,
    pub content_hash: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub remote_file_uri: Option<String>,
    pub remote_file_expires_at: Option<DateTime<Utc>>,
}

/// Which pipeline a job runs (spec §3 "Job").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    ModuleExtraction,
    Soa,
    Eligibility,
}

impl JobKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ModuleExtraction => "module_extraction",
            Self::Soa => "soa",
            Self::Eligibility => "eligibility",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "module_extraction" => Some(Self::ModuleExtraction),
            "soa" => Some(Self::Soa),
            "eligibility" => Some(Self::Eligibility),
            _ => None,
        }
    }
}

/// Progress record: phase + percent + optional sub-stage (spec §3 "Job").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Progress {
    pub phase: String,
    pub percent: f64,
    pub sub_stage: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub protocol_id: String,
    pub kind: JobKind,
    /// Kind-specific status string, e.g. `"awaiting_page_confirmation"`.
    /// The allowed values and transitions are owned by the state-machine
    /// types in `trialforge-engine` (spec §4.F); the store is agnostic to
    /// which kind-specific enum the string belongs to.
    pub status: String,
    pub current_phase: Option<String>,
    pub progress: Progress,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Kind-specific result payload (e.g. unified-document location,
    /// merge-plan id) stored as an open JSON bag.
    pub result: serde_json::Value,
}

impl Job {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status.as_str(),
            "completed" | "completed_with_errors" | "failed"
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleResultStatus {
    Completed,
    Failed,
}

impl ModuleResultStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleResult {
    pub job_id: String,
    pub module_id: String,
    pub status: ModuleResultStatus,
    pub extracted_data: serde_json::Value,
    pub provenance_coverage: f64,
    pub quality_score: serde_json::Value,
    pub pass1_duration_ms: i64,
    pub pass2_duration_ms: i64,
    pub retry_count: u32,
    pub from_cache: bool,
    pub error_details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoaTableCategory {
    MainSoa,
    PkSoa,
    SafetySoa,
    PdSoa,
}

impl SoaTableCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MainSoa => "MAIN_SOA",
            Self::PkSoa => "PK_SOA",
            Self::SafetySoa => "SAFETY_SOA",
            Self::PdSoa => "PD_SOA",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableResult {
    pub job_id: String,
    pub table_id: String,
    pub category: SoaTableCategory,
    pub page_start: i64,
    pub page_end: i64,
    pub status: String,
    pub output: serde_json::Value,
    pub visit_count: i64,
    pub activity_count: i64,
    pub instance_count: i64,
    pub footnote_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeGroup {
    pub group_id: String,
    pub source_table_ids: Vec<String>,
    pub merge_type: String,
    pub decision_level: u8,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergePlan {
    pub job_id: String,
    pub groups: Vec<MergeGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeGroupResult {
    pub job_id: String,
    pub group_id: String,
    pub stage_results: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub job_id: String,
    pub event_type: String,
    pub module_id: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Which half of the eligibility criteria list a criterion belongs to
/// (spec §4.F eligibility job, `detecting_sections` state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CriterionSection {
    Inclusion,
    Exclusion,
}

impl CriterionSection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inclusion => "inclusion",
            Self::Exclusion => "exclusion",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inclusion" => Some(Self::Inclusion),
            "exclusion" => Some(Self::Exclusion),
            _ => None,
        }
    }
}

/// Whether a criterion can be evaluated against structured/queryable
/// patient data, requires a human screening judgment, or is out of scope
/// for either (the funnel's classify-queryability stage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Queryability {
    Queryable,
    ScreeningOnly,
    NotApplicable,
}

impl Queryability {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queryable => "QUERYABLE",
            Self::ScreeningOnly => "SCREENING_ONLY",
            Self::NotApplicable => "NOT_APPLICABLE",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUERYABLE" => Some(Self::Queryable),
            "SCREENING_ONLY" => Some(Self::ScreeningOnly),
            "NOT_APPLICABLE" => Some(Self::NotApplicable),
            _ => None,
        }
    }
}

/// A single detected eligibility criterion (spec §4.F eligibility job
/// satellite entity, by analogy to `TableResult` for the SOA job).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionRecord {
    pub job_id: String,
    pub criterion_id: String,
    pub section: CriterionSection,
    pub text: String,
    /// `"detected"` | `"confirmed"` | `"skipped"`.
    pub status: String,
    pub queryability: Option<Queryability>,
    /// Position in the funnel's final narrowed/ordered sequence; `None`
    /// until the `extracting` phase has run the funnel.
    pub funnel_rank: Option<i64>,
}
