//! Twelve-stage interpretation pipeline (spec §4.G): turns a merged SOA
//! document into a USDM-compliant, fully expanded schedule.
//!
//! Each stage is an independent [`Stage`] implementation operating on the
//! same `serde_json::Value` document; [`InterpretationPipeline`] runs them
//! in order and is restartable from any stage boundary. This crate has no
//! dependency on `trialforge-store` — progress is reported through the
//! [`ProgressSink`] trait, which `trialforge-engine` bridges into event
//! persistence.

mod cdisc_enrichment;
mod document;
mod error;
mod json_extract;
mod pipeline;
mod progress;
mod stage;
mod stages;

#[cfg(test)]
mod proptest;

pub use error::InterpretError;
pub use pipeline::{InterpretationPipeline, PipelineOutcome};
pub use progress::{NullProgressSink, ProgressSink, StageStatus};
pub use stage::{IssueSeverity, Stage, StageContext, StageIssue, StageResult, StageResultStatus};
pub use stages::{
    ActivityExpansionStage, AlternativeResolutionStage, ComplianceCheckStage, ConditionalExpansionStage, CycleExpansionStage,
    DomainCategorizationStage, HierarchyBuildingStage, HumanReviewAssemblyStage, ProtocolMiningStage, ScheduleGenerationStage,
    SpecimenEnrichmentStage, TimingDistributionStage,
};
