//! Orchestrates the twelve interpretation stages in order (spec §4.G).
//!
//! Mirrors the teacher's phase-runner shape (`xchecker-phase-api::Phase`
//! plus its sequential executor): a fixed ordered list of boxed trait
//! objects, run one after another, each handed the previous stage's full
//! output document. Every stage is restartable from any prior stage's
//! output — there is no hidden state threaded between calls beyond the
//! document itself, so `InterpretationPipeline::run_from` can resume at
//! any stage number.

use std::sync::Arc;

use serde_json::Value;

use crate::error::InterpretError;
use crate::progress::{NullProgressSink, ProgressSink};
use crate::stage::{Stage, StageContext, StageResult};
use crate::stages::{
    ActivityExpansionStage, AlternativeResolutionStage, ComplianceCheckStage, ConditionalExpansionStage, CycleExpansionStage,
    DomainCategorizationStage, HierarchyBuildingStage, HumanReviewAssemblyStage, ProtocolMiningStage, ScheduleGenerationStage,
    SpecimenEnrichmentStage, TimingDistributionStage,
};

/// Outcome of running the pipeline (or a suffix of it) to completion or
/// until a stage reports an error.
pub struct PipelineOutcome {
    pub document: Value,
    pub stage_results: Vec<StageResult>,
    pub halted_at_stage: Option<u8>,
}

pub struct InterpretationPipeline {
    stages: Vec<Box<dyn Stage>>,
    progress: Arc<dyn ProgressSink>,
}

impl InterpretationPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::with_progress_sink(Arc::new(NullProgressSink))
    }

    #[must_use]
    pub fn with_progress_sink(progress: Arc<dyn ProgressSink>) -> Self {
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(DomainCategorizationStage),
            Box::new(ActivityExpansionStage),
            Box::new(HierarchyBuildingStage),
            Box::new(AlternativeResolutionStage),
            Box::new(SpecimenEnrichmentStage),
            Box::new(ConditionalExpansionStage),
            Box::new(TimingDistributionStage),
            Box::new(CycleExpansionStage),
            Box::new(ProtocolMiningStage),
            Box::new(HumanReviewAssemblyStage),
            Box::new(ScheduleGenerationStage),
            Box::new(ComplianceCheckStage),
        ];
        Self { stages, progress }
    }

    /// Runs every stage in order, starting from stage 1.
    pub async fn run(&self, document: Value, ctx: &StageContext) -> Result<PipelineOutcome, InterpretError> {
        self.run_from(1, document, ctx).await
    }

    /// Runs stages whose number is `>= from_stage_number`, handing each
    /// the document returned by the previous one. Used to resume a
    /// previously interrupted or partially-completed run.
    pub async fn run_from(&self, from_stage_number: u8, mut document: Value, ctx: &StageContext) -> Result<PipelineOutcome, InterpretError> {
        let mut stage_results = Vec::with_capacity(self.stages.len());
        let mut halted_at_stage = None;

        for stage in &self.stages {
            if stage.number() < from_stage_number {
                continue;
            }

            let (new_document, result) = stage.run(document, ctx).await?;
            document = new_document;

            self.progress.on_stage_complete(result.stage_number, result.stage_name, result.status.to_progress_status());

            let is_error = result.status == crate::stage::StageResultStatus::Error;
            stage_results.push(result);

            if is_error {
                halted_at_stage = Some(stage.number());
                break;
            }
        }

        Ok(PipelineOutcome {
            document,
            stage_results,
            halted_at_stage,
        })
    }
}

impl Default for InterpretationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::StageStatus;
    use serde_json::json;
    use std::sync::Mutex;
    use trialforge_config::{ConfidenceBands, InterpretationConfig};

    struct RecordingSink(Mutex<Vec<(u8, StageStatus)>>);

    impl ProgressSink for RecordingSink {
        fn on_stage_complete(&self, stage_number: u8, _stage_name: &str, status: StageStatus) {
            self.0.lock().unwrap().push((stage_number, status));
        }
    }

    fn ctx() -> StageContext {
        StageContext {
            confidence_bands: ConfidenceBands::default(),
            interpretation: InterpretationConfig::default(),
            llm: None,
        }
    }

    #[tokio::test]
    async fn runs_all_twelve_stages_on_an_empty_document_without_error() {
        let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
        let pipeline = InterpretationPipeline::with_progress_sink(sink.clone());
        let outcome = pipeline.run(json!({}), &ctx()).await.unwrap();
        assert_eq!(outcome.stage_results.len(), 12);
        assert!(outcome.halted_at_stage.is_none());
        assert_eq!(sink.0.lock().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn run_from_resumes_partway_through_the_stage_list() {
        let pipeline = InterpretationPipeline::new();
        let outcome = pipeline.run_from(9, json!({}), &ctx()).await.unwrap();
        assert_eq!(outcome.stage_results.len(), 4);
        assert_eq!(outcome.stage_results[0].stage_number, 9);
    }

    #[tokio::test]
    async fn a_dangling_reference_halts_the_pipeline_at_the_compliance_stage() {
        let pipeline = InterpretationPipeline::new();
        let doc = json!({
            "encounters": [{"id": "ENC-1"}],
            "scheduledActivityInstances": [{"id": "SAI-1", "encounterId": "ENC-MISSING"}],
        });
        let outcome = pipeline.run(doc, &ctx()).await.unwrap();
        assert_eq!(outcome.halted_at_stage, Some(12));
    }
}
