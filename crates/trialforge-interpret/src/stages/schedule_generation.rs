//! Stage 11: Schedule generation (spec §4.G stage 11): "apply confirmed
//! human decisions to produce the final schedule." A Python source file
//! (`stage11_schedule_generation.py`) exists in the retrieved corpus under
//! this name, but it was truncated to a module docstring and bare imports
//! with no class body — so nothing about `ScheduleGenerator`'s actual
//! behavior was recoverable from it. This stage is therefore built from
//! spec prose like the other undocumented stages, not transliterated.
//!
//! Applies any decisions recorded against stage 10's `humanReviewPackage`
//! (`approve` keeps the item, `reject` removes it from the schedule) and
//! then marks the document as having a finalized schedule. Items with no
//! recorded decision are left untouched and still carry `_needsReview`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::document;
use crate::error::InterpretError;
use crate::stage::{Stage, StageContext, StageIssue, StageResult};

const STAGE_NUMBER: u8 = 11;
const STAGE_NAME: &str = "Schedule Generation";

pub struct ScheduleGenerationStage;

fn rejected_ids(document: &Value) -> Vec<String> {
    document
        .pointer("/humanReviewPackage/decisions")
        .and_then(Value::as_array)
        .map(|decisions| {
            decisions
                .iter()
                .filter(|d| d.get("decision").and_then(Value::as_str) == Some("reject"))
                .filter_map(|d| d.get("id").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn remove_rejected(items: &mut Vec<Value>, rejected: &HashMap<String, ()>) -> u32 {
    let before = items.len();
    items.retain(|item| {
        item.get("id")
            .and_then(Value::as_str)
            .map(|id| !rejected.contains_key(id))
            .unwrap_or(true)
    });
    (before - items.len()) as u32
}

#[async_trait]
impl Stage for ScheduleGenerationStage {
    fn number(&self) -> u8 {
        STAGE_NUMBER
    }

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut document: Value, _ctx: &StageContext) -> Result<(Value, StageResult), InterpretError> {
        let rejected: HashMap<String, ()> = rejected_ids(&document).into_iter().map(|id| (id, ())).collect();
        let mut issues = Vec::new();
        let mut removed = 0u32;

        if !rejected.is_empty() {
            removed += remove_rejected(document::activities_mut(&mut document), &rejected);
            removed += remove_rejected(document::encounters_mut(&mut document), &rejected);
            removed += remove_rejected(document::scheduled_instances_mut(&mut document), &rejected);
        }

        let pending_count = document::scheduled_instances(&document)
            .iter()
            .filter(|i| i.get("_needsReview").and_then(Value::as_bool) == Some(true))
            .count()
            + document::encounters(&document)
                .iter()
                .filter(|e| e.get("_needsReview").and_then(Value::as_bool) == Some(true))
                .count();

        if pending_count > 0 {
            issues.push(StageIssue::warning(
                "schedule_finalized_with_pending_review_items",
                format!("{pending_count} item(s) still carry _needsReview with no recorded decision"),
            ));
        }

        let owner = document::container_mut(&mut document);
        if let Some(obj) = owner.as_object_mut() {
            obj.insert(
                "scheduleSummary".to_string(),
                json!({"finalized": true, "itemsRejected": removed, "itemsPendingReview": pending_count}),
            );
        }

        let metrics = json!({"itemsRejected": removed, "itemsPendingReview": pending_count});
        Ok((document, StageResult::from_issues(STAGE_NUMBER, STAGE_NAME, issues, metrics)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageContext;
    use serde_json::json;
    use trialforge_config::{ConfidenceBands, InterpretationConfig};

    fn ctx() -> StageContext {
        StageContext {
            confidence_bands: ConfidenceBands::default(),
            interpretation: InterpretationConfig::default(),
            llm: None,
        }
    }

    #[tokio::test]
    async fn rejected_decisions_remove_the_matching_encounter() {
        let doc = json!({
            "encounters": [{"id": "ENC-1"}, {"id": "ENC-2"}],
            "humanReviewPackage": {"decisions": [{"id": "ENC-1", "decision": "reject"}]},
        });
        let (doc, result) = ScheduleGenerationStage.run(doc, &ctx()).await.unwrap();
        let encounters = doc["encounters"].as_array().unwrap();
        assert_eq!(encounters.len(), 1);
        assert_eq!(encounters[0]["id"], "ENC-2");
        assert_eq!(result.metrics["itemsRejected"], 1);
    }

    #[tokio::test]
    async fn pending_review_items_with_no_decision_emit_a_warning() {
        let doc = json!({"encounters": [{"id": "ENC-1", "_needsReview": true}]});
        let (_, result) = ScheduleGenerationStage.run(doc, &ctx()).await.unwrap();
        assert!(!result.issues.is_empty());
    }
}
