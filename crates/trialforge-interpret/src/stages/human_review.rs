//! Stage 10: Human review assembly (spec §4.G stage 10): "collect every
//! item flagged as review into a single package." No Python source was
//! retrieved for this stage; built from spec prose. Deterministic — walks
//! the document collecting every item any earlier stage marked
//! `_needsReview: true` or gave a review-band confidence, and assembles
//! them into one `humanReviewPackage` for stage 11 to consume decisions
//! against.

use async_trait::async_trait;
use serde_json::{json, Value};
use trialforge_config::ConfidenceDecision;

use crate::document;
use crate::error::InterpretError;
use crate::stage::{Stage, StageContext, StageResult};

const STAGE_NUMBER: u8 = 10;
const STAGE_NAME: &str = "Human Review Assembly";

pub struct HumanReviewAssemblyStage;

fn needs_review(item: &Value, ctx: &StageContext) -> Option<String> {
    if item.get("_needsReview").and_then(Value::as_bool) == Some(true) {
        return Some("flagged by an earlier stage".to_string());
    }
    if let Some(confidence) = item.pointer("/_categorizationMetadata/confidence").and_then(Value::as_f64) {
        if ctx.confidence_bands.classify(confidence) == ConfidenceDecision::Review {
            return Some(format!("domain categorization confidence {confidence:.2} in review band"));
        }
    }
    if let Some(spec) = item.get("specimen") {
        if let Some(confidence) = spec.get("_confidence").and_then(Value::as_f64) {
            if ctx.confidence_bands.classify(confidence) == ConfidenceDecision::Review {
                return Some(format!("specimen enrichment confidence {confidence:.2} in review band"));
            }
        }
    }
    None
}

fn collect(kind: &'static str, items: &[Value], ctx: &StageContext, out: &mut Vec<Value>) {
    for item in items {
        let Some(reason) = needs_review(item, ctx) else { continue };
        let Some(id) = item.get("id").and_then(Value::as_str) else { continue };
        out.push(json!({"kind": kind, "id": id, "reason": reason}));
    }
}

#[async_trait]
impl Stage for HumanReviewAssemblyStage {
    fn number(&self) -> u8 {
        STAGE_NUMBER
    }

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut document: Value, ctx: &StageContext) -> Result<(Value, StageResult), InterpretError> {
        let mut items = Vec::new();
        collect("activity", document::activities(&document), ctx, &mut items);
        collect("encounter", document::encounters(&document), ctx, &mut items);
        collect("scheduledActivityInstance", document::scheduled_instances(&document), ctx, &mut items);

        let item_count = items.len();
        let owner = document::container_mut(&mut document);
        if let Some(obj) = owner.as_object_mut() {
            obj.insert("humanReviewPackage".to_string(), json!({"items": items, "status": "pending"}));
        }

        let metrics = json!({"itemsCollected": item_count});
        Ok((document, StageResult::from_issues(STAGE_NUMBER, STAGE_NAME, Vec::new(), metrics)))
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
    async fn collects_explicitly_flagged_items() {
        let doc = json!({"encounters": [{"id": "ENC-1", "_needsReview": true}]});
        let (doc, result) = HumanReviewAssemblyStage.run(doc, &ctx()).await.unwrap();
        assert_eq!(doc["humanReviewPackage"]["items"].as_array().unwrap().len(), 1);
        assert_eq!(result.metrics["itemsCollected"], 1);
    }

    #[tokio::test]
    async fn collects_review_band_confidence_mappings() {
        let doc = json!({"activities": [{"id": "ACT-1", "_categorizationMetadata": {"confidence": 0.75}}]});
        let (doc, _) = HumanReviewAssemblyStage.run(doc, &ctx()).await.unwrap();
        assert_eq!(doc["humanReviewPackage"]["items"].as_array().unwrap().len(), 1);
    }
}
