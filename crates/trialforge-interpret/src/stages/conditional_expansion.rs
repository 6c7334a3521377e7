//! Stage 6: Conditional expansion (spec §4.G stage 6): "materialize
//! conditions from footnotes, creating `Condition` objects and
//! `ConditionAssignment` links; removes scratch flags ... (
//! `_hasFootnoteCondition`)." No Python source was retrieved for this
//! stage; built from spec prose. Deterministic, no LLM involved.
//!
//! Upstream SOA-table parsing (outside this pipeline) marks any
//! instance/activity whose cell carried a footnote reference with a
//! `_hasFootnoteCondition: true` scratch flag plus the raw `footnoteText`.
//! This stage turns each such marker into an explicit `Condition` +
//! `ConditionAssignment` pair, then clears the scratch flag so later
//! stages never see it.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::document;
use crate::error::InterpretError;
use crate::stage::{Stage, StageContext, StageResult};

const STAGE_NUMBER: u8 = 6;
const STAGE_NAME: &str = "Conditional Expansion";

pub struct ConditionalExpansionStage;

fn expand_footnote_conditions(items: &mut [Value], kind: &str, conditions: &mut Vec<Value>, assignments: &mut Vec<Value>) -> u32 {
    let mut count = 0;
    for item in items.iter_mut() {
        let has_flag = item.get("_hasFootnoteCondition").and_then(Value::as_bool).unwrap_or(false);
        if !has_flag {
            continue;
        }
        let Some(id) = item.get("id").and_then(Value::as_str).map(str::to_string) else { continue };
        let footnote_text = item.get("footnoteText").and_then(Value::as_str).unwrap_or("see protocol footnote").to_string();

        let condition_id = format!("{id}-COND");
        conditions.push(json!({
            "id": condition_id,
            "instanceType": "Condition",
            "name": format!("{kind} condition"),
            "text": footnote_text,
            "appliesToId": id,
        }));
        assignments.push(json!({
            "id": format!("{condition_id}-ASSIGN"),
            "instanceType": "ConditionAssignment",
            "conditionId": condition_id,
            "targetId": id,
        }));

        if let Some(obj) = item.as_object_mut() {
            obj.remove("_hasFootnoteCondition");
        }
        count += 1;
    }
    count
}

#[async_trait]
impl Stage for ConditionalExpansionStage {
    fn number(&self) -> u8 {
        STAGE_NUMBER
    }

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut document: Value, _ctx: &StageContext) -> Result<(Value, StageResult), InterpretError> {
        let mut conditions = Vec::new();
        let mut assignments = Vec::new();

        let from_activities = expand_footnote_conditions(document::activities_mut(&mut document), "activity", &mut conditions, &mut assignments);
        let from_instances = expand_footnote_conditions(document::scheduled_instances_mut(&mut document), "instance", &mut conditions, &mut assignments);

        if !conditions.is_empty() {
            document::array_mut(&mut document, "conditions").extend(conditions);
        }
        if !assignments.is_empty() {
            document::array_mut(&mut document, "conditionAssignments").extend(assignments);
        }

        let metrics = json!({
            "fromActivities": from_activities,
            "fromScheduledInstances": from_instances,
            "totalExpanded": from_activities + from_instances,
        });
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
    async fn materializes_condition_and_clears_scratch_flag() {
        let doc = json!({"activities": [{"id": "ACT-1", "_hasFootnoteCondition": true, "footnoteText": "if eligible"}]});
        let (doc, result) = ConditionalExpansionStage.run(doc, &ctx()).await.unwrap();
        assert_eq!(doc["conditions"].as_array().unwrap().len(), 1);
        assert_eq!(doc["conditionAssignments"].as_array().unwrap().len(), 1);
        assert!(doc["activities"][0].get("_hasFootnoteCondition").is_none());
        assert_eq!(result.metrics["totalExpanded"], 1);
    }

    #[tokio::test]
    async fn activities_without_the_flag_are_untouched() {
        let doc = json!({"activities": [{"id": "ACT-1"}]});
        let (doc, _) = ConditionalExpansionStage.run(doc, &ctx()).await.unwrap();
        assert!(doc.get("conditions").is_none());
    }
}
