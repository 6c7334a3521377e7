//! Stage 8: Cycle expansion (spec §4.G stage 8): materialize encounters
//! that recur per cycle (`PER_CYCLE`, `FIXED_INTERVAL`, `AT_EVENT`) into
//! explicit per-cycle encounters, duplicating all referencing instances;
//! event-driven recurrence is flagged for human review rather than
//! expanded. No Python source was retrieved for this stage; built from
//! spec prose and the testable-property law in spec §8: "the expanded
//! encounter count equals the declared maxCycles (or maxOccurrences);
//! referencing-instance count after expansion equals original count ×
//! cycles."

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::document;
use crate::error::InterpretError;
use crate::stage::{Stage, StageContext, StageIssue, StageResult};

const STAGE_NUMBER: u8 = 8;
const STAGE_NAME: &str = "Cycle Expansion";

pub struct CycleExpansionStage;

fn cycle_count(recurrence: &Value) -> Option<u32> {
    recurrence
        .get("maxCycles")
        .or_else(|| recurrence.get("maxOccurrences"))
        .and_then(Value::as_u64)
        .map(|n| n as u32)
}

#[async_trait]
impl Stage for CycleExpansionStage {
    fn number(&self) -> u8 {
        STAGE_NUMBER
    }

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut document: Value, _ctx: &StageContext) -> Result<(Value, StageResult), InterpretError> {
        let mut issues = Vec::new();
        let mut encounters_expanded = 0u32;
        let mut flagged_for_review = 0u32;

        // id -> Vec<new ids> for encounters that were expanded.
        let mut expansion_map: Vec<(String, Vec<String>)> = Vec::new();

        let encounters = document::encounters_mut(&mut document);
        let mut new_encounters = Vec::with_capacity(encounters.len());

        for encounter in encounters.drain(..) {
            let Some(recurrence) = encounter.get("recurrence").cloned() else {
                new_encounters.push(encounter);
                continue;
            };
            let kind = recurrence.get("type").and_then(Value::as_str).unwrap_or("");
            let Some(orig_id) = encounter.get("id").and_then(Value::as_str).map(str::to_string) else {
                new_encounters.push(encounter);
                continue;
            };

            if kind == "AT_EVENT" {
                let mut flagged = encounter.clone();
                if let Some(obj) = flagged.as_object_mut() {
                    obj.insert("_needsReview".to_string(), Value::Bool(true));
                }
                issues.push(
                    StageIssue::warning("event_driven_recurrence_needs_review", format!("encounter {orig_id} recurs at an event and was not auto-expanded"))
                        .with_path(format!("encounters[{orig_id}]")),
                );
                flagged_for_review += 1;
                new_encounters.push(flagged);
                continue;
            }

            if !matches!(kind, "PER_CYCLE" | "FIXED_INTERVAL") {
                new_encounters.push(encounter);
                continue;
            }

            let Some(cycles) = cycle_count(&recurrence) else {
                issues.push(
                    StageIssue::warning("cycle_recurrence_missing_count", format!("encounter {orig_id} declares {kind} recurrence with no maxCycles/maxOccurrences"))
                        .with_path(format!("encounters[{orig_id}]")),
                );
                new_encounters.push(encounter);
                continue;
            };

            let mut new_ids = Vec::with_capacity(cycles as usize);
            for cycle in 1..=cycles {
                let new_id = format!("{orig_id}-CYCLE-{cycle}");
                let mut clone = encounter.clone();
                if let Some(obj) = clone.as_object_mut() {
                    obj.insert("id".to_string(), Value::String(new_id.clone()));
                    obj.insert(
                        "_cycleExpansion".to_string(),
                        json!({"originalEncounterId": orig_id, "cycleNumber": cycle, "totalCycles": cycles}),
                    );
                }
                new_ids.push(new_id);
                new_encounters.push(clone);
            }
            expansion_map.push((orig_id, new_ids));
            encounters_expanded += 1;
        }
        *document::encounters_mut(&mut document) = new_encounters;

        let mut instances_duplicated = 0u32;
        let instances = document::scheduled_instances_mut(&mut document);
        let mut new_instances = Vec::with_capacity(instances.len());
        for instance in instances.drain(..) {
            let Some(encounter_id) = instance.get("encounterId").and_then(Value::as_str).map(str::to_string) else {
                new_instances.push(instance);
                continue;
            };
            let Some((_, new_ids)) = expansion_map.iter().find(|(orig, _)| orig == &encounter_id) else {
                new_instances.push(instance);
                continue;
            };
            let Some(orig_instance_id) = instance.get("id").and_then(Value::as_str).map(str::to_string) else {
                new_instances.push(instance);
                continue;
            };
            for new_encounter_id in new_ids {
                let mut clone = instance.clone();
                if let Some(obj) = clone.as_object_mut() {
                    obj.insert("id".to_string(), Value::String(format!("{orig_instance_id}-{new_encounter_id}")));
                    obj.insert("encounterId".to_string(), Value::String(new_encounter_id.clone()));
                }
                new_instances.push(clone);
                instances_duplicated += 1;
            }
        }
        *document::scheduled_instances_mut(&mut document) = new_instances;

        let metrics = json!({
            "encountersExpanded": encounters_expanded,
            "flaggedForReview": flagged_for_review,
            "instancesDuplicated": instances_duplicated,
        });
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
    async fn expands_per_cycle_encounters_and_duplicates_referencing_instances() {
        let doc = json!({
            "encounters": [{"id": "ENC-1", "recurrence": {"type": "PER_CYCLE", "maxCycles": 3}}],
            "scheduledActivityInstances": [{"id": "SAI-1", "encounterId": "ENC-1"}],
        });
        let (doc, result) = CycleExpansionStage.run(doc, &ctx()).await.unwrap();
        assert_eq!(doc["encounters"].as_array().unwrap().len(), 3);
        assert_eq!(doc["scheduledActivityInstances"].as_array().unwrap().len(), 3);
        assert_eq!(result.metrics["encountersExpanded"], 1);
        assert_eq!(result.metrics["instancesDuplicated"], 3);
    }

    #[tokio::test]
    async fn at_event_recurrence_is_flagged_not_expanded() {
        let doc = json!({"encounters": [{"id": "ENC-1", "recurrence": {"type": "AT_EVENT"}}]});
        let (doc, result) = CycleExpansionStage.run(doc, &ctx()).await.unwrap();
        assert_eq!(doc["encounters"].as_array().unwrap().len(), 1);
        assert_eq!(doc["encounters"][0]["_needsReview"], true);
        assert_eq!(result.metrics["flaggedForReview"], 1);
    }
}
