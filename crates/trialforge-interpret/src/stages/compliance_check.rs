//! Stage 12: Compliance check (spec §4.G stage 12): final referential
//! integrity and USDM code-object validation pass. No Python source was
//! retrieved for this stage; built from spec prose. Deterministic, no LLM
//! involved. Broken references are recorded as `Error` issues, which the
//! pipeline treats as halting (spec §4.G: "error-halts-pipeline"); missing
//! optional metadata is recorded as `Warning` and does not halt.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::document;
use crate::error::InterpretError;
use crate::stage::{Stage, StageContext, StageIssue, StageResult};

const STAGE_NUMBER: u8 = 12;
const STAGE_NAME: &str = "Compliance Check";

pub struct ComplianceCheckStage;

const CODE_OBJECT_FIELDS: [&str; 5] = ["id", "code", "decode", "codeSystem", "codeSystemVersion"];

fn ids_of<'a>(items: &'a [Value]) -> HashSet<&'a str> {
    items.iter().filter_map(|i| i.get("id").and_then(Value::as_str)).collect()
}

fn check_code_objects(document: &Value, issues: &mut Vec<StageIssue>) -> u32 {
    let mut checked = 0u32;
    for activity in document::activities(document) {
        let Some(mapping) = activity.get("cdiscMapping") else { continue };
        checked += 1;
        for field in CODE_OBJECT_FIELDS {
            if mapping.get(field).and_then(Value::as_str).map(str::is_empty).unwrap_or(true) {
                let id = activity.get("id").and_then(Value::as_str).unwrap_or("<unknown>");
                issues.push(
                    StageIssue::warning("incomplete_code_object", format!("activity {id} cdiscMapping is missing field `{field}`"))
                        .with_path(format!("activities[{id}].cdiscMapping")),
                );
            }
        }
    }
    checked
}

#[async_trait]
impl Stage for ComplianceCheckStage {
    fn number(&self) -> u8 {
        STAGE_NUMBER
    }

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, document: Value, _ctx: &StageContext) -> Result<(Value, StageResult), InterpretError> {
        let mut issues = Vec::new();

        let activity_ids = ids_of(document::activities(&document));
        let encounter_ids = ids_of(document::encounters(&document));
        let condition_ids: HashSet<&str> = document::container(&document)
            .get("conditions")
            .and_then(Value::as_array)
            .map(|c| ids_of(c))
            .unwrap_or_default();

        for instance in document::scheduled_instances(&document) {
            let instance_id = instance.get("id").and_then(Value::as_str).unwrap_or("<unknown>");
            if let Some(encounter_id) = instance.get("encounterId").and_then(Value::as_str) {
                if !encounter_ids.contains(encounter_id) {
                    issues.push(
                        StageIssue::error("dangling_encounter_reference", format!("scheduledActivityInstance {instance_id} references missing encounter {encounter_id}"))
                            .with_path(format!("scheduledActivityInstances[{instance_id}].encounterId")),
                    );
                }
            }
            if let Some(activity_id) = instance.get("activityId").and_then(Value::as_str) {
                if !activity_ids.contains(activity_id) {
                    issues.push(
                        StageIssue::error("dangling_activity_reference", format!("scheduledActivityInstance {instance_id} references missing activity {activity_id}"))
                            .with_path(format!("scheduledActivityInstances[{instance_id}].activityId")),
                    );
                }
            }
        }

        if let Some(assignments) = document::container(&document).get("conditionAssignments").and_then(Value::as_array) {
            for assignment in assignments {
                let assignment_id = assignment.get("id").and_then(Value::as_str).unwrap_or("<unknown>");
                if let Some(condition_id) = assignment.get("conditionId").and_then(Value::as_str) {
                    if !condition_ids.contains(condition_id) {
                        issues.push(
                            StageIssue::error("dangling_condition_reference", format!("conditionAssignment {assignment_id} references missing condition {condition_id}"))
                                .with_path(format!("conditionAssignments[{assignment_id}].conditionId")),
                        );
                    }
                }
            }
        }

        let code_objects_checked = check_code_objects(&document, &mut issues);

        let error_count = issues.iter().filter(|i| i.severity == crate::stage::IssueSeverity::Error).count();
        let warning_count = issues.len() - error_count;

        let metrics = json!({
            "codeObjectsChecked": code_objects_checked,
            "errorCount": error_count,
            "warningCount": warning_count,
        });
        Ok((document, StageResult::from_issues(STAGE_NUMBER, STAGE_NAME, issues, metrics)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{IssueSeverity, StageContext};
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
    async fn dangling_encounter_reference_is_an_error() {
        let doc = json!({
            "encounters": [{"id": "ENC-1"}],
            "scheduledActivityInstances": [{"id": "SAI-1", "encounterId": "ENC-MISSING"}],
        });
        let (_, result) = ComplianceCheckStage.run(doc, &ctx()).await.unwrap();
        assert!(result.issues.iter().any(|i| i.severity == IssueSeverity::Error && i.code == "dangling_encounter_reference"));
        assert_eq!(result.metrics["errorCount"], 1);
    }

    #[tokio::test]
    async fn incomplete_code_object_is_a_warning() {
        let doc = json!({"activities": [{"id": "ACT-1", "cdiscMapping": {"id": "c1", "code": "VSORRES", "decode": "", "codeSystem": "CDISC", "codeSystemVersion": "2024"}}]});
        let (_, result) = ComplianceCheckStage.run(doc, &ctx()).await.unwrap();
        assert!(result.issues.iter().any(|i| i.severity == IssueSeverity::Warning && i.code == "incomplete_code_object"));
        assert_eq!(result.metrics["errorCount"], 0);
    }

    #[tokio::test]
    async fn fully_consistent_document_has_no_issues() {
        let doc = json!({
            "encounters": [{"id": "ENC-1"}],
            "activities": [{"id": "ACT-1"}],
            "scheduledActivityInstances": [{"id": "SAI-1", "encounterId": "ENC-1", "activityId": "ACT-1"}],
        });
        let (_, result) = ComplianceCheckStage.run(doc, &ctx()).await.unwrap();
        assert!(result.issues.is_empty());
    }
}
