//! Stage 3: Hierarchy building (spec §4.G stage 3): "compute parent/child
//! edges across activities by domain." No Python source was retrieved for
//! this stage; built from spec prose. Deterministic — no LLM involved.
//!
//! Consumes the `parentActivityId` links stage 2 may have added and
//! produces an explicit `activityHierarchy` edge list on the document,
//! flagging any edge whose child and parent disagree on `cdashDomain` as
//! a stage issue rather than silently dropping it.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::document;
use crate::error::InterpretError;
use crate::stage::{Stage, StageContext, StageIssue, StageResult};

const STAGE_NUMBER: u8 = 3;
const STAGE_NAME: &str = "Hierarchy Building";

pub struct HierarchyBuildingStage;

#[async_trait]
impl Stage for HierarchyBuildingStage {
    fn number(&self) -> u8 {
        STAGE_NUMBER
    }

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut document: Value, _ctx: &StageContext) -> Result<(Value, StageResult), InterpretError> {
        let mut issues = Vec::new();

        let domain_by_id: HashMap<String, String> = document::activities(&document)
            .iter()
            .filter_map(|a| {
                let id = a.get("id").and_then(Value::as_str)?.to_string();
                let domain = a.get("cdashDomain").and_then(Value::as_str).unwrap_or("").to_string();
                Some((id, domain))
            })
            .collect();

        let mut edges = Vec::new();
        for activity in document::activities(&document) {
            let Some(child_id) = activity.get("id").and_then(Value::as_str) else { continue };
            let Some(parent_id) = activity.get("parentActivityId").and_then(Value::as_str) else { continue };

            let child_domain = domain_by_id.get(child_id).cloned().unwrap_or_default();
            let parent_domain = domain_by_id.get(parent_id).cloned().unwrap_or_default();

            if !parent_domain.is_empty() && !child_domain.is_empty() && parent_domain != child_domain {
                issues.push(
                    StageIssue::warning(
                        "cross_domain_hierarchy_edge",
                        format!("activity {child_id} ({child_domain}) has parent {parent_id} in a different domain ({parent_domain})"),
                    )
                    .with_path(format!("activities[{child_id}]")),
                );
            }

            edges.push(json!({
                "parentActivityId": parent_id,
                "childActivityId": child_id,
                "domain": child_domain,
            }));
        }

        let edge_count = edges.len();
        let owner = document::container_mut(&mut document);
        if let Some(obj) = owner.as_object_mut() {
            obj.insert("activityHierarchy".to_string(), Value::Array(edges));
        }

        let metrics = json!({"edgesBuilt": edge_count});
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
    async fn builds_an_edge_for_each_parent_link() {
        let doc = json!({"activities": [
            {"id": "P1", "cdashDomain": "LB"},
            {"id": "C1", "parentActivityId": "P1", "cdashDomain": "LB"},
        ]});
        let (doc, result) = HierarchyBuildingStage.run(doc, &ctx()).await.unwrap();
        assert_eq!(doc["activityHierarchy"].as_array().unwrap().len(), 1);
        assert_eq!(result.metrics["edgesBuilt"], 1);
    }

    #[tokio::test]
    async fn flags_cross_domain_parent_links() {
        let doc = json!({"activities": [
            {"id": "P1", "cdashDomain": "LB"},
            {"id": "C1", "parentActivityId": "P1", "cdashDomain": "VS"},
        ]});
        let (_, result) = HierarchyBuildingStage.run(doc, &ctx()).await.unwrap();
        assert!(!result.issues.is_empty());
    }
}
