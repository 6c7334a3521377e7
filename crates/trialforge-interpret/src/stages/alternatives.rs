//! Stage 4: Alternative resolution (spec §4.G stage 4): "turn 'X or Y'
//! choice points into explicit alternatives with linked conditions." No
//! Python source was retrieved for this stage; built from spec prose.
//! Deterministic pattern matching, no LLM involved.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::document;
use crate::error::InterpretError;
use crate::stage::{Stage, StageContext, StageResult};

const STAGE_NUMBER: u8 = 4;
const STAGE_NAME: &str = "Alternative Resolution";

static OR_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*,?\s+or\s+").unwrap());

pub struct AlternativeResolutionStage;

fn split_alternatives(name: &str) -> Option<Vec<String>> {
    if !OR_SPLIT_RE.is_match(name) {
        return None;
    }
    let parts: Vec<String> = OR_SPLIT_RE
        .split(name)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() >= 2 {
        Some(parts)
    } else {
        None
    }
}

#[async_trait]
impl Stage for AlternativeResolutionStage {
    fn number(&self) -> u8 {
        STAGE_NUMBER
    }

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut document: Value, _ctx: &StageContext) -> Result<(Value, StageResult), InterpretError> {
        let mut conditions = Vec::new();
        let mut resolved = 0u32;

        for activity in document::activities_mut(&mut document) {
            let Some(name) = activity.get("name").and_then(Value::as_str).map(str::to_string) else { continue };
            let Some(options) = split_alternatives(&name) else { continue };
            let Some(activity_id) = activity.get("id").and_then(Value::as_str).map(str::to_string) else { continue };

            let alternatives: Vec<Value> = options
                .iter()
                .enumerate()
                .map(|(i, opt)| {
                    let condition_id = format!("{activity_id}-ALT-{i}");
                    conditions.push(json!({
                        "id": condition_id,
                        "instanceType": "ConditionAssignment",
                        "activityId": activity_id,
                        "description": format!("Alternative: {opt}"),
                    }));
                    json!({"label": opt, "conditionId": condition_id})
                })
                .collect();

            activity["alternatives"] = Value::Array(alternatives);
            resolved += 1;
        }

        if !conditions.is_empty() {
            let existing = document::array_mut(&mut document, "conditions");
            existing.extend(conditions);
        }

        let metrics = json!({"choicePointsResolved": resolved});
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
    async fn splits_x_or_y_into_explicit_alternatives() {
        let doc = json!({"activities": [{"id": "ACT-1", "name": "CT scan or MRI"}]});
        let (doc, result) = AlternativeResolutionStage.run(doc, &ctx()).await.unwrap();
        let alts = doc["activities"][0]["alternatives"].as_array().unwrap();
        assert_eq!(alts.len(), 2);
        assert_eq!(doc["conditions"].as_array().unwrap().len(), 2);
        assert_eq!(result.metrics["choicePointsResolved"], 1);
    }

    #[tokio::test]
    async fn leaves_activities_without_or_untouched() {
        let doc = json!({"activities": [{"id": "ACT-1", "name": "Vital Signs"}]});
        let (doc, _) = AlternativeResolutionStage.run(doc, &ctx()).await.unwrap();
        assert!(doc["activities"][0].get("alternatives").is_none());
    }
}
