//! Stage 9: Protocol mining (spec §4.G stage 9): "cross-reference
//! non-table protocol sections to enrich data." No Python source was
//! retrieved for this stage; built from spec prose. Deterministic
//! substring cross-reference — the same text-search approach this
//! workspace already uses in `trialforge_provenance`'s footer-pattern
//! matching, rather than an LLM call, since locating a literal activity
//! name inside prose sections doesn't need semantic reasoning. Gated by
//! `InterpretationConfig::enable_protocol_mining`.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::document;
use crate::error::InterpretError;
use crate::stage::{Stage, StageContext, StageResult};

const STAGE_NUMBER: u8 = 9;
const STAGE_NAME: &str = "Protocol Mining";

pub struct ProtocolMiningStage;

#[async_trait]
impl Stage for ProtocolMiningStage {
    fn number(&self) -> u8 {
        STAGE_NUMBER
    }

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut document: Value, ctx: &StageContext) -> Result<(Value, StageResult), InterpretError> {
        if !ctx.interpretation.enable_protocol_mining {
            let metrics = json!({"skipped": true, "activitiesEnriched": 0});
            return Ok((document, StageResult::from_issues(STAGE_NUMBER, STAGE_NAME, Vec::new(), metrics)));
        }

        let sections: Vec<(String, String, String)> = document::container(&document)
            .get("protocolSections")
            .and_then(Value::as_array)
            .map(|sections| {
                sections
                    .iter()
                    .filter_map(|s| {
                        let id = s.get("id").and_then(Value::as_str)?.to_string();
                        let heading = s.get("heading").and_then(Value::as_str).unwrap_or("").to_string();
                        let text = s.get("text").and_then(Value::as_str).unwrap_or("").to_lowercase();
                        Some((id, heading, text))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut enriched = 0u32;
        if !sections.is_empty() {
            for activity in document::activities_mut(&mut document) {
                let Some(name) = activity.get("name").and_then(Value::as_str).map(str::to_string) else { continue };
                if name.trim().len() < 4 {
                    continue;
                }
                let needle = name.to_lowercase();
                let matches: Vec<Value> = sections
                    .iter()
                    .filter(|(_, _, text)| text.contains(&needle))
                    .map(|(id, heading, _)| json!({"sectionId": id, "heading": heading}))
                    .collect();

                if !matches.is_empty() {
                    activity["_protocolReferences"] = Value::Array(matches);
                    enriched += 1;
                }
            }
        }

        let metrics = json!({"skipped": false, "sectionsScanned": sections.len(), "activitiesEnriched": enriched});
        Ok((document, StageResult::from_issues(STAGE_NUMBER, STAGE_NAME, Vec::new(), metrics)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageContext;
    use serde_json::json;
    use trialforge_config::{ConfidenceBands, InterpretationConfig};

    fn ctx(enable: bool) -> StageContext {
        StageContext {
            confidence_bands: ConfidenceBands::default(),
            interpretation: InterpretationConfig { enable_protocol_mining: enable, ..InterpretationConfig::default() },
            llm: None,
        }
    }

    #[tokio::test]
    async fn finds_activity_name_mentioned_in_a_protocol_section() {
        let doc = json!({
            "activities": [{"id": "ACT-1", "name": "Tumor Assessment"}],
            "protocolSections": [{"id": "SEC-5", "heading": "Efficacy Assessments", "text": "Tumor assessment will be performed per RECIST 1.1."}],
        });
        let (doc, result) = ProtocolMiningStage.run(doc, &ctx(true)).await.unwrap();
        assert_eq!(doc["activities"][0]["_protocolReferences"].as_array().unwrap().len(), 1);
        assert_eq!(result.metrics["activitiesEnriched"], 1);
    }

    #[tokio::test]
    async fn disabled_flag_skips_the_stage_entirely() {
        let doc = json!({"activities": [{"id": "ACT-1", "name": "Tumor Assessment"}], "protocolSections": [{"id": "SEC-5", "text": "Tumor assessment details"}]});
        let (doc, result) = ProtocolMiningStage.run(doc, &ctx(false)).await.unwrap();
        assert!(doc["activities"][0].get("_protocolReferences").is_none());
        assert_eq!(result.metrics["skipped"], true);
    }
}
