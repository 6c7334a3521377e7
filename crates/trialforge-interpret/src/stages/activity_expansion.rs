//! Stage 2: Activity component expansion (spec §4.G stage 2). No Python
//! source for this stage was retrieved (see crate-level grounding note in
//! `DESIGN.md`); built from spec prose: "decompose parent activities into
//! sub-components; validates candidates via a batched LLM call returning
//! a 3-way classification {valid, invalid, review} with confidence."
//!
//! Candidate sub-components are derived heuristically by splitting an
//! activity's name on common list delimiters ("and", "/", comma) — the
//! same shape of heuristic the SOA table parser upstream of this pipeline
//! would use to flag compound activity names in the first place.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use trialforge_config::ConfidenceDecision;
use trialforge_llm::GenerateRequest;

use crate::document;
use crate::error::InterpretError;
use crate::json_extract::extract_json_array;
use crate::stage::{Stage, StageContext, StageIssue, StageResult};

const STAGE_NUMBER: u8 = 2;
const STAGE_NAME: &str = "Activity Component Expansion";

pub struct ActivityExpansionStage;

fn candidate_components(name: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for chunk in name.split(" and ") {
        for sub in chunk.split('/') {
            for item in sub.split(',') {
                let trimmed = item.trim();
                if trimmed.len() > 2 {
                    parts.push(trimmed.to_string());
                }
            }
        }
    }
    if parts.len() > 1 {
        parts
    } else {
        Vec::new()
    }
}

#[async_trait]
impl Stage for ActivityExpansionStage {
    fn number(&self) -> u8 {
        STAGE_NUMBER
    }

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut document: Value, ctx: &StageContext) -> Result<(Value, StageResult), InterpretError> {
        let mut issues = Vec::new();

        let candidates: Vec<(String, String)> = document::activities(&document)
            .iter()
            .flat_map(|a| {
                let id = a.get("id").and_then(Value::as_str).unwrap_or("").to_string();
                let name = a.get("name").and_then(Value::as_str).unwrap_or("");
                candidate_components(name).into_iter().map(move |c| (id.clone(), c))
            })
            .collect();

        if candidates.is_empty() {
            let metrics = json!({"candidatesConsidered": 0, "expanded": 0, "rejected": 0, "flaggedForReview": 0});
            return Ok((document, StageResult::from_issues(STAGE_NUMBER, STAGE_NAME, issues, metrics)));
        }

        let Some(chain) = &ctx.llm else {
            issues.push(StageIssue::warning(
                "no_llm_configured",
                format!("{} compound activity name(s) found but no LLM is configured to validate component splits; left unexpanded", candidates.len()),
            ));
            let metrics = json!({"candidatesConsidered": candidates.len(), "expanded": 0, "rejected": 0, "flaggedForReview": 0});
            return Ok((document, StageResult::from_issues(STAGE_NUMBER, STAGE_NAME, issues, metrics)));
        };

        let prompt = build_prompt(&candidates);
        let request = GenerateRequest::new(prompt, "placeholder");
        let classifications = match chain.generate(request).await {
            Ok(response) => parse_classifications(&response),
            Err(e) => {
                issues.push(StageIssue::warning("llm_call_failed", format!("component validation call failed: {e}")));
                HashMap::new()
            }
        };

        let mut expanded = 0u32;
        let mut rejected = 0u32;
        let mut flagged = 0u32;
        let mut new_children: Vec<Value> = Vec::new();

        for (idx, (parent_id, component)) in candidates.iter().enumerate() {
            let key = format!("{parent_id}::{component}");
            let classification = classifications.get(&key).cloned().unwrap_or_else(|| json!({"classification": "review", "confidence": 0.5}));
            let confidence = classification.get("confidence").and_then(Value::as_f64).unwrap_or(0.5);
            let verdict = classification.get("classification").and_then(Value::as_str).unwrap_or("review");

            let decision = ctx.confidence_bands.classify(confidence);
            let accept = verdict == "valid" && !matches!(decision, ConfidenceDecision::Reject);

            if verdict == "invalid" || matches!(decision, ConfidenceDecision::Reject) {
                rejected += 1;
                continue;
            }
            if !accept || matches!(decision, ConfidenceDecision::Review) {
                flagged += 1;
                issues.push(
                    StageIssue::warning("component_needs_review", format!("component '{component}' of activity {parent_id} needs human review (confidence {confidence:.2})"))
                        .with_path(format!("activities[{parent_id}]")),
                );
            } else {
                expanded += 1;
            }

            new_children.push(json!({
                "id": format!("{parent_id}-COMP-{idx}"),
                "name": component,
                "parentActivityId": parent_id,
                "_componentExpansion": {
                    "confidence": confidence,
                    "needsReview": !matches!(decision, ConfidenceDecision::AutoApply),
                },
            }));
        }

        let activities = document::activities_mut(&mut document);
        activities.extend(new_children);

        let metrics = json!({
            "candidatesConsidered": candidates.len(),
            "expanded": expanded,
            "rejected": rejected,
            "flaggedForReview": flagged,
        });

        Ok((document, StageResult::from_issues(STAGE_NUMBER, STAGE_NAME, issues, metrics)))
    }
}

fn build_prompt(candidates: &[(String, String)]) -> String {
    let list = candidates
        .iter()
        .map(|(parent, component)| format!("- parent {parent}: \"{component}\""))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "For each candidate activity sub-component below, classify whether it is a genuinely \
         distinct, separately schedulable activity (\"valid\"), not a real sub-component (\"invalid\"), \
         or ambiguous (\"review\"). Return a JSON array: \
         [{{\"parentActivityId\": \"...\", \"component\": \"...\", \"classification\": \"valid|invalid|review\", \"confidence\": 0.0-1.0}}].\n\n\
         CANDIDATES:\n{list}"
    )
}

fn parse_classifications(response: &str) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    let Ok(Value::Array(items)) = extract_json_array(response) else {
        return out;
    };
    for item in items {
        let parent = item.get("parentActivityId").and_then(Value::as_str).unwrap_or("").to_string();
        let component = item.get("component").and_then(Value::as_str).unwrap_or("").to_string();
        if parent.is_empty() || component.is_empty() {
            continue;
        }
        out.insert(format!("{parent}::{component}"), item);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_and_slash_and_comma() {
        assert_eq!(candidate_components("Height and Weight"), vec!["Height", "Weight"]);
        assert_eq!(candidate_components("Pulse/Blood Pressure"), vec!["Pulse", "Blood Pressure"]);
        assert!(candidate_components("Vital Signs").is_empty());
    }
}
