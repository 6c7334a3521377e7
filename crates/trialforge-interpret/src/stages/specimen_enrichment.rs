//! Stage 5: Specimen enrichment (spec §4.G stage 5): "attach tube/volume/
//! purpose metadata to specimen-domain activities; uses a confidence-
//! thresholded decision ... and a pattern registry for validation." No
//! Python source was retrieved for this stage; built from spec prose.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use trialforge_config::ConfidenceDecision;

use crate::document;
use crate::error::InterpretError;
use crate::stage::{Stage, StageContext, StageIssue, StageResult};

const STAGE_NUMBER: u8 = 5;
const STAGE_NAME: &str = "Specimen Enrichment";

struct SpecimenPattern {
    keyword: &'static str,
    tube: &'static str,
    volume_ml: f64,
    purpose: &'static str,
}

static REGISTRY: Lazy<Vec<SpecimenPattern>> = Lazy::new(|| {
    vec![
        SpecimenPattern { keyword: "blood", tube: "EDTA (lavender top)", volume_ml: 4.0, purpose: "hematology" },
        SpecimenPattern { keyword: "serum", tube: "SST (gold top)", volume_ml: 5.0, purpose: "chemistry" },
        SpecimenPattern { keyword: "plasma", tube: "sodium heparin (green top)", volume_ml: 4.0, purpose: "pharmacokinetics" },
        SpecimenPattern { keyword: "urine", tube: "sterile urine cup", volume_ml: 50.0, purpose: "urinalysis" },
        SpecimenPattern { keyword: "pk sample", tube: "sodium heparin (green top)", volume_ml: 4.0, purpose: "pharmacokinetics" },
        SpecimenPattern { keyword: "biopsy", tube: "formalin-fixed container", volume_ml: 0.0, purpose: "histopathology" },
        SpecimenPattern { keyword: "csf", tube: "polypropylene tube", volume_ml: 2.0, purpose: "cerebrospinal fluid analysis" },
        SpecimenPattern { keyword: "saliva", tube: "saliva collection device", volume_ml: 2.0, purpose: "genomic analysis" },
    ]
});

fn find_match(name: &str) -> Option<(&'static SpecimenPattern, f64)> {
    let normalized = name.to_lowercase();
    REGISTRY.iter().find_map(|pattern| {
        if normalized == pattern.keyword {
            Some((pattern, 0.95))
        } else if normalized.contains(pattern.keyword) {
            Some((pattern, 0.78))
        } else {
            None
        }
    })
}

pub struct SpecimenEnrichmentStage;

#[async_trait]
impl Stage for SpecimenEnrichmentStage {
    fn number(&self) -> u8 {
        STAGE_NUMBER
    }

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut document: Value, ctx: &StageContext) -> Result<(Value, StageResult), InterpretError> {
        let mut issues = Vec::new();
        let mut enriched = 0u32;
        let mut flagged = 0u32;
        let mut rejected = 0u32;

        for activity in document::activities_mut(&mut document) {
            let domain = activity.get("cdashDomain").and_then(Value::as_str).unwrap_or("");
            if domain != "BS" {
                continue;
            }
            let Some(name) = activity.get("name").and_then(Value::as_str).map(str::to_string) else { continue };
            let Some((pattern, confidence)) = find_match(&name) else { continue };
            let Some(activity_id) = activity.get("id").and_then(Value::as_str).map(str::to_string) else { continue };

            match ctx.confidence_bands.classify(confidence) {
                ConfidenceDecision::Reject => {
                    rejected += 1;
                    issues.push(
                        StageIssue::warning("specimen_pattern_low_confidence", format!("specimen pattern match for {activity_id} below reject threshold ({confidence:.2})"))
                            .with_path(format!("activities[{activity_id}]")),
                    );
                    continue;
                }
                ConfidenceDecision::Review => {
                    flagged += 1;
                    issues.push(
                        StageIssue::warning("specimen_enrichment_needs_review", format!("specimen metadata for {activity_id} needs review (confidence {confidence:.2})"))
                            .with_path(format!("activities[{activity_id}]")),
                    );
                }
                ConfidenceDecision::AutoApply => enriched += 1,
            }

            activity["specimen"] = json!({
                "tube": pattern.tube,
                "volumeMl": pattern.volume_ml,
                "purpose": pattern.purpose,
                "_confidence": confidence,
            });
        }

        let metrics = json!({"enriched": enriched, "flaggedForReview": flagged, "rejected": rejected});
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
    async fn exact_keyword_match_auto_applies() {
        let doc = json!({"activities": [{"id": "ACT-1", "name": "blood", "cdashDomain": "BS"}]});
        let (doc, result) = SpecimenEnrichmentStage.run(doc, &ctx()).await.unwrap();
        assert_eq!(doc["activities"][0]["specimen"]["tube"], "EDTA (lavender top)");
        assert_eq!(result.metrics["enriched"], 1);
    }

    #[tokio::test]
    async fn fuzzy_match_is_flagged_for_review() {
        let doc = json!({"activities": [{"id": "ACT-1", "name": "Serial PK Sample Draw", "cdashDomain": "BS"}]});
        let (doc, result) = SpecimenEnrichmentStage.run(doc, &ctx()).await.unwrap();
        assert!(doc["activities"][0]["specimen"].is_object());
        assert_eq!(result.metrics["flaggedForReview"], 1);
    }

    #[tokio::test]
    async fn non_biospecimen_activities_are_skipped() {
        let doc = json!({"activities": [{"id": "ACT-1", "name": "blood", "cdashDomain": "LB"}]});
        let (doc, _) = SpecimenEnrichmentStage.run(doc, &ctx()).await.unwrap();
        assert!(doc["activities"][0].get("specimen").is_none());
    }
}
