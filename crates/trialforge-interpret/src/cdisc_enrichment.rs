//! Multi-tier CDISC code enrichment (spec §4.G stage 1's "domain code
//! enricher"), grounded on `cdisc_code_enricher.py::CDISCCodeEnricher`:
//! (1) curated activity-name map, (2) concept-name search, (3) batched LLM
//! inference for whatever remains. The original loads two large on-disk
//! config files (`activity_domain_map.json`, `cdisc_concepts.json`); this
//! keeps a small embedded curated table covering the codes its own LLM
//! prompt cites as "common" reference codes, since the full config files
//! were not part of the retrieved source tree.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value;
use trialforge_llm::{FallbackChain, GenerateRequest};

use crate::json_extract::extract_json_array;

#[derive(Debug, Clone, Copy)]
pub struct CuratedCode {
    pub code: &'static str,
    pub decode: &'static str,
}

/// Curated activity-name → code table (tier 1), seeded from the reference
/// list `cdisc_code_enricher.py`'s own LLM prompt cites as "common CDISC
/// codes".
static CURATED_BY_NAME: Lazy<HashMap<&'static str, CuratedCode>> = Lazy::new(|| {
    HashMap::from([
        ("complete blood count", CuratedCode { code: "C78713", decode: "Complete Blood Count" }),
        ("cbc", CuratedCode { code: "C78713", decode: "Complete Blood Count" }),
        ("serum chemistry", CuratedCode { code: "C62637", decode: "Serum Chemistry" }),
        ("chemistry panel", CuratedCode { code: "C62637", decode: "Serum Chemistry" }),
        ("vital signs", CuratedCode { code: "C54706", decode: "Vital Signs" }),
        ("electrocardiogram", CuratedCode { code: "C83167", decode: "Electrocardiogram" }),
        ("ecg", CuratedCode { code: "C83167", decode: "Electrocardiogram" }),
        ("physical examination", CuratedCode { code: "C62596", decode: "Physical Examination" }),
        ("questionnaire", CuratedCode { code: "C62737", decode: "Questionnaire" }),
        ("computed tomography", CuratedCode { code: "C38101", decode: "Computed Tomography" }),
        ("ct scan", CuratedCode { code: "C38101", decode: "Computed Tomography" }),
        ("magnetic resonance imaging", CuratedCode { code: "C40678", decode: "Magnetic Resonance Imaging" }),
        ("mri", CuratedCode { code: "C40678", decode: "Magnetic Resonance Imaging" }),
        ("adverse event", CuratedCode { code: "C41331", decode: "Adverse Event" }),
        ("exposure", CuratedCode { code: "C62597", decode: "Exposure" }),
        ("drug administration", CuratedCode { code: "C62597", decode: "Exposure" }),
        ("biospecimen collection", CuratedCode { code: "C63505", decode: "Biospecimen Collection" }),
        ("informed consent", CuratedCode { code: "C16735", decode: "Informed Consent" }),
        ("medical history", CuratedCode { code: "C62599", decode: "Medical History" }),
        ("survival", CuratedCode { code: "C25717", decode: "Survival" }),
        ("pharmacokinetics", CuratedCode { code: "C62735", decode: "Pharmacokinetics" }),
        ("ecog performance status", CuratedCode { code: "C105721", decode: "ECOG Performance Status" }),
        ("pregnancy test", CuratedCode { code: "C71563", decode: "Pregnancy Test" }),
        ("urinalysis", CuratedCode { code: "C62736", decode: "Urinalysis" }),
        ("tumor assessment", CuratedCode { code: "C94531", decode: "Tumor Assessment" }),
    ])
});

/// Domain-level fallback code (tier 1's last resort), mirroring
/// `_get_domain_name`/`_domain_codes` in the Python enricher.
static DOMAIN_FALLBACK: Lazy<HashMap<&'static str, CuratedCode>> = Lazy::new(|| {
    HashMap::from([
        ("LB", CuratedCode { code: "C62637", decode: "Laboratory Test" }),
        ("VS", CuratedCode { code: "C54706", decode: "Vital Signs" }),
        ("EG", CuratedCode { code: "C83167", decode: "Electrocardiogram" }),
        ("PE", CuratedCode { code: "C62596", decode: "Physical Examination" }),
        ("QS", CuratedCode { code: "C62737", decode: "Questionnaire" }),
        ("MI", CuratedCode { code: "C38101", decode: "Medical Imaging" }),
        ("CM", CuratedCode { code: "C62602", decode: "Concomitant Medication" }),
        ("AE", CuratedCode { code: "C41331", decode: "Adverse Event" }),
        ("EX", CuratedCode { code: "C62597", decode: "Exposure" }),
        ("BS", CuratedCode { code: "C63505", decode: "Biospecimen Collection" }),
        ("DM", CuratedCode { code: "C49677", decode: "Demographics" }),
        ("MH", CuratedCode { code: "C62599", decode: "Medical History" }),
        ("DS", CuratedCode { code: "C49648", decode: "Disposition" }),
        ("PR", CuratedCode { code: "C60819", decode: "Procedure" }),
        ("TU", CuratedCode { code: "C94531", decode: "Tumor Assessment" }),
        ("PC", CuratedCode { code: "C62735", decode: "Pharmacokinetics" }),
    ])
});

fn normalize(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EnrichmentStats {
    pub curated_matches: usize,
    pub domain_fallback_matches: usize,
    pub llm_matches: usize,
    pub total: usize,
}

fn lookup_curated(activity_name: &str, domain: &str) -> Option<(CuratedCode, &'static str)> {
    let normalized = normalize(activity_name);

    if let Some(code) = CURATED_BY_NAME.get(normalized.as_str()) {
        return Some((*code, "exact"));
    }
    for (name, code) in CURATED_BY_NAME.iter() {
        if normalized.contains(name) || name.contains(normalized.as_str()) {
            return Some((*code, "fuzzy"));
        }
    }
    DOMAIN_FALLBACK.get(domain).map(|code| (*code, "domain_fallback"))
}

/// Enrich a batch of domain mappings (each a JSON object with
/// `activityId`/`activityName`/`cdashDomain`, optionally already carrying
/// `cdiscCode`/`cdiscDecode`) in place, mirroring
/// `CDISCCodeEnricher.enrich_batch`.
pub async fn enrich_batch(mappings: &mut [Value], llm: Option<&Arc<FallbackChain>>) -> EnrichmentStats {
    let mut stats = EnrichmentStats {
        total: mappings.len(),
        ..Default::default()
    };

    let mut needs_llm: Vec<usize> = Vec::new();

    for (idx, mapping) in mappings.iter_mut().enumerate() {
        if mapping.get("cdiscCode").and_then(Value::as_str).is_some() {
            continue;
        }
        let name = mapping.get("activityName").and_then(Value::as_str).unwrap_or("").to_string();
        let domain = mapping.get("cdashDomain").and_then(Value::as_str).unwrap_or("").to_string();

        match lookup_curated(&name, &domain) {
            Some((code, match_type)) => {
                mapping["cdiscCode"] = Value::String(code.code.to_string());
                mapping["cdiscDecode"] = Value::String(code.decode.to_string());
                mapping["_codeMetadata"] = serde_json::json!({"matchType": match_type, "matchScore": match_type_score(match_type)});
                if match_type == "domain_fallback" {
                    stats.domain_fallback_matches += 1;
                } else {
                    stats.curated_matches += 1;
                }
            }
            None => needs_llm.push(idx),
        }
    }

    if let Some(chain) = llm {
        if !needs_llm.is_empty() {
            let batch: Vec<(String, String, String)> = needs_llm
                .iter()
                .map(|&idx| {
                    let m = &mappings[idx];
                    (
                        m.get("activityId").and_then(Value::as_str).unwrap_or("").to_string(),
                        m.get("activityName").and_then(Value::as_str).unwrap_or("").to_string(),
                        m.get("cdashDomain").and_then(Value::as_str).unwrap_or("").to_string(),
                    )
                })
                .collect();

            if let Ok(inferred) = infer_with_llm(chain, &batch).await {
                for idx in needs_llm {
                    let activity_id = mappings[idx].get("activityId").and_then(Value::as_str).unwrap_or("").to_string();
                    if let Some((code, decode)) = inferred.get(&activity_id) {
                        mappings[idx]["cdiscCode"] = Value::String(code.clone());
                        mappings[idx]["cdiscDecode"] = Value::String(decode.clone());
                        mappings[idx]["_codeMetadata"] = serde_json::json!({"matchType": "llm_inferred", "matchScore": 0.80});
                        stats.llm_matches += 1;
                    }
                }
            }
        }
    }

    stats
}

fn match_type_score(match_type: &str) -> f64 {
    match match_type {
        "exact" => 1.0,
        "fuzzy" => 0.85,
        "domain_fallback" => 0.70,
        _ => 0.5,
    }
}

/// Tier 3: one batched LLM call for everything curated lookup missed
/// (spec §4.G "Batching is mandatory ... single-item LLM calls are
/// forbidden inside loops").
async fn infer_with_llm(
    chain: &Arc<FallbackChain>,
    activities: &[(String, String, String)],
) -> Result<HashMap<String, (String, String)>, String> {
    if activities.is_empty() {
        return Ok(HashMap::new());
    }

    let activities_list = activities
        .iter()
        .map(|(id, name, domain)| format!("- {id}: \"{name}\" (domain: {domain})"))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "You are a CDISC terminology expert. For each clinical trial activity below, provide the most appropriate NCI Thesaurus code.\n\nACTIVITIES:\n{activities_list}\n\nReturn a JSON array of objects: [{{\"activityId\": \"...\", \"code\": \"Cxxxxx\", \"decode\": \"...\"}}]"
    );

    let request = GenerateRequest::new(prompt, "placeholder");
    let response = chain.generate(request).await.map_err(|e| e.to_string())?;
    let parsed = extract_json_array(&response)?;

    let mut results = HashMap::new();
    if let Value::Array(items) = parsed {
        for item in items {
            let id = item.get("activityId").and_then(Value::as_str).map(str::to_string);
            let code = item.get("code").and_then(Value::as_str).map(str::to_string);
            let decode = item.get("decode").and_then(Value::as_str).map(str::to_string).unwrap_or_else(|| "Unknown".to_string());
            if let (Some(id), Some(code)) = (id, code) {
                results.insert(id, (code, decode));
            }
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn curated_lookup_matches_by_normalized_name() {
        let mut mappings = vec![json!({"activityId": "ACT-1", "activityName": "Complete Blood Count", "cdashDomain": "LB"})];
        let stats = enrich_batch(&mut mappings, None).await;
        assert_eq!(stats.curated_matches, 1);
        assert_eq!(mappings[0]["cdiscCode"], "C78713");
    }

    #[tokio::test]
    async fn falls_back_to_domain_code_when_no_curated_match() {
        let mut mappings = vec![json!({"activityId": "ACT-2", "activityName": "Some novel assay", "cdashDomain": "LB"})];
        let stats = enrich_batch(&mut mappings, None).await;
        assert_eq!(stats.domain_fallback_matches, 1);
        assert_eq!(mappings[0]["cdiscCode"], "C62637");
    }

    #[tokio::test]
    async fn already_coded_mappings_are_left_untouched() {
        let mut mappings = vec![json!({"activityId": "ACT-3", "activityName": "X", "cdashDomain": "PR", "cdiscCode": "C00000"})];
        let stats = enrich_batch(&mut mappings, None).await;
        assert_eq!(stats.curated_matches, 0);
        assert_eq!(stats.domain_fallback_matches, 0);
        assert_eq!(mappings[0]["cdiscCode"], "C00000");
    }
}
