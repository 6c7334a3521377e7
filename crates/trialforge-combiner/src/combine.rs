//! Top-level assembly: turns N completed module results into one unified
//! protocol document. Ported from `usdm_combiner.py::USDMCombiner.combine`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use trialforge_provenance::apply_page_offset;
use trialforge_store::types::{ModuleResult, ModuleResultStatus};

use crate::agent_docs::{self, AgentDocumentationCatalog};
use crate::metadata::{build_extraction_metadata, ExtractionMetadata};
use crate::provenance_summary::{build_provenance_summary, ProvenanceSummary};
use crate::sections::{instance_type, section_key};
use crate::source_document::{build_source_document, SourceDocumentMeta};

const SCHEMA_VERSION: &str = "4.0.0";
const INSTANCE_TYPE: &str = "StudyDocument";

#[derive(Debug, Clone, Serialize)]
pub struct SectionEntry {
    pub module_id: String,
    pub instance_type: String,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnifiedDocument {
    #[serde(rename = "$schema")]
    pub schema: &'static str,
    pub schema_version: &'static str,
    pub instance_type: &'static str,
    pub id: String,
    pub name: String,
    pub source_document: SourceDocumentMeta,
    pub extraction_metadata: ExtractionMetadata,
    pub study: Option<Value>,
    pub domain_sections: std::collections::BTreeMap<String, SectionEntry>,
    pub provenance_summary: ProvenanceSummary,
    pub agent_documentation: Option<AgentDocumentationCatalog>,
}

pub struct CombineInput<'a> {
    pub module_results: &'a [ModuleResult],
    pub filename: &'a str,
    pub source_bytes: &'a [u8],
    pub page_texts: &'a [String],
    pub model_name: &'a str,
    pub include_agent_documentation: bool,
    pub now: DateTime<Utc>,
}

#[must_use]
pub fn combine(input: CombineInput<'_>) -> UnifiedDocument {
    let CombineInput {
        module_results,
        filename,
        source_bytes,
        page_texts,
        model_name,
        include_agent_documentation,
        now,
    } = input;

    let protocol_id = extract_protocol_id(module_results, filename);
    let page_offset = trialforge_provenance::detect_page_offset(page_texts);

    let source_document = build_source_document(filename, source_bytes, Some(page_texts.len() as u32), now);
    let extraction_metadata = build_extraction_metadata(module_results, model_name, page_offset, now);

    let mut study = None;
    let mut domain_sections = std::collections::BTreeMap::new();

    for result in module_results {
        if result.status != ModuleResultStatus::Completed {
            continue;
        }

        let mut data = result.extracted_data.clone();
        if let Some(offset) = page_offset {
            apply_page_offset(&mut data, offset);
        }

        if result.module_id == "study_metadata" {
            study = Some(normalize_study_metadata(&data));
            continue;
        }

        let section = section_key(&result.module_id);
        domain_sections.insert(
            section.to_string(),
            SectionEntry {
                module_id: result.module_id.clone(),
                instance_type: instance_type(&result.module_id).to_string(),
                data: clean_section_data(data),
            },
        );
    }

    let provenance_summary = {
        let mut sections_for_summary: Vec<(&str, &Value)> = domain_sections
            .iter()
            .map(|(key, entry)| (key.as_str(), &entry.data))
            .collect();
        if let Some(study) = &study {
            sections_for_summary.push(("studyMetadata", study));
        }
        build_provenance_summary(sections_for_summary)
    };

    let agent_documentation = if include_agent_documentation {
        let completed: Vec<&str> = module_results
            .iter()
            .filter(|r| r.status == ModuleResultStatus::Completed)
            .map(|r| r.module_id.as_str())
            .collect();
        Some(agent_docs::build_catalog(completed))
    } else {
        None
    };

    UnifiedDocument {
        schema: "https://json-schema.org/draft/2020-12/schema",
        schema_version: SCHEMA_VERSION,
        instance_type: INSTANCE_TYPE,
        id: format!("USDM-{protocol_id}-{}", now.format("%Y%m%d%H%M%S")),
        name: format!("Protocol Extraction: {protocol_id}"),
        source_document,
        extraction_metadata,
        study,
        domain_sections,
        provenance_summary,
        agent_documentation,
    }
}

fn extract_protocol_id(module_results: &[ModuleResult], fallback_id: &str) -> String {
    let Some(study) = module_results.iter().find(|r| r.module_id == "study_metadata") else {
        return fallback_id.to_string();
    };
    let Some(map) = study.extracted_data.as_object() else {
        return fallback_id.to_string();
    };

    for field in ["protocolId", "protocol_id", "id", "studyProtocolVersion"] {
        if let Some(value) = map.get(field) {
            if let Some(s) = value.as_str() {
                return s.to_string();
            }
            if let Some(nested) = value.get("value").and_then(Value::as_str) {
                return nested.to_string();
            }
        }
    }
    fallback_id.to_string()
}

fn normalize_study_metadata(data: &Value) -> Value {
    let mut normalized = Map::new();
    normalized.insert("instanceType".to_string(), Value::String("Study".to_string()));

    if let Some(map) = data.as_object() {
        for (key, value) in map {
            if key == "_metadata" || key == "schemaVersion" || key == "sourceDocument" {
                continue;
            }
            normalized.insert(key.clone(), value.clone());
        }
    }

    Value::Object(normalized)
}

/// Strip internal (`_`-prefixed) and redundant fields from a module's
/// extracted data before it is nested into a document section.
fn clean_section_data(data: Value) -> Value {
    match data {
        Value::Object(map) => {
            let mut cleaned = Map::new();
            for (key, value) in map {
                if key.starts_with('_') || key == "schemaVersion" || key == "sourceDocument" {
                    continue;
                }
                cleaned.insert(key, clean_section_data(value));
            }
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(clean_section_data).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn completed(module_id: &str, data: Value) -> ModuleResult {
        ModuleResult {
            job_id: "job-1".into(),
            module_id: module_id.into(),
            status: ModuleResultStatus::Completed,
            extracted_data: data,
            provenance_coverage: 1.0,
            quality_score: json!({"overall": 0.95}),
            pass1_duration_ms: 100,
            pass2_duration_ms: 200,
            retry_count: 0,
            from_cache: false,
            error_details: None,
        }
    }

    #[test]
    fn study_metadata_becomes_root_level_study_not_a_domain_section() {
        let results = vec![completed("study_metadata", json!({"protocolId": "P-123", "_internal": "drop me"}))];
        let now = Utc::now();
        let doc = combine(CombineInput {
            module_results: &results,
            filename: "protocol.pdf",
            source_bytes: b"pdf bytes",
            page_texts: &[],
            model_name: "claude-x",
            include_agent_documentation: false,
            now,
        });

        assert!(doc.study.is_some());
        assert!(!doc.domain_sections.contains_key("studyMetadata"));
        assert_eq!(doc.study.unwrap()["protocolId"], "P-123");
        assert!(doc.id.starts_with("USDM-P-123-"));
    }

    #[test]
    fn other_modules_become_named_domain_sections() {
        let results = vec![
            completed("study_metadata", json!({"protocolId": "P-1"})),
            completed("arms_design", json!({"arms": [], "_debug": "x"})),
        ];
        let doc = combine(CombineInput {
            module_results: &results,
            filename: "protocol.pdf",
            source_bytes: b"pdf bytes",
            page_texts: &[],
            model_name: "claude-x",
            include_agent_documentation: true,
            now: Utc::now(),
        });

        let section = &doc.domain_sections["studyDesign"];
        assert_eq!(section.instance_type, "StudyDesign");
        assert!(section.data.get("_debug").is_none());
        assert!(doc.agent_documentation.is_some());
    }

    #[test]
    fn failed_modules_are_excluded_from_the_document_but_not_forgotten() {
        let mut failed = completed("adverse_events", json!({}));
        failed.status = ModuleResultStatus::Failed;
        let results = vec![failed];

        let doc = combine(CombineInput {
            module_results: &results,
            filename: "protocol.pdf",
            source_bytes: b"x",
            page_texts: &[],
            model_name: "claude-x",
            include_agent_documentation: false,
            now: Utc::now(),
        });

        assert!(doc.domain_sections.is_empty());
        assert_eq!(doc.extraction_metadata.failed_agents, vec!["adverse_events".to_string()]);
    }
}
