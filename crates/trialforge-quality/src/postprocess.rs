//! Post-processing auto-correction pipeline, ported from
//! `quality_checker.py::QualityChecker.post_process`. Runs a fixed sequence
//! of idempotent mutations on raw extraction output before it's scored,
//! fixing the common, mechanical ways an LLM's JSON drifts from the
//! schema.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;

use trialforge_provenance::terminology;

const MAX_SNIPPET_LENGTH: usize = 500;
const CDISC_CODE_SYSTEM: &str = "http://ncicb.nci.nih.gov/xml/owl/EVS/Thesaurus.owl";
const CDISC_CODE_SYSTEM_VERSION: &str = "24.03e";

static LOWERCASE_ENUM_FIELDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "approval_status",
        "consent_type",
        "monitoring_approach",
        "blinding_requirements",
        "distribution_model",
        "destruction_method",
        "accountability_method",
        "kit_design",
        "format",
        "visit_type",
        "collection_frequency",
        "storage_phase",
    ]
});

static ENUM_MAPPINGS: Lazy<HashMap<&'static str, HashMap<&'static str, &'static str>>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "device_type",
        [
            ("provisioned_device", "provisioned_tablet"),
            ("handheld", "provisioned_tablet"),
            ("tablet", "provisioned_tablet"),
            ("BYOD", "patient_smartphone"),
            ("byod", "patient_smartphone"),
        ]
        .into_iter()
        .collect(),
    );
    m.insert(
        "vendor_type",
        [
            ("Logistics", "logistics"),
            ("Safety", "safety"),
            ("Regulatory", "regulatory"),
            ("Drug_supply", "drug_supply"),
        ]
        .into_iter()
        .collect(),
    );
    m.insert(
        "service_type",
        [("biobanking", "biorepository"), ("Biobanking", "biorepository")]
            .into_iter()
            .collect(),
    );
    m.insert(
        "source",
        [("sponsor_supplied", "sponsor_provided"), ("Sponsor_supplied", "sponsor_provided")]
            .into_iter()
            .collect(),
    );
    m.insert(
        "scopeId",
        [
            ("sponsor_protocol_id", "sponsor"),
            ("Sponsor_protocol_id", "sponsor"),
            ("SPONSOR", "sponsor"),
        ]
        .into_iter()
        .collect(),
    );
    m
});

static ARRAY_FIELDS: &[&str] = &["responsibilities"];

static ID_GENERATORS: Lazy<HashMap<&'static str, (&'static str, &'static str)>> = Lazy::new(|| {
    [
        ("discovered_specimen_types", ("specimen_id", "SPEC")),
        ("processing_requirements", ("processing_id", "PROC")),
        ("collection_containers", ("container_id", "TUBE")),
        ("storage_requirements", ("storage_id", "STOR")),
        ("shipping_requirements", ("shipping_id", "SHIP")),
        ("collection_schedule", ("schedule_id", "COL")),
        ("other_personnel", ("id", "PERS")),
    ]
    .into_iter()
    .collect()
});

/// Run the full auto-correction sequence. Every step is idempotent: running
/// `post_process` twice on its own output is a no-op.
pub fn post_process(data: &Value) -> Value {
    let mut data = data.clone();
    truncate_snippets(&mut data);
    auto_correct_terminology(&mut data, "$");
    normalize_enum_case(&mut data);
    map_enum_values(&mut data);
    remove_disallowed_properties(&mut data);
    convert_string_to_array(&mut data);
    auto_generate_missing_ids(&mut data);
    data
}

fn truncate_snippets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(snippet)) = map.get("text_snippet").cloned() {
                if snippet.chars().count() > MAX_SNIPPET_LENGTH {
                    map.insert("text_snippet".to_string(), Value::String(truncate_snippet(&snippet)));
                }
            }
            for (key, child) in map.iter_mut() {
                if key != "text_snippet" {
                    truncate_snippets(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(truncate_snippets),
        _ => {}
    }
}

fn truncate_snippet(value: &str) -> String {
    let truncated: String = value.chars().take(MAX_SNIPPET_LENGTH).collect();
    let last_period = truncated.rfind(". ");
    let last_newline = truncated.rfind('\n');
    let break_point = last_period.max(last_newline);

    if let Some(bp) = break_point {
        if bp as f64 > MAX_SNIPPET_LENGTH as f64 * 0.6 {
            return truncated[..=bp].trim().to_string();
        }
    }
    if let Some(last_space) = truncated.rfind(' ') {
        if last_space as f64 > MAX_SNIPPET_LENGTH as f64 * 0.8 {
            return truncated[..last_space].trim().to_string();
        }
    }
    truncated.trim().to_string()
}

fn auto_correct_terminology(value: &mut Value, path: &str) {
    if let Value::Object(map) = value {
        let (code, decode) = (
            map.get("code").and_then(Value::as_str).map(str::to_string),
            map.get("decode").and_then(Value::as_str).map(str::to_string),
        );

        if let (Some(code), Some(decode)) = (code, decode) {
            if !code.is_empty() && !decode.is_empty() {
                if let Some(domain) = terminology::infer_domain_from_path(path) {
                    let (is_valid, _) = terminology::validate_code_decode_pair(&code, &decode, domain);
                    if !is_valid {
                        if let Some(correct_code) = terminology::get_code_for_decode(&decode, domain) {
                            if correct_code != code {
                                map.insert("code".to_string(), Value::String(correct_code.to_string()));
                            }
                        }
                    }
                }
            }

            map.entry("codeSystem".to_string())
                .and_modify(|v| {
                    if v.as_str().map(str::is_empty).unwrap_or(true) {
                        *v = Value::String(CDISC_CODE_SYSTEM.to_string());
                    }
                })
                .or_insert_with(|| Value::String(CDISC_CODE_SYSTEM.to_string()));

            map.entry("codeSystemVersion".to_string())
                .and_modify(|v| {
                    if v.as_str().map(str::is_empty).unwrap_or(true) {
                        *v = Value::String(CDISC_CODE_SYSTEM_VERSION.to_string());
                    }
                })
                .or_insert_with(|| Value::String(CDISC_CODE_SYSTEM_VERSION.to_string()));
        }

        let keys: Vec<String> = map.keys().cloned().collect();
        for key in keys {
            if let Some(child) = map.get_mut(&key) {
                if child.is_object() || child.is_array() {
                    auto_correct_terminology(child, &format!("{path}.{key}"));
                }
            }
        }
    } else if let Value::Array(items) = value {
        for (i, item) in items.iter_mut().enumerate() {
            if item.is_object() || item.is_array() {
                auto_correct_terminology(item, &format!("{path}[{i}]"));
            }
        }
    }
}

fn normalize_enum_case(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if LOWERCASE_ENUM_FIELDS.contains(&key.as_str()) {
                    if let Value::String(s) = child {
                        let lowered = s.to_lowercase();
                        if lowered != *s {
                            *s = lowered;
                        }
                    }
                } else {
                    normalize_enum_case(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_enum_case),
        _ => {}
    }
}

fn map_enum_values(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if let Some(mapping) = ENUM_MAPPINGS.get(key.as_str()) {
                    if let Value::String(s) = child {
                        if let Some(mapped) = mapping.get(s.as_str()) {
                            *s = (*mapped).to_string();
                        }
                    }
                } else {
                    map_enum_values(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(map_enum_values),
        _ => {}
    }
}

fn remove_disallowed_properties(value: &mut Value) {
    if let Value::Object(map) = value {
        if let Some(Value::Object(study_pop)) = map.get_mut("studyPopulation") {
            if let Some(Value::Object(sex_obj)) = study_pop.get_mut("sex") {
                if let Some(Value::Array(allowed)) = sex_obj.get_mut("allowed") {
                    for sex_code in allowed.iter_mut() {
                        if let Value::Object(code_map) = sex_code {
                            for prop in ["codeSystem", "codeSystemVersion", "instanceType"] {
                                code_map.remove(prop);
                            }
                        }
                    }
                }
            }
        }

        let keys: Vec<String> = map.keys().cloned().collect();
        for key in keys {
            if let Some(child) = map.get_mut(&key) {
                if child.is_object() || child.is_array() {
                    remove_disallowed_properties(child);
                }
            }
        }
    } else if let Value::Array(items) = value {
        items.iter_mut().for_each(remove_disallowed_properties);
    }
}

fn convert_string_to_array(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let keys: Vec<String> = map.keys().cloned().collect();
            for key in keys {
                let Some(child) = map.get(&key) else { continue };
                if ARRAY_FIELDS.contains(&key.as_str()) {
                    if let Value::String(s) = child {
                        let wrapped = Value::Array(vec![Value::String(s.clone())]);
                        map.insert(key.clone(), wrapped);
                        continue;
                    }
                }
                if let Some(child) = map.get_mut(&key) {
                    convert_string_to_array(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(convert_string_to_array),
        _ => {}
    }
}

fn auto_generate_missing_ids(value: &mut Value) {
    if let Value::Object(map) = value {
        let keys: Vec<String> = map.keys().cloned().collect();
        for key in keys {
            if let Some((id_field, prefix)) = ID_GENERATORS.get(key.as_str()) {
                if let Some(Value::Array(items)) = map.get_mut(&key) {
                    for (i, item) in items.iter_mut().enumerate() {
                        if let Value::Object(item_map) = item {
                            let missing = match item_map.get(*id_field) {
                                None => true,
                                Some(Value::String(s)) => s.is_empty(),
                                Some(Value::Null) => true,
                                _ => false,
                            };
                            if missing {
                                item_map.insert(
                                    (*id_field).to_string(),
                                    Value::String(format!("{prefix}-{:03}", i + 1)),
                                );
                            }
                        }
                    }
                }
            }
            if let Some(child) = map.get_mut(&key) {
                if child.is_object() || child.is_array() {
                    auto_generate_missing_ids(child);
                }
            }
        }
    } else if let Value::Array(items) = value {
        items.iter_mut().for_each(auto_generate_missing_ids);
    }
}

#[allow(dead_code)]
fn empty_object() -> Value {
    Value::Object(Map::new())
}
