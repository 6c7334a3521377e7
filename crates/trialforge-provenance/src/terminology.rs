//! CDISC Controlled Terminology validation, ported from
//! `cdisc_validator.py::CDISCTerminologyValidator`. Curated codelists
//! (rather than a full NCI EVS download) cover the domains the extraction
//! modules actually populate; unrecognized domains are excluded from
//! scoring rather than penalized, matching the original's
//! `recognized_fields` accounting.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

/// (code, decode) pairs for a controlled terminology domain.
type Codelist = &'static [(&'static str, &'static str)];

static CODELISTS: Lazy<HashMap<&'static str, Codelist>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, Codelist> = HashMap::new();
    m.insert("study_phase", STUDY_PHASE);
    m.insert("trial_phase", STUDY_PHASE);
    m.insert("study_type", STUDY_TYPE);
    m.insert("trial_type", STUDY_TYPE);
    m.insert("sex", SEX);
    m.insert("blinding", BLINDING);
    m.insert("intervention_model", INTERVENTION_MODEL);
    m.insert("arm_types", ARM_TYPES);
    m.insert("route_of_administration", ROUTE_OF_ADMINISTRATION);
    m.insert("population_type", POPULATION_TYPE);
    m.insert("endpoint_level", ENDPOINT_LEVEL);
    m.insert("objective_level", ENDPOINT_LEVEL);
    m
});

const STUDY_PHASE: Codelist = &[
    ("C15600", "Phase I Trial"),
    ("C15601", "Phase II Trial"),
    ("C49686", "Phase III Trial"),
    ("C15603", "Phase IV Trial"),
];

const STUDY_TYPE: Codelist = &[
    ("C98388", "Interventional Study"),
    ("C16084", "Observational Study"),
    ("C142615", "Expanded Access Study"),
];

const SEX: Codelist = &[
    ("C16576", "Female"),
    ("C20197", "Male"),
    ("C115886", "Intersex"),
];

const BLINDING: Codelist = &[
    ("C15228", "Open Label Study"),
    ("C15229", "Single Blind Study"),
    ("C15228", "Double Blind Study"),
];

const INTERVENTION_MODEL: Codelist = &[
    ("C82639", "Parallel Study"),
    ("C82640", "Crossover Study"),
    ("C82641", "Factorial Study"),
];

const ARM_TYPES: Codelist = &[
    ("C174267", "Investigational Arm"),
    ("C174266", "Placebo Control Arm"),
    ("C174268", "Active Comparator Arm"),
];

const ROUTE_OF_ADMINISTRATION: Codelist = &[
    ("C38276", "Oral"),
    ("C38299", "Intravenous"),
    ("C38304", "Subcutaneous"),
];

const POPULATION_TYPE: Codelist = &[
    ("C98745", "Intent-To-Treat Population"),
    ("C98737", "Per-Protocol Population"),
    ("C89821", "Safety Population"),
];

const ENDPOINT_LEVEL: Codelist = &[
    ("C94496", "Primary"),
    ("C94500", "Secondary"),
    ("C96900", "Exploratory"),
];

static FIELD_TO_DOMAIN: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("studyPhase", "study_phase"),
        ("studyType", "study_type"),
        ("trialPhase", "trial_phase"),
        ("trialType", "trial_type"),
        ("blindingType", "blinding"),
        ("blinding", "blinding"),
        ("interventionModel", "intervention_model"),
        ("armType", "arm_types"),
        ("arm_type", "arm_types"),
        ("endpointLevel", "endpoint_level"),
        ("objectiveLevel", "objective_level"),
        ("populationType", "population_type"),
        ("analysisPopulation", "population_type"),
        ("sex", "sex"),
        ("route", "route_of_administration"),
        ("routeOfAdministration", "route_of_administration"),
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TerminologyIssue {
    pub path: String,
    pub issue: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ValidationStats {
    pub total_coded_fields: u64,
    pub recognized_fields: u64,
}

pub fn validate_code_decode_pair(code: &str, decode: &str, domain: &str) -> (bool, Option<String>) {
    let Some(codelist) = CODELISTS.get(domain) else {
        return (true, None);
    };
    match codelist.iter().find(|(_, d)| *d == decode) {
        Some((expected_code, _)) if *expected_code == code => (true, None),
        Some((expected_code, _)) => (
            false,
            Some(format!("code '{code}' does not match decode '{decode}' (expected '{expected_code}')")),
        ),
        None => (true, None),
    }
}

pub fn get_code_for_decode(decode: &str, domain: &str) -> Option<&'static str> {
    CODELISTS
        .get(domain)?
        .iter()
        .find(|(_, d)| *d == decode)
        .map(|(code, _)| *code)
}

pub fn infer_domain_from_path(path: &str) -> Option<&'static str> {
    let lower = path.to_lowercase();
    if lower.contains("studyphase") {
        return Some("study_phase");
    }
    if lower.contains("studytype") {
        return Some("study_type");
    }
    if lower.contains("sex") {
        return Some("sex");
    }
    if lower.contains("blinding") {
        return Some("blinding");
    }
    if lower.contains("armtype") || lower.contains(".arms[") {
        return Some("arm_types");
    }
    if lower.contains("route") {
        return Some("route_of_administration");
    }
    if lower.contains("population_type") || lower.contains("populationtype") {
        return Some("population_type");
    }
    if lower.contains(".level") {
        if lower.contains("objective") {
            return Some("objective_level");
        }
        if lower.contains("endpoint") {
            return Some("endpoint_level");
        }
    }
    None
}

/// Recursively find every `{code, decode}` pair reachable by a recognized
/// field name and validate it against its domain's codelist.
pub fn validate_extraction_data(data: &Value) -> Vec<TerminologyIssue> {
    let mut issues = Vec::new();
    traverse(data, "$", &mut issues, &mut ValidationStats::default());
    issues
}

pub fn get_validation_stats(data: &Value) -> ValidationStats {
    let mut stats = ValidationStats::default();
    let mut issues = Vec::new();
    traverse(data, "$", &mut issues, &mut stats);
    stats
}

fn traverse(obj: &Value, path: &str, issues: &mut Vec<TerminologyIssue>, stats: &mut ValidationStats) {
    match obj {
        Value::Object(map) => {
            if let (Some(Value::String(code)), Some(Value::String(decode))) =
                (map.get("code"), map.get("decode"))
            {
                stats.total_coded_fields += 1;
                let domain = FIELD_TO_DOMAIN
                    .iter()
                    .find(|(field, _)| path.to_lowercase().contains(&field.to_lowercase()))
                    .map(|(_, domain)| *domain)
                    .or_else(|| infer_domain_from_path(path));

                if let Some(domain) = domain {
                    if CODELISTS.contains_key(domain) {
                        stats.recognized_fields += 1;
                        let (is_valid, error) = validate_code_decode_pair(code, decode, domain);
                        if !is_valid {
                            issues.push(TerminologyIssue {
                                path: path.to_string(),
                                issue: "code_decode_mismatch".to_string(),
                                error: error.unwrap_or_default(),
                            });
                        }
                    }
                }
            }

            for (key, value) in map {
                if value.is_object() || value.is_array() {
                    traverse(value, &format!("{path}.{key}"), issues, stats);
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                traverse(item, &format!("{path}[{i}]"), issues, stats);
            }
        }
        _ => {}
    }
}
