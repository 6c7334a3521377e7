//! Helpers for reading and mutating the shared interpretation document.
//!
//! Mirrors a pattern repeated throughout `stage1_domain_categorization.py`
//! and `usdm_combiner.py`: USDM payloads sometimes nest their content
//! under `studyVersion[0]` and sometimes keep it at the top level. Every
//! stage needs the same "find wherever `activities`/`encounters` actually
//! live" logic, so it is centralized here instead of repeated per stage.

use serde_json::{Map, Value};

/// Returns the object that owns `activities`/`encounters`/etc: either
/// `document["studyVersion"][0]` if that nesting is present, or
/// `document` itself.
pub fn container(document: &Value) -> &Value {
    if let Some(versions) = document.get("studyVersion").and_then(Value::as_array) {
        if let Some(first) = versions.first() {
            return first;
        }
    }
    document
}

pub fn container_mut(document: &mut Value) -> &mut Value {
    let has_study_version = document
        .get("studyVersion")
        .and_then(Value::as_array)
        .is_some_and(|v| !v.is_empty());

    if has_study_version {
        document["studyVersion"][0].as_object_mut();
        return &mut document["studyVersion"][0];
    }
    document
}

pub fn array<'a>(document: &'a Value, key: &str) -> &'a [Value] {
    container(document)
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn array_mut<'a>(document: &'a mut Value, key: &str) -> &'a mut Vec<Value> {
    let owner = container_mut(document);
    if !owner.get(key).is_some_and(Value::is_array) {
        if let Some(obj) = owner.as_object_mut() {
            obj.insert(key.to_string(), Value::Array(Vec::new()));
        }
    }
    owner
        .get_mut(key)
        .and_then(Value::as_array_mut)
        .expect("array key was just ensured present")
}

pub fn activities(document: &Value) -> &[Value] {
    array(document, "activities")
}

pub fn activities_mut(document: &mut Value) -> &mut Vec<Value> {
    array_mut(document, "activities")
}

pub fn encounters(document: &Value) -> &[Value] {
    array(document, "encounters")
}

pub fn encounters_mut(document: &mut Value) -> &mut Vec<Value> {
    array_mut(document, "encounters")
}

pub fn scheduled_instances_mut(document: &mut Value) -> &mut Vec<Value> {
    array_mut(document, "scheduledActivityInstances")
}

pub fn scheduled_instances(document: &Value) -> &[Value] {
    array(document, "scheduledActivityInstances")
}

/// A 6-field CDISC code object (spec §4.G stage 12): `{id, code, decode,
/// codeSystem, codeSystemVersion, instanceType}`.
#[must_use]
pub fn code_object(id: &str, code: &str, decode: &str, code_system: &str, code_system_version: &str) -> Value {
    let mut map = Map::new();
    map.insert("id".to_string(), Value::String(id.to_string()));
    map.insert("code".to_string(), Value::String(code.to_string()));
    map.insert("decode".to_string(), Value::String(decode.to_string()));
    map.insert("codeSystem".to_string(), Value::String(code_system.to_string()));
    map.insert(
        "codeSystemVersion".to_string(),
        Value::String(code_system_version.to_string()),
    );
    map.insert("instanceType".to_string(), Value::String("Code".to_string()));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_activities_nested_under_study_version() {
        let doc = json!({"studyVersion": [{"activities": [{"id": "ACT-1"}]}]});
        assert_eq!(activities(&doc).len(), 1);
    }

    #[test]
    fn reads_activities_at_top_level_when_no_study_version() {
        let doc = json!({"activities": [{"id": "ACT-1"}, {"id": "ACT-2"}]});
        assert_eq!(activities(&doc).len(), 2);
    }

    #[test]
    fn activities_mut_writes_back_into_study_version_nesting() {
        let mut doc = json!({"studyVersion": [{"activities": []}]});
        activities_mut(&mut doc).push(json!({"id": "ACT-1"}));
        assert_eq!(doc["studyVersion"][0]["activities"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn array_mut_creates_missing_key_at_top_level() {
        let mut doc = json!({});
        encounters_mut(&mut doc).push(json!({"id": "ENC-1"}));
        assert_eq!(doc["encounters"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn code_object_has_all_six_fields() {
        let code = code_object("CODE-1", "C78713", "Complete Blood Count", "NCIt", "23.0");
        assert_eq!(code["id"], "CODE-1");
        assert_eq!(code["instanceType"], "Code");
    }
}
