//! Prompt template substitution, ported from the placeholder-replacement
//! logic inline in `two_phase_extractor.py::_execute_pass1` / `_execute_pass2`.

use serde_json::Value;

#[must_use]
pub fn render_pass1_prompt(template: &str, protocol_id: &str) -> String {
    template
        .replace("{protocol_id}", protocol_id)
        .replace("{{ protocol_id }}", protocol_id)
}

#[must_use]
pub fn render_pass2_prompt(template: &str, pass1_output: &Value) -> String {
    let pass1_json = serde_json::to_string_pretty(pass1_output).unwrap_or_default();
    template
        .replace("{{ pass1_output }}", &pass1_json)
        .replace("{{ extracted_data }}", &pass1_json)
        .replace("{{ extracted_values }}", &pass1_json)
        .replace("{pass1_output}", &pass1_json)
}

/// Fields carried forward from Pass 1 into Pass 2 output when the model
/// drops them (`id`, `instanceType`, and a handful of title-ish fields).
pub fn carry_forward_pass1_fields(result: &mut Value, pass1_output: &Value, protocol_id: &str, instance_type: &str) {
    let Some(map) = result.as_object_mut() else { return };
    let pass1_map = pass1_output.as_object();

    let id_missing = map.get("id").and_then(Value::as_str).unwrap_or("").is_empty();
    if id_missing {
        let id = pass1_map
            .and_then(|m| m.get("id"))
            .and_then(Value::as_str)
            .unwrap_or(protocol_id)
            .to_string();
        map.insert("id".to_string(), Value::String(id));
    }

    if !map.contains_key("instanceType") {
        let it = pass1_map
            .and_then(|m| m.get("instanceType"))
            .and_then(Value::as_str)
            .unwrap_or(instance_type)
            .to_string();
        map.insert("instanceType".to_string(), Value::String(it));
    }

    if let Some(pass1_map) = pass1_map {
        for field in ["name", "officialTitle", "version"] {
            if !map.contains_key(field) {
                if let Some(value) = pass1_map.get(field) {
                    map.insert(field.to_string(), value.clone());
                }
            }
        }
    }
}

/// Ensure `id`/`instanceType` are present on a Pass 1 result.
pub fn ensure_pass1_mandatory_fields(result: &mut Value, protocol_id: &str, instance_type: &str) {
    let Some(map) = result.as_object_mut() else { return };
    let id_missing = map.get("id").and_then(Value::as_str).unwrap_or("").is_empty();
    if id_missing {
        map.insert("id".to_string(), Value::String(protocol_id.to_string()));
    }
    if !map.contains_key("instanceType") {
        map.insert("instanceType".to_string(), Value::String(instance_type.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pass1_prompt_substitutes_both_placeholder_styles() {
        let rendered = render_pass1_prompt("id={protocol_id} id2={{ protocol_id }}", "P-1");
        assert_eq!(rendered, "id=P-1 id2=P-1");
    }

    #[test]
    fn pass2_prompt_substitutes_all_known_placeholders() {
        let pass1 = json!({"a": 1});
        let rendered = render_pass2_prompt("{{ pass1_output }}|{{ extracted_data }}|{pass1_output}", &pass1);
        assert!(rendered.contains("\"a\": 1"));
        assert_eq!(rendered.matches("\"a\": 1").count(), 3);
    }

    #[test]
    fn carry_forward_fills_missing_id_and_instance_type() {
        let mut result = json!({"name": "ignored"});
        let pass1 = json!({"id": "P-1", "instanceType": "StudyDesign", "officialTitle": "Title"});
        carry_forward_pass1_fields(&mut result, &pass1, "fallback", "Fallback");
        assert_eq!(result["id"], "P-1");
        assert_eq!(result["instanceType"], "StudyDesign");
        assert_eq!(result["name"], "ignored");
        assert_eq!(result["officialTitle"], "Title");
    }
}
