//! Provenance page-number correction, ported from
//! `usdm_combiner.py::_apply_page_offset_to_provenance`. The LLM reports the
//! printed page number from the document footer; this adds the detected
//! offset (see [`crate::page_offset`]) to convert to the physical PDF page
//! index stored downstream.

use serde_json::Value;

/// Add `offset` to every `page_number` reachable through a `provenance`
/// object (dual-mode explicit, legacy, or `<field>Provenance` sibling),
/// mutating `data` in place. A no-op offset of `0` still walks the tree so
/// callers don't need to special-case it.
pub fn apply_page_offset(data: &mut Value, offset: i64) {
    if offset == 0 {
        return;
    }
    walk(data, offset);
}

fn walk(value: &mut Value, offset: i64) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key == "provenance" {
                    shift_provenance(child, offset);
                } else if key.ends_with("Provenance") {
                    shift_explicit_in_place(child, offset);
                }
            }
            for (key, child) in map.iter_mut() {
                if key != "provenance" && !key.ends_with("Provenance") {
                    walk(child, offset);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, offset);
            }
        }
        _ => {}
    }
}

fn shift_provenance(provenance: &mut Value, offset: i64) {
    match provenance.get("kind").and_then(Value::as_str) {
        Some("explicit") => {
            if let Some(explicit) = provenance.get_mut("explicit") {
                shift_explicit_in_place(explicit, offset);
            }
        }
        Some("derived") => {}
        _ => shift_explicit_in_place(provenance, offset),
    }
}

fn shift_explicit_in_place(explicit: &mut Value, offset: i64) {
    if let Some(page) = explicit.get("page_number").and_then(Value::as_i64) {
        explicit["page_number"] = Value::from(page + offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shifts_nested_explicit_page_number() {
        let mut data = json!({
            "studyTitle": "X",
            "provenance": {"kind": "explicit", "explicit": {"page_number": 5, "text_snippet": "study title is X"}}
        });
        apply_page_offset(&mut data, 3);
        assert_eq!(data["provenance"]["explicit"]["page_number"], 8);
    }

    #[test]
    fn shifts_sibling_provenance_pattern() {
        let mut data = json!({
            "therapeuticArea": "Oncology",
            "therapeuticAreaProvenance": {"page_number": 2, "text_snippet": "Therapeutic Area: Oncology"}
        });
        apply_page_offset(&mut data, 4);
        assert_eq!(data["therapeuticAreaProvenance"]["page_number"], 6);
    }

    #[test]
    fn leaves_derived_provenance_untouched() {
        let mut data = json!({
            "provenance": {"kind": "derived", "derived": {"reasoning": "x".repeat(60), "confidence": "high"}}
        });
        let before = data.clone();
        apply_page_offset(&mut data, 5);
        assert_eq!(data, before);
    }

    #[test]
    fn zero_offset_is_a_no_op() {
        let mut data = json!({"provenance": {"page_number": 5, "text_snippet": "abc defghij"}});
        let before = data.clone();
        apply_page_offset(&mut data, 0);
        assert_eq!(data, before);
    }
}
