//! Cross-section provenance summary, ported from
//! `usdm_combiner.py::_build_provenance_summary` /
//! `_collect_page_numbers`.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize)]
pub struct ProvenanceSummary {
    pub total_pages_referenced: usize,
    pub page_range: [i64; 2],
    pub section_page_counts: BTreeMap<String, usize>,
    pub page_to_sections: BTreeMap<String, Vec<String>>,
}

/// `section -> extracted data` pairs, already keyed by their document
/// section name (not module id).
#[must_use]
pub fn build_provenance_summary<'a>(sections: impl IntoIterator<Item = (&'a str, &'a Value)>) -> ProvenanceSummary {
    let mut section_pages: BTreeMap<String, BTreeSet<i64>> = BTreeMap::new();
    let mut page_references: BTreeMap<i64, BTreeSet<String>> = BTreeMap::new();

    for (section, data) in sections {
        let mut pages = BTreeSet::new();
        collect_page_numbers(data, &mut pages);
        for &page in &pages {
            page_references.entry(page).or_default().insert(section.to_string());
        }
        section_pages.insert(section.to_string(), pages);
    }

    let all_pages: BTreeSet<i64> = page_references.keys().copied().collect();
    let page_range = match (all_pages.iter().next(), all_pages.iter().next_back()) {
        (Some(&min), Some(&max)) => [min, max],
        _ => [0, 0],
    };

    ProvenanceSummary {
        total_pages_referenced: all_pages.len(),
        page_range,
        section_page_counts: section_pages.into_iter().map(|(k, v)| (k, v.len())).collect(),
        page_to_sections: page_references
            .into_iter()
            .map(|(page, sections)| (page.to_string(), sections.into_iter().collect()))
            .collect(),
    }
}

fn collect_page_numbers(data: &Value, pages: &mut BTreeSet<i64>) {
    match data {
        Value::Object(map) => {
            if let Some(page) = map.get("page_number").and_then(Value::as_i64) {
                pages.insert(page);
            }
            if let Some(provenance) = map.get("provenance") {
                if let Some(page) = provenance.get("page_number").and_then(Value::as_i64) {
                    pages.insert(page);
                }
                if let Some(page) = provenance.pointer("/explicit/page_number").and_then(Value::as_i64) {
                    pages.insert(page);
                }
            }
            for value in map.values() {
                collect_page_numbers(value, pages);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_page_numbers(item, pages);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_page_to_section_inverse_index() {
        let study = json!({"title": {"value": "X", "provenance": {"kind": "explicit", "page_number": 3, "text_snippet": "X is the title here"}}});
        let arms = json!({"arm": {"name": {"provenance": {"page_number": 3}}}});
        let summary = build_provenance_summary([("studyMetadata", &study), ("studyDesign", &arms)]);

        assert_eq!(summary.total_pages_referenced, 1);
        assert_eq!(summary.page_range, [3, 3]);
        assert_eq!(summary.page_to_sections["3"], vec!["studyDesign".to_string(), "studyMetadata".to_string()]);
    }

    #[test]
    fn empty_sections_produce_zero_range() {
        let summary = build_provenance_summary(std::iter::empty());
        assert_eq!(summary.total_pages_referenced, 0);
        assert_eq!(summary.page_range, [0, 0]);
    }
}
