//! Eligibility criteria section detection, the `detecting_sections` state
//! (spec §4.F): one LLM call over the uploaded protocol asking it to list
//! every Inclusion/Exclusion Criteria item, the same remote-file request
//! shape `trialforge_soa::page_detector` uses for SOA page detection —
//! there is no local text layer to scan a protocol's Inclusion/Exclusion
//! Criteria section with heuristics alone, so detection is model-driven
//! and only the downstream classification/ordering (`funnel`) is
//! deterministic.

use trialforge_llm::{GenerateRequest, LlmBackend, RemoteFileHandle, ResponseFormat};
use trialforge_store::CriterionSection;

use crate::error::EligibilityError;
use crate::llm_json::parse_json_response;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedCriterion {
    pub criterion_id: String,
    pub section: CriterionSection,
    pub text: String,
}

const DETECT_PROMPT: &str = r#"You are scanning a clinical trial protocol PDF for its eligibility
criteria: the Inclusion Criteria and Exclusion Criteria lists that
define which patients may enroll.

Return a JSON array, one entry per criterion, in the order they appear:
[{"section": "inclusion", "text": "Age 18 years or older at screening"}, ...]

"section" must be exactly "inclusion" or "exclusion". Return only the
JSON array, nothing else. If no such sections exist, return [].
"#;

pub struct SectionDetector<'a> {
    pub backend: &'a dyn LlmBackend,
    pub model: String,
}

impl<'a> SectionDetector<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn LlmBackend, model: impl Into<String>) -> Self {
        Self { backend, model: model.into() }
    }

    pub async fn detect(&self, remote_file: Option<RemoteFileHandle>) -> Result<Vec<DetectedCriterion>, EligibilityError> {
        let mut request = GenerateRequest::new(DETECT_PROMPT, self.model.clone());
        request.response_format = ResponseFormat::Json;
        if let Some(handle) = remote_file {
            request = request.with_remote_file(handle);
        }

        let text = self.backend.generate(&request).await?;
        let parsed = parse_json_response(&text)?;
        let entries = parsed.as_array().cloned().unwrap_or_default();

        Ok(entries
            .into_iter()
            .enumerate()
            .filter_map(|(idx, entry)| {
                let section_str = entry.get("section").and_then(serde_json::Value::as_str).unwrap_or("inclusion");
                let section = CriterionSection::parse(section_str)?;
                let text = entry.get("text").and_then(serde_json::Value::as_str).unwrap_or("").trim().to_string();
                if text.is_empty() {
                    return None;
                }
                Some(DetectedCriterion {
                    criterion_id: format!("CRIT-{}", idx + 1),
                    section,
                    text,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use trialforge_llm::LlmError;

    use super::*;

    struct StubBackend(String);

    #[async_trait]
    impl LlmBackend for StubBackend {
        fn name(&self) -> &str {
            "stub"
        }
        async fn generate(&self, _request: &GenerateRequest) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn parses_inclusion_and_exclusion_entries() {
        let backend = StubBackend(
            r#"[{"section": "inclusion", "text": "Age 18+"},
                {"section": "exclusion", "text": "Known hypersensitivity to study drug"}]"#
                .to_string(),
        );
        let detector = SectionDetector::new(&backend, "test-model");
        let criteria = detector.detect(None).await.unwrap();

        assert_eq!(criteria.len(), 2);
        assert_eq!(criteria[0].section, CriterionSection::Inclusion);
        assert_eq!(criteria[1].section, CriterionSection::Exclusion);
        assert_eq!(criteria[0].criterion_id, "CRIT-1");
    }

    #[tokio::test]
    async fn drops_entries_with_empty_text_or_unknown_section() {
        let backend = StubBackend(r#"[{"section": "inclusion", "text": ""}, {"section": "maybe", "text": "x"}]"#.to_string());
        let detector = SectionDetector::new(&backend, "test-model");
        assert!(detector.detect(None).await.unwrap().is_empty());
    }
}
