//! Candidate-page detection, the `detecting_pages` state (spec §4.F):
//! "every long-running pipeline phase" in the SOA pipeline is driven off
//! the uploaded PDF rather than a local text layer — there is no local
//! PDF-to-text extraction anywhere in this engine (module extraction
//! sends `source_bytes` straight to the LLM as a remote file, too) — so
//! candidate-page detection is a single LLM call over the remote file
//! asking it to name the pages carrying a Schedule of Activities table,
//! the same request/parse shape `TwoPhaseExtractor` uses for module
//! extraction, just with a fixed prompt instead of a per-module template.

use trialforge_llm::{GenerateRequest, LlmBackend, RemoteFileHandle, ResponseFormat};

use crate::error::SoaError;
use crate::llm_json::parse_json_response;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedPage {
    pub table_id: String,
    /// `"MAIN_SOA"` | `"PK_SOA"` | `"SAFETY_SOA"` | `"PD_SOA"`.
    pub category: String,
    pub page_start: i64,
    pub page_end: i64,
}

const DETECT_PROMPT: &str = r#"You are scanning a clinical trial protocol PDF for Schedule of
Activities (SOA) tables: tabular grids that list study visits across
the top and procedures/assessments down the side, with marks in the
cells showing which procedure happens at which visit.

Return a JSON array, one entry per distinct SOA table you find:
[{"pageStart": 12, "pageEnd": 13, "category": "MAIN_SOA"}, ...]

"category" must be one of MAIN_SOA, PK_SOA, SAFETY_SOA, PD_SOA — use
MAIN_SOA unless the table's title or heading clearly names it as a
pharmacokinetic, safety, or pharmacodynamic sub-schedule. Return only
the JSON array, nothing else. If there is no such table, return [].
"#;

pub struct PageDetector<'a> {
    pub backend: &'a dyn LlmBackend,
    pub model: String,
}

impl<'a> PageDetector<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn LlmBackend, model: impl Into<String>) -> Self {
        Self { backend, model: model.into() }
    }

    pub async fn detect(&self, remote_file: Option<RemoteFileHandle>) -> Result<Vec<DetectedPage>, SoaError> {
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
            .map(|(idx, entry)| {
                let page_start = entry.get("pageStart").and_then(serde_json::Value::as_i64).unwrap_or(1);
                let page_end = entry.get("pageEnd").and_then(serde_json::Value::as_i64).unwrap_or(page_start);
                let category = entry
                    .get("category")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("MAIN_SOA")
                    .to_string();
                DetectedPage {
                    table_id: format!("SOA-{}", idx + 1),
                    category,
                    page_start,
                    page_end,
                }
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
    async fn assigns_sequential_table_ids_in_response_order() {
        let backend = StubBackend(
            r#"[{"pageStart": 12, "pageEnd": 13, "category": "MAIN_SOA"},
                {"pageStart": 40, "pageEnd": 40, "category": "PK_SOA"}]"#
                .to_string(),
        );
        let detector = PageDetector::new(&backend, "test-model");
        let pages = detector.detect(None).await.unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].table_id, "SOA-1");
        assert_eq!(pages[0].category, "MAIN_SOA");
        assert_eq!(pages[1].table_id, "SOA-2");
        assert_eq!(pages[1].category, "PK_SOA");
    }

    #[tokio::test]
    async fn empty_response_array_yields_no_pages() {
        let backend = StubBackend("[]".to_string());
        let detector = PageDetector::new(&backend, "test-model");
        assert!(detector.detect(None).await.unwrap().is_empty());
    }
}
