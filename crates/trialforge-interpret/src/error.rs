use thiserror::Error;

#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("stage {stage_number} ({stage_name}) failed compliance: {detail}")]
    ComplianceFailed {
        stage_number: u8,
        stage_name: &'static str,
        detail: String,
    },
    #[error("stage {stage_number} ({stage_name}): could not parse LLM response as JSON: {snippet}")]
    JsonParse {
        stage_number: u8,
        stage_name: &'static str,
        snippet: String,
    },
    #[error("stage {stage_number} ({stage_name}): LLM call failed: {source}")]
    Llm {
        stage_number: u8,
        stage_name: &'static str,
        #[source]
        source: trialforge_llm::LlmError,
    },
    #[error("document is missing expected field: {0}")]
    MissingField(String),
}
