use thiserror::Error;

#[derive(Error, Debug)]
pub enum EligibilityError {
    #[error("LLM backend error: {0}")]
    Llm(#[from] trialforge_llm::LlmError),

    #[error("json (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not parse a JSON response from the model: {0}")]
    JsonParse(String),
}
