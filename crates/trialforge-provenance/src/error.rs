use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvenanceError {
    #[error("json (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unrecognized confidence level: {0}")]
    InvalidConfidence(String),
}
