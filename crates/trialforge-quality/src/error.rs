use thiserror::Error;

#[derive(Error, Debug)]
pub enum QualityError {
    #[error("json (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid schema for module {module_id}: {reason}")]
    InvalidSchema { module_id: String, reason: String },
}
