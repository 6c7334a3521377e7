use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unknown module: {0}")]
    UnknownModule(String),

    #[error("failed to read {what} at {path}: {source}")]
    PromptIo {
        what: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON response: {0}")]
    JsonParse(String),

    #[error("llm error: {0}")]
    Llm(#[from] trialforge_llm::LlmError),

    #[error("cache error: {0}")]
    Cache(#[from] trialforge_cache::CacheError),

    #[error("quality error: {0}")]
    Quality(#[from] trialforge_quality::QualityError),

    #[error("exhausted {0} retries without an extraction attempt succeeding")]
    RetriesExhausted(u32),
}
