use thiserror::Error;

#[derive(Debug, Error)]
pub enum CombinerError {
    #[error("failed to read source document at {path}: {source}")]
    SourceRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
