use thiserror::Error;

/// Error taxonomy for the analysis pipeline.
///
/// Per-file failures (`UnsupportedLanguage`, `Decode`, `Parse`) are
/// recoverable: repository scans record them and keep going. Index and
/// caller-input failures are surfaced immediately, never retried here.
#[derive(Debug, Error)]
pub enum CodeScopeError {
    #[error("unsupported language or file type: {0}")]
    UnsupportedLanguage(String),

    #[error("file content is not valid UTF-8: {0}")]
    Decode(String),

    #[error("embedding model unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("vector index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("invalid search type: {0}")]
    InvalidSearchType(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("parse failure: {0}")]
    Parse(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CodeScopeError>;
