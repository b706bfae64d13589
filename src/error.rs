use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Document is password protected")]
    PasswordProtected,

    #[error("Model response did not contain valid JSON: {0}")]
    MalformedResponse(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Document error: {0}")]
    DocumentError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Batch cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
