use thiserror::Error;

pub type Result<T> = std::result::Result<T, KnowledgeError>;

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Query timed out after {0} ms")]
    Timeout(u64),

    #[error("Unsupported knowledge schema_version {found} (expected {expected})")]
    SchemaVersion { found: u32, expected: u32 },

    #[error("{0}")]
    Other(String),
}
