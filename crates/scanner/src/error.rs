use thiserror::Error;

/// Result type for scanner operations
pub type Result<T> = std::result::Result<T, ScannerError>;

/// Errors that can occur while loading or scanning a source file
#[derive(Error, Debug)]
pub enum ScannerError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Source file could not be read
    #[error("Cannot read {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ScannerError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
