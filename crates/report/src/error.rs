use bughunt_model::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Refusing to persist invalid record: {0}")]
    Validation(#[from] ValidationError),

    #[error("Table {path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("Failed to lock {path}: {message}")]
    Lock { path: PathBuf, message: String },
}
