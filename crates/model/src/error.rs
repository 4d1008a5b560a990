use thiserror::Error;

/// Structured reason a record was rejected at a component boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("bug record has no line numbers")]
    EmptyLines,

    #[error("line number {0} is not positive")]
    NonPositiveLine(usize),

    #[error("bug record signature is empty")]
    EmptySignature,

    #[error("bug record id is not assigned")]
    UnassignedId,

    #[error("relevance score {0} is not a finite number")]
    NonFiniteScore(f64),
}
