use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExplainError>;

#[derive(Error, Debug)]
pub enum ExplainError {
    #[error("No API token configured (HF_TOKEN, OPENAI_API_KEY or GROQ_API_KEY)")]
    Disabled,

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Generative service returned no content")]
    EmptyResponse,
}
