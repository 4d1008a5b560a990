//! # Bughunt Explain
//!
//! Natural-language explanations for an already-identified bug.
//!
//! The generative service is a black box: a prompt goes in, free text or a
//! failure comes out. It never influences bug identity. On failure the
//! caller-supplied knowledge text becomes the explanation and the record's
//! origin stays `knowledge-base`.

mod client;
mod error;
mod explainer;
mod prompt;

pub use client::{ChatClient, ClientSettings, Provider};
pub use error::{ExplainError, Result};
pub use explainer::{build_explainer, explain_record, DisabledExplainer, Explainer};
pub use prompt::{build_prompt, SYSTEM_PROMPT};
