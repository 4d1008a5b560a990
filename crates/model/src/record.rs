use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Placeholder id carried until the memory resolver assigns a stable one
pub const UNASSIGNED_ID: &str = "UNASSIGNED";

const MAX_SNIPPET_CHARS: usize = 240;

/// Provenance of a record's explanatory text (not of its identity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    KnowledgeBase,
    Generative,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::KnowledgeBase => "knowledge-base",
            Origin::Generative => "generative",
        }
    }

    /// Parse a persisted `source` cell, accepting legacy spellings
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "knowledge-base" | "knowledge_base" | "vector_db" => Some(Origin::KnowledgeBase),
            "generative" | "llm" => Some(Origin::Generative),
            _ => None,
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scored match between a candidate line and a knowledge item.
///
/// Owned and fully consumed by a single consolidation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Candidate line (1-indexed)
    pub line: usize,

    /// Retrieval score in [0, 1]
    pub score: f64,

    /// Bug category extracted from the knowledge text
    pub bug_type: String,

    /// Signature as extracted, before canonicalization
    pub signature: String,

    /// Full knowledge text the match came from
    pub knowledge_text: String,

    /// Source text of the candidate line
    pub line_text: String,
}

impl RawDetection {
    #[must_use]
    pub fn new(
        line: usize,
        score: f64,
        bug_type: impl Into<String>,
        signature: impl Into<String>,
        knowledge_text: impl Into<String>,
    ) -> Self {
        Self {
            line,
            score,
            bug_type: bug_type.into(),
            signature: signature.into(),
            knowledge_text: knowledge_text.into(),
            line_text: String::new(),
        }
    }

    /// Builder: attach the candidate line's source text
    #[must_use]
    pub fn line_text(mut self, text: impl Into<String>) -> Self {
        self.line_text = text.into();
        self
    }
}

/// Canonical, deduplicated description of one defect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugRecord {
    /// `UNASSIGNED` until resolved; immutable afterwards
    pub id: String,

    /// Inferred source language (informational)
    pub language: String,

    /// Free-text category, e.g. "Mode Configuration Mismatch"
    pub bug_type: String,

    /// Implicated source lines; only ever grows
    pub line_numbers: BTreeSet<usize>,

    /// Bounded textual evidence
    pub snippet: String,

    /// Corrected code reference, primary input to canonicalization
    pub correct_reference: Option<String>,

    /// Text the evidence came from
    pub context: Option<String>,

    /// Human-readable explanation
    pub explanation: Option<String>,

    /// Identity key; recomputed whenever `bug_type` or `correct_reference` changes
    pub signature: String,

    /// Consolidator relevance; never persisted as ground truth
    pub confidence: f64,

    pub origin: Origin,
}

impl BugRecord {
    /// Create an unassigned record for the given type and signature
    #[must_use]
    pub fn new(bug_type: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            id: UNASSIGNED_ID.to_string(),
            language: "Unknown".to_string(),
            bug_type: bug_type.into(),
            line_numbers: BTreeSet::new(),
            snippet: String::new(),
            correct_reference: None,
            context: None,
            explanation: None,
            signature: signature.into(),
            confidence: 0.0,
            origin: Origin::KnowledgeBase,
        }
    }

    /// Builder: set language
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Builder: add lines
    #[must_use]
    pub fn lines(mut self, lines: impl IntoIterator<Item = usize>) -> Self {
        self.line_numbers.extend(lines);
        self
    }

    /// Builder: set snippet, truncated to a bounded number of characters
    #[must_use]
    pub fn snippet(mut self, snippet: &str) -> Self {
        self.snippet = bounded_snippet(snippet);
        self
    }

    /// Builder: set corrected code reference
    #[must_use]
    pub fn correct_reference(mut self, reference: impl Into<String>) -> Self {
        self.correct_reference = Some(reference.into());
        self
    }

    /// Builder: set context
    #[must_use]
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Builder: set confidence
    #[must_use]
    pub const fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    #[must_use]
    pub fn is_assigned(&self) -> bool {
        self.id != UNASSIGNED_ID && !self.id.is_empty()
    }

    /// Sorted line numbers
    #[must_use]
    pub fn sorted_lines(&self) -> Vec<usize> {
        self.line_numbers.iter().copied().collect()
    }

    /// Check the invariants a record must hold when it leaves the consolidator
    pub fn validate_consolidated(&self) -> Result<(), ValidationError> {
        if self.line_numbers.is_empty() {
            return Err(ValidationError::EmptyLines);
        }
        if self.line_numbers.contains(&0) {
            return Err(ValidationError::NonPositiveLine(0));
        }
        if !self.confidence.is_finite() {
            return Err(ValidationError::NonFiniteScore(self.confidence));
        }
        Ok(())
    }

    /// Check the invariants a record must hold before it is persisted
    pub fn validate_persistable(&self) -> Result<(), ValidationError> {
        self.validate_consolidated()?;
        if self.signature.trim().is_empty() {
            return Err(ValidationError::EmptySignature);
        }
        if !self.is_assigned() {
            return Err(ValidationError::UnassignedId);
        }
        Ok(())
    }
}

fn bounded_snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_SNIPPET_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_SNIPPET_CHARS).collect();
    out.push_str("...");
    out
}
