//! Structured fields of a `[BUG_KNOWLEDGE]` text blob.
//!
//! ```text
//! [BUG_KNOWLEDGE]
//!
//! Bug Type:
//! Mode Configuration Mismatch
//!
//! Correct Code:
//! rdi.smartVec().vecEditMode(TA::VTT);
//!
//! Bug Signature:
//! smartVec + vecEditMode
//! ```
//!
//! Each header sits on its own line (or carries the value inline after the
//! colon) and its value runs until the next header. An inline header is only
//! recognized at a section boundary: the start of the text, after a blank
//! line, after the marker, or right after another inline header. Elsewhere a
//! line such as `Context: ...` is body text.

use serde::Serialize;

pub const KNOWLEDGE_MARKER: &str = "[BUG_KNOWLEDGE]";
pub const UNKNOWN_BUG_TYPE: &str = "Potential Bug";
pub const UNKNOWN_SIGNATURE: &str = "Unknown Signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Language,
    BugType,
    Context,
    BuggyCode,
    CorrectCode,
    Explanation,
    Signature,
}

const HEADERS: &[(&str, Section)] = &[
    ("Language:", Section::Language),
    ("Bug Type:", Section::BugType),
    ("Context:", Section::Context),
    ("Buggy Code:", Section::BuggyCode),
    ("Correct Code:", Section::CorrectCode),
    ("Explanation:", Section::Explanation),
    ("Bug Signature:", Section::Signature),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KnowledgeFields {
    pub structured: bool,
    pub language: Option<String>,
    pub bug_type: Option<String>,
    pub context: Option<String>,
    pub buggy_code: Option<String>,
    pub correct_code: Option<String>,
    pub explanation: Option<String>,
    pub signature: Option<String>,
}

impl KnowledgeFields {
    /// Parse a knowledge text. Never fails: missing sections stay `None`.
    pub fn parse(text: &str) -> Self {
        let mut fields = KnowledgeFields {
            structured: text.contains(KNOWLEDGE_MARKER),
            ..Default::default()
        };
        let mut current: Option<(Section, Vec<&str>)> = None;
        let mut at_boundary = true;

        for line in text.lines() {
            let header = match_header(line)
                .filter(|(_, inline)| inline.is_empty() || at_boundary || current.is_none());
            if let Some((section, inline)) = header {
                if let Some((done, body)) = current.take() {
                    fields.set(done, &body);
                }
                let mut body = Vec::new();
                if !inline.is_empty() {
                    body.push(inline);
                }
                at_boundary = !inline.is_empty();
                current = Some((section, body));
                continue;
            }

            let trimmed = line.trim();
            at_boundary = trimmed.is_empty() || trimmed == KNOWLEDGE_MARKER;
            if let Some((_, body)) = current.as_mut() {
                body.push(line);
            }
        }
        if let Some((done, body)) = current.take() {
            fields.set(done, &body);
        }

        fields
    }

    /// Bug type, or the `Potential Bug` placeholder
    pub fn bug_type_or_default(&self) -> String {
        self.bug_type
            .clone()
            .unwrap_or_else(|| UNKNOWN_BUG_TYPE.to_string())
    }

    /// Signature, or the `Unknown Signature` placeholder
    pub fn signature_or_default(&self) -> String {
        self.signature
            .clone()
            .unwrap_or_else(|| UNKNOWN_SIGNATURE.to_string())
    }

    fn set(&mut self, section: Section, body: &[&str]) {
        let value = body.join("\n").trim().to_string();
        if value.is_empty() {
            return;
        }
        let slot = match section {
            Section::Language => &mut self.language,
            Section::BugType => &mut self.bug_type,
            Section::Context => &mut self.context,
            Section::BuggyCode => &mut self.buggy_code,
            Section::CorrectCode => &mut self.correct_code,
            Section::Explanation => &mut self.explanation,
            Section::Signature => &mut self.signature,
        };
        *slot = Some(value);
    }
}

fn match_header(line: &str) -> Option<(Section, &str)> {
    let trimmed = line.trim();
    HEADERS.iter().find_map(|(header, section)| {
        trimmed
            .strip_prefix(header)
            .map(|rest| (*section, rest.trim()))
    })
}
