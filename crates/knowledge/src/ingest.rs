//! Builds the local knowledge file from a samples table of known bugs.

use crate::error::Result;
use crate::extract::KNOWLEDGE_MARKER;
use crate::local::{KnowledgeCorpus, KnowledgeDocument};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

const DEFAULT_LANGUAGE: &str = "C++";
const CONTEXT_SIGNATURE_CHARS: usize = 30;

static RDI_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"rdi\.(\w+)\(\)").unwrap_or_else(|_| unreachable!("static regex"))
});

/// One row of the samples table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SampleRow {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Explanation", default)]
    pub explanation: String,
    #[serde(rename = "Context", default)]
    pub context: String,
    #[serde(rename = "Code", default)]
    pub code: String,
    #[serde(rename = "Correct Code", default)]
    pub correct_code: String,
}

/// Category from keywords in the explanation and context
pub fn infer_bug_type(explanation: &str, context: &str) -> &'static str {
    let explanation = explanation.to_lowercase();
    let context = context.to_lowercase();
    if explanation.contains("mode") || context.contains("mode") {
        "Mode Configuration Mismatch"
    } else if explanation.contains("order") || explanation.contains("sequence") {
        "Order Violation"
    } else if explanation.contains("mismatch") {
        "Interface Mismatch"
    } else {
        "API Misuse"
    }
}

/// Unique `rdi.<method>()` names in first-seen order, else a context-derived label
pub fn infer_signature(buggy_code: &str, context: &str) -> String {
    let mut methods: Vec<&str> = Vec::new();
    for capture in RDI_CALL.captures_iter(buggy_code) {
        if let Some(name) = capture.get(1).map(|m| m.as_str()) {
            if !methods.contains(&name) {
                methods.push(name);
            }
        }
    }
    if !methods.is_empty() {
        return methods.join(" + ");
    }
    if context.is_empty() {
        return "General RDI Bug".to_string();
    }
    let head: String = context.chars().take(CONTEXT_SIGNATURE_CHARS).collect();
    format!("Bug in {head}...")
}

/// Render one sample row as a `[BUG_KNOWLEDGE]` document
pub fn format_bug_knowledge(row: &SampleRow) -> KnowledgeDocument {
    let explanation = row.explanation.trim();
    let context = row.context.trim();
    let buggy_code = row.code.trim();
    let correct_code = row.correct_code.trim();

    let bug_type = infer_bug_type(explanation, context);
    let signature = infer_signature(buggy_code, context);

    let text = format!(
        "{KNOWLEDGE_MARKER}\n\n\
         Language:\n{DEFAULT_LANGUAGE}\n\n\
         Bug Type:\n{bug_type}\n\n\
         Context:\n{context}\n\n\
         Buggy Code:\n{buggy_code}\n\n\
         Correct Code:\n{correct_code}\n\n\
         Explanation:\n{explanation}\n\n\
         Bug Signature:\n{signature}\n"
    );

    let id = if row.id.trim().is_empty() {
        "UNKNOWN".to_string()
    } else {
        row.id.trim().to_string()
    };
    KnowledgeDocument { id, text }
}

/// Read a samples CSV and build the knowledge corpus
pub fn ingest_samples(path: impl AsRef<Path>) -> Result<KnowledgeCorpus> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let mut corpus = KnowledgeCorpus::new();
    for (idx, row) in reader.deserialize::<SampleRow>().enumerate() {
        match row {
            Ok(row) => corpus.push(format_bug_knowledge(&row)),
            Err(err) => log::warn!("Skipping sample row {}: {err}", idx + 1),
        }
    }
    log::info!(
        "Formatted {} knowledge documents from {}",
        corpus.len(),
        path.display()
    );
    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::KnowledgeFields;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn bug_type_inference_follows_keyword_priority() {
        assert_eq!(infer_bug_type("wrong edit mode", ""), "Mode Configuration Mismatch");
        assert_eq!(infer_bug_type("", "vector Mode"), "Mode Configuration Mismatch");
        assert_eq!(infer_bug_type("calls out of order", ""), "Order Violation");
        assert_eq!(infer_bug_type("bad sequence", ""), "Order Violation");
        assert_eq!(infer_bug_type("pin mismatch", ""), "Interface Mismatch");
        assert_eq!(infer_bug_type("wrong clamp value", ""), "API Misuse");
    }

    #[test]
    fn signature_inference() {
        assert_eq!(
            infer_signature("rdi.smartVec().x; rdi.dc(); rdi.smartVec()", ""),
            "smartVec + dc"
        );
        assert_eq!(
            infer_signature("foo();", "Setting the clamp before the burst starts"),
            "Bug in Setting the clamp before the b..."
        );
        assert_eq!(infer_signature("foo();", ""), "General RDI Bug");
    }

    #[test]
    fn formatted_document_parses_back() {
        let row = SampleRow {
            id: "16".to_string(),
            explanation: "VECD mode is invalid here".to_string(),
            context: "smartVec label".to_string(),
            code: "rdi.smartVec().vecEditMode(TA::VECD);".to_string(),
            correct_code: "rdi.smartVec().vecEditMode(TA::VTT);".to_string(),
        };
        let doc = format_bug_knowledge(&row);
        assert_eq!(doc.id, "16");

        let fields = KnowledgeFields::parse(&doc.text);
        assert!(fields.structured);
        assert_eq!(fields.language.as_deref(), Some("C++"));
        assert_eq!(fields.bug_type.as_deref(), Some("Mode Configuration Mismatch"));
        assert_eq!(fields.signature.as_deref(), Some("smartVec"));
        assert_eq!(
            fields.correct_code.as_deref(),
            Some("rdi.smartVec().vecEditMode(TA::VTT);")
        );
    }

    #[test]
    fn ingest_reads_csv_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("samples.csv");
        std::fs::write(
            &path,
            "ID,Explanation,Context,Code,Correct Code\n\
             1,Clamp set in wrong order,,\"rdi.dc().iClamp(1);\",\"rdi.dc().iClamp(2);\"\n\
             2,Edit mode,smartVec,rdi.smartVec(),rdi.smartVec()\n",
        )
        .unwrap();

        let corpus = ingest_samples(&path).unwrap();
        assert_eq!(corpus.len(), 2);
        let first = KnowledgeFields::parse(&corpus.documents()[0].text);
        assert_eq!(first.bug_type.as_deref(), Some("Order Violation"));
        assert_eq!(first.signature.as_deref(), Some("dc"));
    }
}
