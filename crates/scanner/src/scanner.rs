use crate::config::ScannerConfig;
use crate::error::{Result, ScannerError};
use crate::language::Language;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A source line flagged for evidence retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// 1-indexed line number
    pub line: usize,

    /// Trimmed line text, used as the retrieval query
    pub text: String,
}

/// A loaded source file
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub language: Language,
    pub content: String,
}

impl SourceFile {
    /// Read a source file from disk.
    ///
    /// An unreadable file is fatal for the whole run; an unknown extension is not.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ScannerError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        let language = Language::from_path(path);
        if language == Language::Unknown {
            log::warn!(
                "{} has an unrecognized extension, detection might be less accurate",
                path.display()
            );
        }
        Ok(Self {
            path: path.to_path_buf(),
            language,
            content,
        })
    }

    /// Scan this file for candidates
    pub fn candidates(&self, config: &ScannerConfig) -> Vec<Candidate> {
        scan(&self.content, self.language, config)
    }

    /// Source text of a 1-indexed line, if present
    pub fn line(&self, line: usize) -> Option<&str> {
        line.checked_sub(1)
            .and_then(|idx| self.content.lines().nth(idx))
    }
}

/// Split code into `(line_number, text)` pairs, 1-indexed
pub fn numbered_lines(code: &str) -> Vec<(usize, &str)> {
    code.lines().enumerate().map(|(i, l)| (i + 1, l)).collect()
}

/// Find lines containing at least one trigger token, ordered by line
pub fn scan(code: &str, language: Language, config: &ScannerConfig) -> Vec<Candidate> {
    let candidates: Vec<Candidate> = numbered_lines(code)
        .into_iter()
        .filter_map(|(line, text)| {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            if config.skip_comments && language.is_comment_line(trimmed) {
                return None;
            }
            config
                .triggers
                .iter()
                .any(|trigger| trimmed.contains(trigger.as_str()))
                .then(|| Candidate {
                    line,
                    text: trimmed.to_string(),
                })
        })
        .collect();

    log::debug!("Scanner flagged {} candidate lines", candidates.len());
    candidates
}

/// Lines `[line - window, line + window]` around a 1-indexed line, clamped to the file
pub fn block_context(code: &str, line: usize, window: usize) -> String {
    let lines: Vec<&str> = code.lines().collect();
    if lines.is_empty() || line == 0 {
        return String::new();
    }
    let start = line.saturating_sub(window.saturating_add(1));
    let end = line.saturating_add(window).min(lines.len());
    if start >= end {
        return String::new();
    }
    lines[start..end].join("\n")
}
