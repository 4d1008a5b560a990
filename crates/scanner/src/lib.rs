//! # Bughunt Scanner
//!
//! Finds candidate lines in a source file by trigger tokens.
//!
//! ```text
//! Source file
//!     │
//!     ├──> Language detection (extension)
//!     │
//!     ├──> Numbered lines (1-indexed)
//!     │
//!     └──> Trigger filter (skip blanks and pure comments)
//!            └─> Candidate { line, text }
//! ```
//!
//! ## Example
//!
//! ```rust
//! use bughunt_scanner::{scan, Language, ScannerConfig};
//!
//! let code = "int x = 0;\nrdi.smartVec().vecEditMode(TA::VECD);\n";
//! let candidates = scan(code, Language::Cpp, &ScannerConfig::default());
//! assert_eq!(candidates.len(), 1);
//! assert_eq!(candidates[0].line, 2);
//! ```

mod config;
mod error;
mod language;
mod scanner;

pub use config::ScannerConfig;
pub use error::{Result, ScannerError};
pub use language::Language;
pub use scanner::{block_context, numbered_lines, scan, Candidate, SourceFile};
