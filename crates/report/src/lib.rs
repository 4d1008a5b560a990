//! # Bughunt Report
//!
//! Durable bug table. One CSV row per bug id:
//!
//! ```text
//! bug_id,language,bug_type,lines,bug_signature,explanation,context,source,timestamp
//! ```
//!
//! Reading yields a snapshot of [`RowOutcome`]s so one corrupt row never
//! blocks resolution. Writing happens only through a [`StoreGuard`], which
//! holds the process mutex and the table's lock file for the whole
//! read-resolve-apply span.

mod error;
mod lock;
mod row;
mod store;

pub use error::{ReportError, Result};
pub use row::{format_lines, parse_lines, ColumnIndex, PersistedBug, RowOutcome, TABLE_COLUMNS};
pub use store::{persisted_records, ApplyStats, ReportStore, StoreGuard};
