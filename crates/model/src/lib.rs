//! # Bughunt Model
//!
//! Data types shared by every stage of the bug hunting pipeline.
//!
//! ## Lifecycle
//!
//! ```text
//! RawDetection[]   (one per candidate line x knowledge match)
//!     │
//!     ├──> Consolidator ──> BugRecord (id = UNASSIGNED)
//!     │
//!     ├──> Signature canonicalization (signature recomputed)
//!     │
//!     └──> Memory Resolver ──> MemoryDecision { CREATE | UPDATE }
//!                                  │
//!                                  └──> Report writer (consumed once)
//! ```
//!
//! `RawDetection` never outlives one consolidation call, and a `BugRecord` is
//! handed to the writer by value inside its `MemoryDecision`.

mod decision;
mod error;
mod record;

pub use decision::{MemoryAction, MemoryDecision};
pub use error::ValidationError;
pub use record::{BugRecord, Origin, RawDetection, UNASSIGNED_ID};
