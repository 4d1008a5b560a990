//! # Bughunt Identity
//!
//! Turns raw per-line detections into canonical bug identities, and decides
//! across runs whether a bug was seen before.
//!
//! ```text
//! RawDetection[]
//!     │
//!     ├──> consolidate()        group by extracted signature, keep top relevance
//!     │      └─> BugRecord
//!     │
//!     ├──> canonicalize()       order-independent signature from type + corrected code
//!     │
//!     └──> MemoryResolver       similarity() against a persisted snapshot
//!            └─> MemoryDecision { CREATE | UPDATE }
//! ```
//!
//! Everything here is pure: no I/O, no clocks, and results depend only on the
//! *set* of inputs, never on their order.

mod consolidate;
mod resolve;
mod signature;
mod similarity;

pub use consolidate::{consolidate, relevance, ConsolidatedBug, RELEVANCE_LINE_WEIGHT};
pub use resolve::{stable_bug_id, MemoryResolver, BUG_ID_LEN};
pub use signature::{canonicalize, canonicalize_parts, recompute_signature, SIGNATURE_DELIMITER};
pub use similarity::{similarity, DUPLICATE_THRESHOLD};
