//! # Bughunt Knowledge
//!
//! Corroborates candidate lines against a knowledge base of known bugs.
//!
//! ## Pipeline
//!
//! ```text
//! Candidate[]
//!     │
//!     ├──> Retriever (bounded worker pool, per-query timeout)
//!     │      └─> EvidenceSource::query(text) -> [(text, score)]
//!     │             ├─> LocalKnowledgeBase (JSON knowledge file)
//!     │             └─> HttpKnowledgeBase  (remote search endpoint)
//!     │
//!     ├──> Relevance floor
//!     │
//!     └──> Extractor ([BUG_KNOWLEDGE] fields)
//!            └─> RawDetection[]
//! ```
//!
//! A failed or timed-out query contributes no detections; it never aborts the scan.

mod error;
mod extract;
mod http;
mod ingest;
mod limits;
mod local;
mod retriever;
mod source;

pub use error::{KnowledgeError, Result};
pub use extract::{KnowledgeFields, KNOWLEDGE_MARKER, UNKNOWN_BUG_TYPE, UNKNOWN_SIGNATURE};
pub use http::HttpKnowledgeBase;
pub use ingest::{format_bug_knowledge, ingest_samples, infer_bug_type, infer_signature, SampleRow};
pub use limits::{clamp_concurrency, MAX_RETRIEVAL_CONCURRENCY};
pub use local::{KnowledgeCorpus, KnowledgeDocument, LocalKnowledgeBase, KNOWLEDGE_SCHEMA_VERSION};
pub use retriever::{RetrievalOutcome, Retriever, RetrieverConfig};
pub use source::{EvidenceSource, KnowledgeMatch};
