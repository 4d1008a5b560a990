use crate::signature::recompute_signature;
use crate::similarity::{similarity, DUPLICATE_THRESHOLD};
use bughunt_model::{BugRecord, MemoryAction, MemoryDecision, ValidationError};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Length of a content-derived bug id, in hex characters
pub const BUG_ID_LEN: usize = 8;

/// Content-derived id: first 8 hex characters of SHA-256 over the canonical signature.
///
/// Ids are lowercase hex and do not match ids minted by MD5-based tools, so
/// tables written by such tools keep their own ids and merge by similarity.
///
/// The same signature always yields the same id, so re-ingesting identical
/// input never mints a second identity.
pub fn stable_bug_id(canonical_signature: &str) -> String {
    let digest = Sha256::digest(canonical_signature.as_bytes());
    let mut hex = String::with_capacity(BUG_ID_LEN);
    for byte in digest.iter().take(BUG_ID_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Resolution {
    Unmatched,
    Matched { index: usize, similarity: f64 },
}

/// Decides CREATE vs UPDATE for one record against a persisted snapshot
#[derive(Debug, Clone, Copy)]
pub struct MemoryResolver {
    threshold: f64,
}

impl Default for MemoryResolver {
    fn default() -> Self {
        Self {
            threshold: DUPLICATE_THRESHOLD,
        }
    }
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `record` against `snapshot`, persisted records in table order.
    ///
    /// The signature is recomputed first. The first persisted record whose
    /// similarity reaches the threshold wins and lends its id; otherwise a
    /// new id is derived from the canonical signature.
    pub fn resolve(
        &self,
        mut record: BugRecord,
        snapshot: &[BugRecord],
    ) -> Result<MemoryDecision, ValidationError> {
        record.validate_consolidated()?;
        recompute_signature(&mut record);
        if record.signature.is_empty() {
            return Err(ValidationError::EmptySignature);
        }

        let mut state = Resolution::Unmatched;
        for (index, persisted) in snapshot.iter().enumerate() {
            let score = similarity(&record, persisted);
            log::debug!(
                "Similarity vs {} ('{}'): {:.2}",
                persisted.id,
                persisted.signature,
                score
            );
            if score >= self.threshold {
                state = Resolution::Matched {
                    index,
                    similarity: score,
                };
                break;
            }
        }

        let decision = match state {
            Resolution::Matched { index, similarity } => {
                let persisted = &snapshot[index];
                let merged: BTreeSet<usize> = persisted
                    .line_numbers
                    .union(&record.line_numbers)
                    .copied()
                    .collect();
                log::info!(
                    "Duplicate of {} (similarity {:.2}), action UPDATE",
                    persisted.id,
                    similarity
                );
                record.id = persisted.id.clone();
                record.line_numbers = merged;
                MemoryDecision {
                    action: MemoryAction::Update,
                    bug_id: record.id.clone(),
                    merged_lines: record.sorted_lines(),
                    record,
                }
            }
            Resolution::Unmatched => {
                let id = stable_bug_id(&record.signature);
                log::info!("New bug pattern, action CREATE (id {id})");
                record.id = id;
                MemoryDecision {
                    action: MemoryAction::Create,
                    bug_id: record.id.clone(),
                    merged_lines: record.sorted_lines(),
                    record,
                }
            }
        };

        decision.record.validate_persistable()?;
        Ok(decision)
    }
}
