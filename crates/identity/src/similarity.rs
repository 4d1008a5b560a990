use bughunt_model::BugRecord;
use std::collections::BTreeSet;

/// Similarity at or above which two records denote the same defect
pub const DUPLICATE_THRESHOLD: f64 = 0.85;

const TYPE_MATCH_WEIGHT: f64 = 0.3;
const TOKEN_OVERLAP_WEIGHT: f64 = 0.5;

/// Confidence in [0, 1] that two records denote the same underlying defect.
///
/// Evaluated in priority order, first applicable rule wins:
/// 1. either signature empty -> 0.0
/// 2. signatures equal ignoring case (whitespace included) -> 1.0
/// 3. 0.3 for an exact `bug_type` match plus 0.5 x token overlap ratio of the
///    whitespace-split signatures, clamped to 1.0
///
/// Type match alone caps at 0.3 and overlap alone at 0.5, so only an exact
/// signature reaches certainty.
pub fn similarity(a: &BugRecord, b: &BugRecord) -> f64 {
    let sig_a = a.signature.as_str();
    let sig_b = b.signature.as_str();

    if sig_a.is_empty() || sig_b.is_empty() {
        return 0.0;
    }

    if sig_a.to_lowercase() == sig_b.to_lowercase() {
        return 1.0;
    }

    let mut score = 0.0;
    if a.bug_type == b.bug_type {
        score += TYPE_MATCH_WEIGHT;
    }

    let tokens_a = signature_tokens(sig_a);
    let tokens_b = signature_tokens(sig_b);
    let denominator = tokens_a.len().max(tokens_b.len());
    if denominator > 0 {
        let overlap = tokens_a.intersection(&tokens_b).count();
        score += TOKEN_OVERLAP_WEIGHT * (overlap as f64 / denominator as f64);
    }

    score.clamp(0.0, 1.0)
}

fn signature_tokens(signature: &str) -> BTreeSet<String> {
    signature
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}
