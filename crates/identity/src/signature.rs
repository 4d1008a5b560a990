use bughunt_model::BugRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

pub const SIGNATURE_DELIMITER: &str = "+";

const MAX_REFERENCE_TOKENS: usize = 10;

static WORD_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[[:alnum:]_]+").unwrap_or_else(|_| unreachable!("static regex")));

/// Stable, order-independent signature of a record.
///
/// The lower-cased `bug_type` and the first ten word tokens of the corrected
/// code (lower-cased) are collected into a set, sorted, and joined with `+`.
pub fn canonicalize(record: &BugRecord) -> String {
    canonicalize_parts(&record.bug_type, record.correct_reference.as_deref())
}

pub fn canonicalize_parts(bug_type: &str, correct_reference: Option<&str>) -> String {
    let mut parts: BTreeSet<String> = BTreeSet::new();

    let bug_type = bug_type.trim().to_lowercase();
    if !bug_type.is_empty() {
        parts.insert(bug_type);
    }

    if let Some(reference) = correct_reference {
        parts.extend(
            WORD_TOKEN
                .find_iter(reference)
                .take(MAX_REFERENCE_TOKENS)
                .map(|m| m.as_str().to_lowercase()),
        );
    }

    parts.into_iter().collect::<Vec<_>>().join(SIGNATURE_DELIMITER)
}

/// Recompute `record.signature` from its current type and corrected code
pub fn recompute_signature(record: &mut BugRecord) {
    let signature = canonicalize(record);
    if signature != record.signature {
        log::debug!(
            "Signature canonicalized: '{}' -> '{}'",
            record.signature,
            signature
        );
    }
    record.signature = signature;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn type_only_signature() {
        assert_eq!(
            canonicalize_parts("Mode Configuration Mismatch", None),
            "mode configuration mismatch"
        );
    }

    #[test]
    fn reference_tokens_are_sorted_and_deduplicated() {
        assert_eq!(
            canonicalize_parts("API Misuse", Some("iClamp")),
            "api misuse+iclamp"
        );
        assert_eq!(
            canonicalize_parts("T", Some("rdi.smartVec().vecEditMode(TA::VTT); rdi.smartVec()")),
            "rdi+smartvec+t+ta+veceditmode+vtt"
        );
    }

    #[test]
    fn only_first_ten_reference_tokens_count() {
        let reference = "a b c d e f g h i j k l";
        assert_eq!(
            canonicalize_parts("", Some(reference)),
            "a+b+c+d+e+f+g+h+i+j"
        );
    }

    #[test]
    fn absent_inputs_degrade_to_empty() {
        assert_eq!(canonicalize_parts("", None), "");
        assert_eq!(canonicalize_parts("   ", Some("")), "");
    }

    #[test]
    fn recompute_overwrites_extracted_signature() {
        let mut record = BugRecord::new("API Misuse", "iClamp mismatch").correct_reference("iClamp");
        recompute_signature(&mut record);
        assert_eq!(record.signature, "api misuse+iclamp");
    }

    proptest! {
        #[test]
        fn signature_ignores_token_order_and_case(
            tokens in proptest::collection::vec("[a-zA-Z][a-zA-Z0-9]{0,8}", 1..=10),
            seed in any::<u64>(),
        ) {
            let mut shuffled = tokens.clone();
            // Deterministic rotation + reversal from the seed
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            if seed % 2 == 0 {
                shuffled.reverse();
            }
            let upper: Vec<String> = shuffled.iter().map(|t| t.to_uppercase()).collect();

            let original = canonicalize_parts("Order Violation", Some(&tokens.join(" ")));
            let permuted = canonicalize_parts("ORDER violation", Some(&upper.join(", ")));
            prop_assert_eq!(original, permuted);
        }

        #[test]
        fn signature_is_never_empty_with_a_type(bug_type in "[A-Za-z][A-Za-z ]{0,20}") {
            prop_assert!(!canonicalize_parts(&bug_type, None).is_empty());
        }
    }
}
