use bughunt_model::{BugRecord, RawDetection};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Weight of each corroborating line in the relevance score.
///
/// Kept below typical retrieval score gaps so retrieval quality dominates line count.
pub const RELEVANCE_LINE_WEIGHT: f64 = 0.05;

/// The single bug identity selected from one scan
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedBug {
    /// Canonical record; `confidence` carries the relevance score
    pub record: BugRecord,

    /// Highest-scoring detection of the winning group
    pub representative: RawDetection,

    /// Number of detections merged into the record
    pub detections: usize,

    /// Groups that ranked below the winner and were not reported
    pub suppressed_groups: usize,
}

/// `score + 0.05 x line_count`
pub fn relevance(representative_score: f64, line_count: usize) -> f64 {
    representative_score + RELEVANCE_LINE_WEIGHT * line_count as f64
}

struct Group {
    signature: String,
    representative: RawDetection,
    lines: BTreeSet<usize>,
    detections: usize,
    relevance: f64,
}

/// Group raw detections by extracted signature and return the top-relevance group.
///
/// Only one bug is reported per scan. An empty input yields `None`, which is a
/// normal outcome. The result depends only on the set of detections, never on
/// their order.
pub fn consolidate(detections: Vec<RawDetection>) -> Option<ConsolidatedBug> {
    let mut buckets: BTreeMap<String, Vec<RawDetection>> = BTreeMap::new();
    for detection in detections {
        if !detection.score.is_finite() {
            log::warn!(
                "Dropping detection on line {} with non-finite score",
                detection.line
            );
            continue;
        }
        buckets
            .entry(detection.signature.clone())
            .or_default()
            .push(detection);
    }

    let mut groups: Vec<Group> = buckets
        .into_iter()
        .filter_map(|(signature, members)| build_group(signature, members))
        .collect();

    groups.sort_by(|a, b| {
        b.relevance
            .total_cmp(&a.relevance)
            .then_with(|| a.signature.cmp(&b.signature))
    });

    for group in &groups {
        log::debug!(
            "Group '{}': {} detections, lines {:?}, relevance {:.3}",
            group.signature,
            group.detections,
            group.lines,
            group.relevance
        );
    }

    let suppressed_groups = groups.len().saturating_sub(1);
    let top = groups.into_iter().next()?;

    let record = BugRecord::new(&top.representative.bug_type, &top.signature)
        .lines(top.lines.iter().copied())
        .snippet(&top.representative.line_text)
        .confidence(top.relevance);

    Some(ConsolidatedBug {
        record,
        representative: top.representative,
        detections: top.detections,
        suppressed_groups,
    })
}

fn build_group(signature: String, members: Vec<RawDetection>) -> Option<Group> {
    let detections = members.len();
    let lines: BTreeSet<usize> = members.iter().map(|d| d.line).collect();
    let representative = members.into_iter().min_by(rank_representative)?;
    let relevance = relevance(representative.score, lines.len());
    Some(Group {
        signature,
        representative,
        lines,
        detections,
        relevance,
    })
}

/// Ordering where the best representative is the minimum:
/// highest score, then lowest line, then knowledge text.
fn rank_representative(a: &RawDetection, b: &RawDetection) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.line.cmp(&b.line))
        .then_with(|| a.knowledge_text.cmp(&b.knowledge_text))
        .then_with(|| a.bug_type.cmp(&b.bug_type))
}
