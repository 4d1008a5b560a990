use crate::error::{KnowledgeError, Result};
use crate::extract::KnowledgeFields;
use crate::limits::clamp_concurrency;
use crate::source::{EvidenceSource, KnowledgeMatch};
use bughunt_model::RawDetection;
use bughunt_scanner::Candidate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Matches scoring below this floor are discarded
    pub min_score: f64,

    /// Matches kept per candidate
    pub top_k: usize,

    /// Queries in flight at once
    pub concurrency: usize,

    pub query_timeout: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            min_score: 0.5,
            top_k: 3,
            concurrency: 4,
            query_timeout: Duration::from_secs(10),
        }
    }
}

/// Detections gathered for one scan
#[derive(Debug, Clone, Default)]
pub struct RetrievalOutcome {
    /// Sorted by line, then score descending
    pub detections: Vec<RawDetection>,
    pub queried: usize,
    pub failed: usize,
}

/// Issues one knowledge query per candidate through a bounded worker pool
pub struct Retriever {
    source: Arc<dyn EvidenceSource>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(source: Arc<dyn EvidenceSource>, config: RetrieverConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Query every candidate and collect detections above the relevance floor.
    ///
    /// Returns once every query has completed or failed. Dropping the returned
    /// future aborts the queries still in flight.
    pub async fn retrieve(&self, candidates: &[Candidate]) -> RetrievalOutcome {
        let limit = clamp_concurrency(self.config.concurrency);
        let semaphore = Arc::new(Semaphore::new(limit));
        let timeout = self.config.query_timeout;
        let mut tasks = JoinSet::new();

        log::info!(
            "Querying {} ({} candidates, {} workers)",
            self.source.name(),
            candidates.len(),
            limit
        );

        for candidate in candidates.iter().cloned() {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let result = query_one(source.as_ref(), &semaphore, &candidate.text, timeout).await;
                (candidate, result)
            });
        }

        let mut outcome = RetrievalOutcome {
            queried: candidates.len(),
            ..Default::default()
        };

        while let Some(joined) = tasks.join_next().await {
            let (candidate, result) = match joined {
                Ok(pair) => pair,
                Err(err) => {
                    log::warn!("Retrieval task failed: {err}");
                    outcome.failed += 1;
                    continue;
                }
            };
            match result {
                Ok(matches) => {
                    let before = outcome.detections.len();
                    outcome
                        .detections
                        .extend(self.detections_for(&candidate, matches));
                    log::debug!(
                        "Line {}: {} matches above floor",
                        candidate.line,
                        outcome.detections.len() - before
                    );
                }
                Err(err) => {
                    log::warn!("Query for line {} failed: {err}", candidate.line);
                    outcome.failed += 1;
                }
            }
        }

        outcome.detections.sort_by(|a, b| {
            a.line
                .cmp(&b.line)
                .then_with(|| b.score.total_cmp(&a.score))
                .then_with(|| a.knowledge_text.cmp(&b.knowledge_text))
        });
        outcome
    }

    fn detections_for(&self, candidate: &Candidate, mut matches: Vec<KnowledgeMatch>) -> Vec<RawDetection> {
        matches.retain(|m| m.score.is_finite() && m.score >= self.config.min_score);
        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.text.cmp(&b.text)));
        matches.truncate(self.config.top_k.max(1));
        matches
            .into_iter()
            .map(|m| {
                let fields = KnowledgeFields::parse(&m.text);
                RawDetection::new(
                    candidate.line,
                    m.score.clamp(0.0, 1.0),
                    fields.bug_type_or_default(),
                    fields.signature_or_default(),
                    m.text,
                )
                .line_text(candidate.text.clone())
            })
            .collect()
    }
}

async fn query_one(
    source: &dyn EvidenceSource,
    semaphore: &Semaphore,
    text: &str,
    timeout: Duration,
) -> Result<Vec<KnowledgeMatch>> {
    let _permit = semaphore
        .acquire()
        .await
        .map_err(|err| KnowledgeError::Other(format!("retrieval pool closed: {err}")))?;
    match tokio::time::timeout(timeout, source.query(text)).await {
        Ok(result) => result,
        Err(_) => Err(KnowledgeError::Timeout(timeout.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedSource {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    /// Decrements the in-flight count when a query finishes or is dropped
    struct InFlight<'a>(&'a AtomicUsize);

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl EvidenceSource for ScriptedSource {
        async fn query(&self, text: &str) -> Result<Vec<KnowledgeMatch>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let _in_flight = InFlight(&self.in_flight);
            tokio::time::sleep(Duration::from_millis(20)).await;

            if text.contains("fail") {
                return Err(KnowledgeError::Other("boom".to_string()));
            }
            if text.contains("slow") {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(vec![
                KnowledgeMatch {
                    text: "Bug Type:\nAPI Misuse\nBug Signature:\niClamp".to_string(),
                    score: 0.9,
                },
                KnowledgeMatch {
                    text: "no headers here".to_string(),
                    score: 0.6,
                },
                KnowledgeMatch {
                    text: "Bug Signature:\nweak".to_string(),
                    score: 0.2,
                },
            ])
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn candidate(line: usize, text: &str) -> Candidate {
        Candidate {
            line,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn failures_and_timeouts_contribute_nothing() {
        let source = Arc::new(ScriptedSource::new());
        let retriever = Retriever::new(
            source,
            RetrieverConfig {
                query_timeout: Duration::from_millis(200),
                ..Default::default()
            },
        );

        let outcome = retriever
            .retrieve(&[
                candidate(9, "rdi.ok()"),
                candidate(2, "rdi.fail()"),
                candidate(5, "rdi.slow()"),
                candidate(3, "rdi.ok()"),
            ])
            .await;

        assert_eq!(outcome.queried, 4);
        assert_eq!(outcome.failed, 2);
        let lines: Vec<usize> = outcome.detections.iter().map(|d| d.line).collect();
        assert_eq!(lines, vec![3, 3, 9, 9]);
    }

    #[tokio::test]
    async fn floor_and_extraction_are_applied() {
        let retriever = Retriever::new(Arc::new(ScriptedSource::new()), RetrieverConfig::default());
        let outcome = retriever.retrieve(&[candidate(4, "rdi.dc()")]).await;

        assert_eq!(outcome.detections.len(), 2);
        let best = &outcome.detections[0];
        assert_eq!(best.bug_type, "API Misuse");
        assert_eq!(best.signature, "iClamp");
        assert_eq!(best.line_text, "rdi.dc()");

        let fallback = &outcome.detections[1];
        assert_eq!(fallback.bug_type, "Potential Bug");
        assert_eq!(fallback.signature, "Unknown Signature");
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let source = Arc::new(ScriptedSource::new());
        let retriever = Retriever::new(
            source.clone(),
            RetrieverConfig {
                concurrency: 2,
                ..Default::default()
            },
        );
        let candidates: Vec<Candidate> = (1..=8).map(|i| candidate(i, "rdi.x()")).collect();
        let outcome = retriever.retrieve(&candidates).await;

        assert_eq!(outcome.failed, 0);
        assert!(source.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn dropping_retrieval_aborts_queries_in_flight() {
        let source = Arc::new(ScriptedSource::new());
        let retriever = Retriever::new(source.clone(), RetrieverConfig::default());
        let candidates: Vec<Candidate> = (1..=3).map(|i| candidate(i, "rdi.slow()")).collect();

        let raced = tokio::time::timeout(Duration::from_millis(100), retriever.retrieve(&candidates)).await;
        assert!(raced.is_err());
        assert!(source.max_in_flight.load(Ordering::SeqCst) >= 1);

        // Aborted tasks are dropped on the runtime's next turn
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_candidates_is_not_an_error() {
        let retriever = Retriever::new(Arc::new(ScriptedSource::new()), RetrieverConfig::default());
        let outcome = retriever.retrieve(&[]).await;
        assert!(outcome.detections.is_empty());
        assert_eq!(outcome.failed, 0);
    }
}
