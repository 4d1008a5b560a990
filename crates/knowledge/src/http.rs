use crate::error::{KnowledgeError, Result};
use crate::source::{EvidenceSource, KnowledgeMatch};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    List(Vec<KnowledgeMatch>),
    Wrapped { results: Vec<KnowledgeMatch> },
}

impl SearchResponse {
    fn into_matches(self) -> Vec<KnowledgeMatch> {
        match self {
            SearchResponse::List(matches) | SearchResponse::Wrapped { results: matches } => matches,
        }
    }
}

/// Remote knowledge-base search service.
///
/// `POST {url}` with `{"query": ..., "top_k": ...}`; the response is either a
/// bare `[{"text", "score"}]` array or `{"results": [...]}`.
pub struct HttpKnowledgeBase {
    client: Client,
    url: String,
    top_k: usize,
}

impl HttpKnowledgeBase {
    pub fn new(url: impl Into<String>, top_k: usize, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| KnowledgeError::Other(format!("build HTTP client: {err}")))?;
        Ok(Self {
            client,
            url: url.into(),
            top_k: top_k.max(1),
        })
    }
}

#[async_trait]
impl EvidenceSource for HttpKnowledgeBase {
    async fn query(&self, text: &str) -> Result<Vec<KnowledgeMatch>> {
        let response = self
            .client
            .post(&self.url)
            .json(&SearchRequest {
                query: text,
                top_k: self.top_k,
            })
            .send()
            .await?
            .error_for_status()?;

        let mut matches = response.json::<SearchResponse>().await?.into_matches();
        matches.retain(|m| m.score.is_finite());
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(self.top_k);
        Ok(matches)
    }

    fn name(&self) -> &str {
        &self.url
    }
}
