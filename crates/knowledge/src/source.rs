use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One ranked knowledge item returned for a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeMatch {
    pub text: String,
    /// Relevance in [0, 1]
    pub score: f64,
}

/// The only capability the retriever has over a knowledge base: ask a question.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    /// Ranked matches for `text`, best first. An empty list is a valid answer.
    async fn query(&self, text: &str) -> Result<Vec<KnowledgeMatch>>;

    /// Short label for logs
    fn name(&self) -> &str;
}
