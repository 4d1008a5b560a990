use crate::error::{KnowledgeError, Result};
use crate::extract::KnowledgeFields;
use crate::source::{EvidenceSource, KnowledgeMatch};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

pub const KNOWLEDGE_SCHEMA_VERSION: u32 = 1;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap_or_else(|_| unreachable!("static regex"))
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: String,
    pub text: String,
}

/// Knowledge documents as persisted in the local knowledge file
#[derive(Debug, Clone, Default)]
pub struct KnowledgeCorpus {
    documents: Vec<KnowledgeDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedKnowledge {
    schema_version: u32,
    documents: Vec<KnowledgeDocument>,
}

impl KnowledgeCorpus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_documents(documents: Vec<KnowledgeDocument>) -> Self {
        Self { documents }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let persisted: PersistedKnowledge = serde_json::from_slice(&bytes)?;
        if persisted.schema_version != KNOWLEDGE_SCHEMA_VERSION {
            return Err(KnowledgeError::SchemaVersion {
                found: persisted.schema_version,
                expected: KNOWLEDGE_SCHEMA_VERSION,
            });
        }
        log::info!(
            "Loaded {} knowledge documents from {}",
            persisted.documents.len(),
            path.display()
        );
        Ok(Self {
            documents: persisted.documents,
        })
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let persisted = PersistedKnowledge {
            schema_version: KNOWLEDGE_SCHEMA_VERSION,
            documents: self.documents.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&persisted)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    pub fn push(&mut self, document: KnowledgeDocument) {
        self.documents.push(document);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    #[must_use]
    pub fn documents(&self) -> &[KnowledgeDocument] {
        &self.documents
    }
}

struct IndexedDocument {
    text: String,
    tokens: BTreeSet<String>,
}

/// In-process knowledge base scored by identifier overlap.
///
/// A document scores the fraction of the query's identifiers that appear in
/// its buggy-code section (or in the whole text when there is none).
pub struct LocalKnowledgeBase {
    documents: Vec<IndexedDocument>,
    top_k: usize,
}

impl LocalKnowledgeBase {
    pub fn new(corpus: &KnowledgeCorpus, top_k: usize) -> Self {
        let documents = corpus
            .documents()
            .iter()
            .map(|doc| {
                let fields = KnowledgeFields::parse(&doc.text);
                let haystack = fields.buggy_code.as_deref().unwrap_or(&doc.text);
                IndexedDocument {
                    text: doc.text.clone(),
                    tokens: identifier_tokens(haystack),
                }
            })
            .collect();
        Self {
            documents,
            top_k: top_k.max(1),
        }
    }

    pub async fn open(path: impl AsRef<Path>, top_k: usize) -> Result<Self> {
        let corpus = KnowledgeCorpus::load(path).await?;
        Ok(Self::new(&corpus, top_k))
    }

    fn search(&self, text: &str) -> Vec<KnowledgeMatch> {
        let query = identifier_tokens(text);
        if query.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = self
            .documents
            .iter()
            .enumerate()
            .filter_map(|(idx, doc)| {
                let hits = query.intersection(&doc.tokens).count();
                (hits > 0).then(|| (idx, hits as f64 / query.len() as f64))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored
            .into_iter()
            .take(self.top_k)
            .map(|(idx, score)| KnowledgeMatch {
                text: self.documents[idx].text.clone(),
                score,
            })
            .collect()
    }
}

#[async_trait]
impl EvidenceSource for LocalKnowledgeBase {
    async fn query(&self, text: &str) -> Result<Vec<KnowledgeMatch>> {
        Ok(self.search(text))
    }

    fn name(&self) -> &str {
        "local"
    }
}

fn identifier_tokens(text: &str) -> BTreeSet<String> {
    IDENTIFIER
        .find_iter(text)
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect()
}
