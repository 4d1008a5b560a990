use crate::config::ScanConfig;
use anyhow::{Context, Result};
use bughunt_explain::{explain_record, Explainer};
use bughunt_identity::{consolidate, MemoryResolver};
use bughunt_knowledge::{
    EvidenceSource, HttpKnowledgeBase, KnowledgeFields, LocalKnowledgeBase, Retriever,
};
use bughunt_model::{BugRecord, MemoryDecision};
use bughunt_report::{persisted_records, ApplyStats, ReportStore};
use bughunt_scanner::{block_context, Language, SourceFile};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Pick the evidence source: remote endpoint when configured, else the local file
pub async fn open_source(config: &ScanConfig) -> Result<Arc<dyn EvidenceSource>> {
    if let Some(url) = config.knowledge_url.as_deref() {
        let source = HttpKnowledgeBase::new(url, config.top_k, config.query_timeout())
            .with_context(|| format!("Failed to configure knowledge endpoint {url}"))?;
        return Ok(Arc::new(source));
    }
    let source = LocalKnowledgeBase::open(&config.knowledge, config.top_k)
        .await
        .with_context(|| {
            format!(
                "Failed to load knowledge file {} (build one with `bughunt ingest`)",
                config.knowledge.display()
            )
        })?;
    Ok(Arc::new(source))
}

/// What the analysis stage found, before anything is persisted
#[derive(Debug)]
pub struct Analysis {
    pub file: SourceFile,
    pub candidates: usize,
    pub queried: usize,
    pub failed: usize,
    pub suppressed_groups: usize,
    pub bug: Option<BugRecord>,
}

/// One line of the reported bug together with its current source text
#[derive(Debug, Clone, Serialize)]
pub struct ReportedLine {
    pub line: usize,
    pub text: Option<String>,
}

/// Final result of one scan
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub file: PathBuf,
    pub language: String,
    pub candidates: usize,
    pub queried: usize,
    pub failed_queries: usize,
    pub suppressed_groups: usize,
    pub decision: Option<MemoryDecision>,
    pub lines: Vec<ReportedLine>,
    pub stats: Option<ApplyStats>,
    pub table: PathBuf,
}

impl ScanReport {
    fn clean(analysis: &Analysis, table: &Path) -> Self {
        Self {
            file: analysis.file.path.clone(),
            language: analysis.file.language.display_name().to_string(),
            candidates: analysis.candidates,
            queried: analysis.queried,
            failed_queries: analysis.failed,
            suppressed_groups: analysis.suppressed_groups,
            decision: None,
            lines: Vec::new(),
            stats: None,
            table: table.to_path_buf(),
        }
    }
}

/// Scan, retrieve, consolidate and explain; then resolve and persist under the store lock
pub struct Pipeline {
    config: ScanConfig,
    source: Arc<dyn EvidenceSource>,
    explainer: Arc<dyn Explainer>,
    store: ReportStore,
    resolver: MemoryResolver,
}

impl Pipeline {
    pub fn new(
        config: ScanConfig,
        source: Arc<dyn EvidenceSource>,
        explainer: Arc<dyn Explainer>,
    ) -> Self {
        let store = ReportStore::new(config.table.clone());
        Self {
            config,
            source,
            explainer,
            store,
            resolver: MemoryResolver::new(),
        }
    }

    /// Everything up to the point of touching storage. Safe to cancel.
    pub async fn analyze(&self, path: &Path) -> Result<Analysis> {
        let file = SourceFile::load(path)
            .with_context(|| format!("Cannot scan {}", path.display()))?;
        let scanner = self.config.scanner_config();
        let candidates = file.candidates(&scanner);
        log::info!(
            "{}: {} candidate line(s) ({})",
            file.path.display(),
            candidates.len(),
            file.language
        );

        let mut analysis = Analysis {
            candidates: candidates.len(),
            queried: 0,
            failed: 0,
            suppressed_groups: 0,
            bug: None,
            file,
        };
        if candidates.is_empty() {
            return Ok(analysis);
        }

        let retriever = Retriever::new(Arc::clone(&self.source), self.config.retriever_config());
        let outcome = retriever.retrieve(&candidates).await;
        analysis.queried = outcome.queried;
        analysis.failed = outcome.failed;
        log::info!(
            "{} detection(s) from {} queries ({} failed)",
            outcome.detections.len(),
            outcome.queried,
            outcome.failed
        );

        let Some(consolidated) = consolidate(outcome.detections) else {
            return Ok(analysis);
        };
        analysis.suppressed_groups = consolidated.suppressed_groups;

        let fields = KnowledgeFields::parse(&consolidated.representative.knowledge_text);
        let mut record = enrich(consolidated.record, &fields, &analysis.file, scanner.context_window);
        let fallback = fields
            .explanation
            .clone()
            .unwrap_or_else(|| consolidated.representative.knowledge_text.clone());
        explain_record(
            self.explainer.as_ref(),
            &mut record,
            &consolidated.representative.knowledge_text,
            &fallback,
        )
        .await;

        analysis.bug = Some(record);
        Ok(analysis)
    }

    /// Resolve the analyzed bug against the table and apply the decision
    pub async fn persist(&self, analysis: Analysis) -> Result<ScanReport> {
        let mut report = ScanReport::clean(&analysis, self.store.path());
        let Some(record) = analysis.bug else {
            return Ok(report);
        };

        let guard = self.store.lock().await.with_context(|| {
            format!("Failed to lock bug table {}", self.store.path().display())
        })?;
        let snapshot = guard
            .snapshot()
            .await
            .with_context(|| format!("Failed to read {}", self.store.path().display()))?;
        let persisted = persisted_records(&snapshot);
        let decision = self
            .resolver
            .resolve(record, &persisted)
            .context("Bug record failed validation")?;
        let stats = guard
            .apply(std::slice::from_ref(&decision))
            .await
            .with_context(|| format!("Failed to write {}", self.store.path().display()))?;

        report.lines = decision
            .merged_lines
            .iter()
            .map(|&line| ReportedLine {
                line,
                text: analysis.file.line(line).map(|text| text.trim().to_string()),
            })
            .collect();
        report.decision = Some(decision);
        report.stats = Some(stats);
        Ok(report)
    }
}

/// Fill the descriptive fields of a consolidated record from the winning knowledge text
fn enrich(
    mut record: BugRecord,
    fields: &KnowledgeFields,
    file: &SourceFile,
    context_window: usize,
) -> BugRecord {
    record.language = match (file.language, fields.language.as_deref()) {
        (Language::Unknown, Some(language)) => language.to_string(),
        (language, _) => language.display_name().to_string(),
    };
    record.correct_reference = fields.correct_code.clone();
    record.context = fields.context.clone().or_else(|| {
        record
            .line_numbers
            .first()
            .map(|&line| block_context(&file.content, line, context_window))
    });
    record
}
