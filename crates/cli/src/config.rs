use anyhow::{bail, Context, Result};
use bughunt_knowledge::{clamp_concurrency, RetrieverConfig};
use bughunt_scanner::ScannerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "bughunt.toml";

/// Resolved scan settings: defaults, then TOML, then env/flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Persisted bug table
    pub table: PathBuf,

    /// Local knowledge file
    pub knowledge: PathBuf,

    /// Remote search endpoint; replaces the local file when set
    pub knowledge_url: Option<String>,

    pub min_score: f64,
    pub top_k: usize,
    pub concurrency: usize,
    pub query_timeout_ms: u64,
    pub triggers: Vec<String>,
    pub context_window: usize,
    pub explain: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let retriever = RetrieverConfig::default();
        let scanner = ScannerConfig::default();
        Self {
            table: PathBuf::from("output.csv"),
            knowledge: PathBuf::from("knowledge.json"),
            knowledge_url: None,
            min_score: retriever.min_score,
            top_k: retriever.top_k,
            concurrency: retriever.concurrency,
            query_timeout_ms: retriever.query_timeout.as_millis() as u64,
            triggers: scanner.triggers,
            context_window: scanner.context_window,
            explain: true,
        }
    }
}

/// Values supplied on the command line or through `BUGHUNT_*` variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub table: Option<PathBuf>,
    pub knowledge: Option<PathBuf>,
    pub knowledge_url: Option<String>,
    pub min_score: Option<f64>,
    pub top_k: Option<usize>,
    pub concurrency: Option<usize>,
    pub query_timeout_ms: Option<u64>,
    pub triggers: Vec<String>,
    pub context_window: Option<usize>,
    pub no_explain: bool,
}

impl ScanConfig {
    /// Load the TOML layer. An explicit path must exist; the default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default_path.exists() {
                    return Ok(Self::default());
                }
                default_path
            }
        };

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(table) = overrides.table {
            self.table = table;
        }
        if let Some(knowledge) = overrides.knowledge {
            self.knowledge = knowledge;
        }
        if let Some(url) = overrides.knowledge_url.filter(|url| !url.trim().is_empty()) {
            self.knowledge_url = Some(url);
        }
        if let Some(min_score) = overrides.min_score {
            self.min_score = min_score;
        }
        if let Some(top_k) = overrides.top_k {
            self.top_k = top_k;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(timeout) = overrides.query_timeout_ms {
            self.query_timeout_ms = timeout;
        }
        if !overrides.triggers.is_empty() {
            self.triggers = overrides.triggers;
        }
        if let Some(window) = overrides.context_window {
            self.context_window = window;
        }
        if overrides.no_explain {
            self.explain = false;
        }
        self
    }

    /// Reject unusable values; clamp the worker count
    pub fn validate(mut self) -> Result<Self> {
        if !(0.0..=1.0).contains(&self.min_score) {
            bail!("min_score must be within [0, 1], got {}", self.min_score);
        }
        if self.top_k == 0 {
            bail!("top_k must be at least 1");
        }
        if self.query_timeout_ms == 0 {
            bail!("query_timeout_ms must be positive");
        }
        self.concurrency = clamp_concurrency(self.concurrency);
        self.scanner_config()
            .validate()
            .context("Invalid trigger configuration")?;
        Ok(self)
    }

    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            context_window: self.context_window,
            ..ScannerConfig::default()
        }
        .triggers(self.triggers.iter().cloned())
    }

    pub fn retriever_config(&self) -> RetrieverConfig {
        RetrieverConfig {
            min_score: self.min_score,
            top_k: self.top_k,
            concurrency: self.concurrency,
            query_timeout: self.query_timeout(),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}
