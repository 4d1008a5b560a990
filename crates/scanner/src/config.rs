use crate::error::{Result, ScannerError};
use serde::{Deserialize, Serialize};

/// Configuration for candidate scanning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Substrings that flag a line for evidence retrieval (case-sensitive)
    pub triggers: Vec<String>,

    /// Lines of surrounding context captured for a reported bug
    pub context_window: usize,

    /// Skip lines that are only a comment for the detected language
    pub skip_comments: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            triggers: vec![
                "rdi.".to_string(),
                "RDI_BEGIN".to_string(),
                "RDI_END".to_string(),
            ],
            context_window: 5,
            skip_comments: true,
        }
    }
}

impl ScannerConfig {
    /// Builder: replace trigger tokens
    #[must_use]
    pub fn triggers<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers = triggers.into_iter().map(Into::into).collect();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.triggers.is_empty() {
            return Err(ScannerError::invalid_config("at least one trigger is required"));
        }
        if self.triggers.iter().any(|t| t.trim().is_empty()) {
            return Err(ScannerError::invalid_config("triggers must not be blank"));
        }
        Ok(())
    }
}
