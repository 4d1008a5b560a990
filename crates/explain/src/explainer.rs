use crate::client::{ChatClient, ClientSettings};
use crate::error::{ExplainError, Result};
use crate::prompt::build_prompt;
use async_trait::async_trait;
use bughunt_model::{BugRecord, Origin};
use std::sync::Arc;

/// Narrow capability: turn a prompt into explanation text
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, prompt: &str) -> Result<String>;

    fn name(&self) -> &str;
}

/// Explainer used when no token is configured or explanations are turned off
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledExplainer;

#[async_trait]
impl Explainer for DisabledExplainer {
    async fn explain(&self, _prompt: &str) -> Result<String> {
        Err(ExplainError::Disabled)
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Pick the chat client when a token is present, otherwise the disabled explainer
pub fn build_explainer(enabled: bool, settings: &ClientSettings) -> Arc<dyn Explainer> {
    if !enabled {
        return Arc::new(DisabledExplainer);
    }
    match ChatClient::new(settings) {
        Ok(client) => {
            log::info!(
                "Explanations via {:?} model {}",
                client.provider(),
                client.model()
            );
            Arc::new(client)
        }
        Err(ExplainError::Disabled) => {
            log::info!("No API token configured; using knowledge-base explanations");
            Arc::new(DisabledExplainer)
        }
        Err(err) => {
            log::warn!("Failed to build chat client: {err}");
            Arc::new(DisabledExplainer)
        }
    }
}

/// Fill `record.explanation`.
///
/// Success marks the record as generative. Failure leaves the origin as
/// knowledge-base and stores `fallback` (or nothing when it is blank).
/// Identity fields are never touched.
pub async fn explain_record(
    explainer: &dyn Explainer,
    record: &mut BugRecord,
    evidence: &str,
    fallback: &str,
) {
    let prompt = build_prompt(record, evidence);
    match explainer.explain(&prompt).await {
        Ok(text) => {
            record.explanation = Some(text);
            record.origin = Origin::Generative;
        }
        Err(ExplainError::Disabled) => apply_fallback(record, fallback),
        Err(err) => {
            log::warn!("Explanation via {} failed: {err}", explainer.name());
            apply_fallback(record, fallback);
        }
    }
}

fn apply_fallback(record: &mut BugRecord, fallback: &str) {
    let fallback = fallback.trim();
    record.explanation = (!fallback.is_empty()).then(|| fallback.to_string());
    record.origin = Origin::KnowledgeBase;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Canned(Result<String>);

    #[async_trait]
    impl Explainer for Canned {
        async fn explain(&self, _prompt: &str) -> Result<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(ExplainError::EmptyResponse),
            }
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn record() -> BugRecord {
        BugRecord::new("API Misuse", "iclamp+rdi").lines([4])
    }

    #[tokio::test]
    async fn success_marks_generative() {
        let mut bug = record();
        let explainer = Canned(Ok("Clamp is set too high.".to_string()));
        explain_record(&explainer, &mut bug, "evidence", "fallback").await;

        assert_eq!(bug.explanation.as_deref(), Some("Clamp is set too high."));
        assert_eq!(bug.origin, Origin::Generative);
        assert_eq!(bug.signature, "iclamp+rdi");
    }

    #[tokio::test]
    async fn failure_falls_back_to_knowledge() {
        let mut bug = record();
        let explainer = Canned(Err(ExplainError::EmptyResponse));
        explain_record(&explainer, &mut bug, "evidence", " From the knowledge base ").await;

        assert_eq!(bug.explanation.as_deref(), Some("From the knowledge base"));
        assert_eq!(bug.origin, Origin::KnowledgeBase);
    }

    #[tokio::test]
    async fn disabled_with_blank_fallback_leaves_no_explanation() {
        let mut bug = record();
        explain_record(&DisabledExplainer, &mut bug, "evidence", "  ").await;
        assert_eq!(bug.explanation, None);
        assert_eq!(bug.origin, Origin::KnowledgeBase);
    }

    #[test]
    fn build_explainer_without_token_is_disabled() {
        let explainer = build_explainer(true, &ClientSettings::default());
        assert_eq!(explainer.name(), "disabled");
        let explainer = build_explainer(
            false,
            &ClientSettings {
                token: Some("hf_x".to_string()),
                ..ClientSettings::default()
            },
        );
        assert_eq!(explainer.name(), "disabled");
    }
}
