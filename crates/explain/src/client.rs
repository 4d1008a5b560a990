use crate::error::{ExplainError, Result};
use crate::explainer::Explainer;
use crate::prompt::SYSTEM_PROMPT;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const HF_ROUTER_URL: &str = "https://router.huggingface.co/v1/chat/completions";
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_TOKENS: u32 = 512;

/// Hosted chat-completion provider, detected from the token prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    HuggingFace,
    Groq,
    OpenAi,
}

impl Provider {
    pub fn detect(token: &str) -> Self {
        if token.starts_with("hf_") {
            Self::HuggingFace
        } else if token.starts_with("gsk_") {
            Self::Groq
        } else {
            Self::OpenAi
        }
    }

    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::HuggingFace => HF_ROUTER_URL,
            Self::Groq => GROQ_URL,
            Self::OpenAi => OPENAI_URL,
        }
    }

    pub const fn default_model(self) -> &'static str {
        match self {
            Self::HuggingFace => "HuggingFaceH4/zephyr-7b-beta",
            Self::Groq => "llama-3.1-8b-instant",
            Self::OpenAi => "gpt-3.5-turbo",
        }
    }
}

/// Connection settings for [`ChatClient`]
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    pub token: Option<String>,
    pub model_id: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl ClientSettings {
    /// Read token, model and endpoint overrides from the environment
    pub fn from_env() -> Self {
        let token = ["HF_TOKEN", "GROQ_API_KEY", "OPENAI_API_KEY"]
            .iter()
            .find_map(|key| non_empty_env(key));
        let model_id = non_empty_env("BUGHUNT_MODEL_ID").or_else(|| non_empty_env("HF_MODEL_ID"));
        Self {
            token,
            model_id,
            base_url: non_empty_env("OPENAI_BASE_URL"),
            timeout: None,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client
pub struct ChatClient {
    http: reqwest::Client,
    token: String,
    endpoint: String,
    model: String,
    provider: Provider,
}

impl ChatClient {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let token = settings.token.clone().ok_or(ExplainError::Disabled)?;
        let provider = Provider::detect(&token);
        let endpoint = settings
            .base_url
            .as_deref()
            .map(chat_endpoint)
            .unwrap_or_else(|| provider.endpoint().to_string());
        let model = settings
            .model_id
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());
        let http = reqwest::Client::builder()
            .timeout(settings.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        Ok(Self {
            http,
            token,
            endpoint,
            model,
            provider,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Accept either a full endpoint or an API base such as `http://host/v1`
fn chat_endpoint(base: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/chat/completions")
    }
}

#[async_trait]
impl Explainer for ChatClient {
    async fn explain(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.2,
        };

        log::debug!("Requesting explanation from {} ({})", self.endpoint, self.model);
        let response: ChatResponse = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(ExplainError::EmptyResponse)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn provider_follows_token_prefix() {
        assert_eq!(Provider::detect("hf_abc"), Provider::HuggingFace);
        assert_eq!(Provider::detect("gsk_abc"), Provider::Groq);
        assert_eq!(Provider::detect("sk-abc"), Provider::OpenAi);
    }

    #[test]
    fn client_defaults_follow_provider() {
        let settings = ClientSettings {
            token: Some("gsk_test".to_string()),
            ..ClientSettings::default()
        };
        let client = ChatClient::new(&settings).unwrap();
        assert_eq!(client.provider(), Provider::Groq);
        assert_eq!(client.model(), "llama-3.1-8b-instant");
        assert_eq!(client.endpoint(), GROQ_URL);
    }

    #[test]
    fn base_url_override_gets_chat_path() {
        let settings = ClientSettings {
            token: Some("sk-test".to_string()),
            model_id: Some("local-model".to_string()),
            base_url: Some("http://127.0.0.1:8080/v1/".to_string()),
            timeout: None,
        };
        let client = ChatClient::new(&settings).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:8080/v1/chat/completions");
        assert_eq!(client.model(), "local-model");
        assert_eq!(
            chat_endpoint("http://h/v1/chat/completions"),
            "http://h/v1/chat/completions"
        );
    }

    #[test]
    fn missing_token_is_disabled() {
        let err = ChatClient::new(&ClientSettings::default()).err();
        assert!(matches!(err, Some(ExplainError::Disabled)));
    }
}
