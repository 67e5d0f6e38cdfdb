use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const NO_RESPONSE: &str = "No response generated.";

#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout: Duration,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            max_tokens: 600,
            temperature: 0.3,
            top_p: 0.9,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("no API key configured for the completion service")]
    MissingApiKey,

    #[error("completion request timed out after {0:?}")]
    Timeout(Duration),

    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// A hosted chat-completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: usize,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl CompletionResponse {
    fn into_reply(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| NO_RESPONSE.to_string())
    }
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    config: LLMConfig,
}

impl OpenAiCompatibleClient {
    pub fn new(config: LLMConfig) -> Result<Self, CompletionError> {
        if config.api_key.as_deref().is_none_or(|key| key.trim().is_empty()) {
            return Err(CompletionError::MissingApiKey);
        }

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    async fn send(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            top_p: self.config.top_p,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status: status.as_u16(), body });
        }

        let parsed: CompletionResponse = response.json().await?;
        Ok(parsed.into_reply())
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        debug!(
            "Sending {} messages to {} ({})",
            messages.len(),
            self.config.base_url,
            self.config.model
        );

        let reply = tokio::time::timeout(self.config.timeout, self.send(messages))
            .await
            .map_err(|_| CompletionError::Timeout(self.config.timeout))??;

        debug!("Completion received, length: {}", reply.len());
        Ok(reply)
    }
}
