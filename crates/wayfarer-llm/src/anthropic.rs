//! Anthropic Messages API client.
//!
//! Non-streaming: one POST per completion, text blocks concatenated.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wayfarer_core::config::{secret, LlmConfig};
use wayfarer_core::{Message, Role};

use crate::error::LlmError;
use crate::CompletionService;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Completion service backed by the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicCompletion {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

/// Builder for [`AnthropicCompletion`].
pub struct AnthropicCompletionBuilder {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    request_timeout: Duration,
}

impl AnthropicCompletionBuilder {
    pub fn new(api_key: impl Into<String>) -> Self {
        let defaults = LlmConfig::default();
        Self {
            api_key: api_key.into(),
            base_url: defaults.base_url,
            model: defaults.model,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            request_timeout: Duration::from_secs(defaults.timeout_secs),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<AnthropicCompletion, LlmError> {
        let http = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| LlmError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(AnthropicCompletion {
            http,
            api_key: self.api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            model: self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        })
    }
}

impl AnthropicCompletion {
    pub fn builder(api_key: impl Into<String>) -> AnthropicCompletionBuilder {
        AnthropicCompletionBuilder::new(api_key)
    }

    /// Build a client from config, reading the key from `config.api_key_env`.
    ///
    /// `temperature` overrides the config value so the same settings can
    /// produce both the deterministic and the conversational client.
    pub fn from_config(config: &LlmConfig, temperature: f32) -> Result<Self, LlmError> {
        let api_key = secret(&config.api_key_env)
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;
        Self::builder(api_key)
            .base_url(config.base_url.clone())
            .model(config.model.clone())
            .max_tokens(config.max_tokens)
            .temperature(temperature)
            .request_timeout(Duration::from_secs(config.timeout_secs))
            .build()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request<'a>(&'a self, system: &'a str, turns: &'a [Message]) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: (!system.is_empty()).then_some(system),
            messages: turns
                .iter()
                .map(|m| WireMessage {
                    role: match m.role {
                        Role::Human => "user",
                        Role::Assistant => "assistant",
                    },
                    content: &m.content,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl CompletionService for AnthropicCompletion {
    async fn complete(&self, system: &str, turns: &[Message]) -> Result<String, LlmError> {
        if turns.is_empty() {
            return Err(LlmError::EmptyConversation);
        }

        let body = self.build_request(system, turns);
        tracing::debug!(model = %self.model, turns = turns.len(), "Sending completion request");

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            tracing::warn!(status = status.as_u16(), "Completion request rejected");
            return Err(LlmError::from_http_status(status.as_u16(), text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        extract_text(parsed)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

fn extract_text(response: MessagesResponse) -> Result<String, LlmError> {
    let text: String = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        Err(LlmError::EmptyResponse)
    } else {
        Ok(text)
    }
}
