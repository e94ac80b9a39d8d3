//! Chat completions client
//!
//! Talks to an OpenAI-compatible `/v1/chat/completions` endpoint (vLLM,
//! SGLang, hosted APIs). Tool calls travel as text inside the completion, so
//! the request carries only messages and sampling settings.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmSettings;

/// A message in a chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user", "assistant"
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Error type for chat operations
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Model API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Empty response from model")]
    EmptyResponse,
}

impl ChatError {
    /// Whether asking again with the same conversation may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ChatError::Request(e) => !e.is_builder(),
            ChatError::Status { status, .. } => *status == 429 || *status >= 500,
            ChatError::Parse(_) => false,
            ChatError::EmptyResponse => true,
        }
    }
}

/// Something that turns a conversation into the next model output
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Model identifier, used for logs and metrics
    fn model(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    top_p: f32,
    presence_penalty: f32,
    stop: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generation stops before the model starts writing an observation itself
pub const STOP_SEQUENCES: [&str; 2] = ["\n<tool_response>", "<tool_response>"];

/// Client for an OpenAI-compatible chat completions endpoint
#[derive(Clone)]
pub struct ChatClient {
    endpoint: String,
    settings: LlmSettings,
    client: reqwest::Client,
}

impl ChatClient {
    /// Create a new chat client with a bounded per-request timeout
    pub fn new(settings: LlmSettings) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: completions_url(&settings.base_url),
            settings,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let body = CompletionRequest {
            model: &self.settings.model,
            messages,
            temperature: self.settings.temperature,
            top_p: self.settings.top_p,
            presence_penalty: self.settings.presence_penalty,
            stop: &STOP_SEQUENCES,
            max_tokens: self.settings.max_tokens,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ChatError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        parse_completion(&text)
    }
}

fn completions_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{}/chat/completions", base)
    } else {
        format!("{}/v1/chat/completions", base)
    }
}

/// Pull the first choice's text out of a completion body
fn parse_completion(body: &str) -> Result<String, ChatError> {
    if body.trim().is_empty() {
        return Err(ChatError::EmptyResponse);
    }
    let response: CompletionResponse = serde_json::from_str(body)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(ChatError::EmptyResponse)
}
