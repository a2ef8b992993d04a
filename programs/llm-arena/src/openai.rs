//! HTTP client for OpenAI-compatible chat completion endpoints.
//!
//! Implements [`DecisionService`] so language-model agents can be backed by
//! any server speaking the `/chat/completions` dialect.

use std::time::Duration;

use async_trait::async_trait;
use match_logic::{Credential, DecisionRequest, DecisionService};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Errors from chat completion calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("response contained no text")]
    EmptyReply,
}

/// Request body for `POST /chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

impl ChatResponse {
    /// Trimmed text of the first choice, if any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Chat completion client bound to one model.
#[derive(Debug)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiClient {
    pub fn from_config(cfg: &ServiceConfig) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        })
    }

    pub fn build_request(&self, request: &DecisionRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::new("system", request.system_prompt()),
                ChatMessage::new("user", request.user_prompt()),
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    /// Send a chat request and return the reply text.
    pub async fn chat(&self, api_key: &str, request: &ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_else(|_| "(no body)".into());

        map_response(status, retry_after.as_deref(), &body)
    }
}

/// Turn a finished HTTP exchange into the reply text or a typed error.
fn map_response(status: u16, retry_after: Option<&str>, body: &str) -> Result<String, LlmError> {
    if status == 429 {
        let retry_after = retry_after.and_then(|s| s.trim().parse::<u64>().ok());
        return Err(LlmError::RateLimited { retry_after });
    }

    if status >= 400 {
        return Err(LlmError::ApiError {
            status,
            message: body.to_string(),
        });
    }

    let resp: ChatResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;

    resp.text().map(str::to_string).ok_or(LlmError::EmptyReply)
}

#[async_trait]
impl DecisionService for OpenAiClient {
    async fn complete(
        &self,
        credential: &Credential,
        request: &DecisionRequest,
    ) -> anyhow::Result<String> {
        let chat = self.build_request(request);
        let reply = self.chat(credential.expose(), &chat).await?;
        tracing::debug!(round = request.round, %reply, "model replied");
        Ok(reply)
    }
}
