//! # haven-llm
//!
//! HTTP transport to the remote LLM endpoint.
//!
//! The endpoint is a stateless processor: it receives an assembled prompt
//! payload and returns text. It never receives keys or ciphertext. Two call
//! shapes exist: a streaming chat completion (conversation turns, folded
//! from typed events) and a single non-streaming completion used by the
//! memory extraction pipeline, which expects a JSON-only response.

pub mod events;
pub mod json;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::events::{StreamAccumulator, StreamEvent, StreamOutcome};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM endpoint returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("LLM response contained no text")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, LlmError>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// LLM endpoint configuration loaded from environment variables.
///
/// All settings have defaults so local development works with only an API
/// key exported.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Chat-completion endpoint URL.
    /// Env: `HAVEN_LLM_ENDPOINT`
    pub endpoint: String,

    /// Model identifier sent with every request.
    /// Env: `HAVEN_LLM_MODEL`
    pub model: String,

    /// Bearer/API key. Env: `HAVEN_LLM_API_KEY`
    pub api_key: Option<String>,

    /// Default max_tokens for conversation calls.
    /// Env: `HAVEN_LLM_MAX_TOKENS`
    pub max_tokens: u32,

    /// Whole-request timeout. Env: `HAVEN_LLM_TIMEOUT_SECS`
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-3-5-sonnet-latest".to_string(),
            api_key: None,
            max_tokens: 1024,
            request_timeout: Duration::from_secs(90),
        }
    }
}

impl LlmConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(endpoint) = std::env::var("HAVEN_LLM_ENDPOINT") {
            config.endpoint = endpoint;
        }

        if let Ok(model) = std::env::var("HAVEN_LLM_MODEL") {
            config.model = model;
        }

        if let Ok(key) = std::env::var("HAVEN_LLM_API_KEY") {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }

        if let Ok(val) = std::env::var("HAVEN_LLM_MAX_TOKENS") {
            if let Ok(n) = val.parse::<u32>() {
                config.max_tokens = n;
            } else {
                tracing::warn!(value = %val, "Invalid HAVEN_LLM_MAX_TOKENS, using default");
            }
        }

        if let Ok(val) = std::env::var("HAVEN_LLM_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.request_timeout = Duration::from_secs(secs);
            }
        }

        config
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Specification of a tool the model may request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// One chat-completion request: `{model, max_tokens, system, messages[],
/// tools?}`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<ChatTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSpec>>,
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Transport seam so the extraction pipeline and messaging flow can be
/// tested with a scripted fake instead of the network.
#[async_trait]
pub trait LlmTransport: Send + Sync {
    /// Single non-streaming call; returns the full response text.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;

    /// Streaming call; forwards each typed event over `tx` while folding
    /// the stream into the final outcome.
    async fn stream(
        &self,
        request: &ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<StreamOutcome>;
}

/// reqwest-backed client for the real endpoint.
#[derive(Debug, Clone)]
pub struct HttpLlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpLlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn request(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(&self.config.endpoint)
            .header("anthropic-version", "2023-06-01")
            .json(body);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("x-api-key", key);
        }
        builder
    }
}

#[async_trait]
impl LlmTransport for HttpLlmClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let body = serde_json::to_value(request).unwrap_or_default();

        let response = self.request(&body).send().await?;
        let status = response.status();
        let payload: serde_json::Value = response.json().await?;

        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: payload.to_string(),
            });
        }

        // Response content is an array of typed blocks; concatenate the
        // text ones.
        let text = payload
            .get("content")
            .and_then(|c| c.as_array())
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }

    async fn stream(
        &self,
        request: &ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<StreamOutcome> {
        let mut body = serde_json::to_value(request).unwrap_or_default();
        body["stream"] = serde_json::Value::Bool(true);

        let mut response = self.request(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let payload: serde_json::Value = response.json().await?;
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: payload.to_string(),
            });
        }

        let mut accumulator = StreamAccumulator::new();
        // SSE frames can split across chunks; keep the tail until its
        // newline arrives.
        let mut pending = String::new();

        while let Some(chunk) = response.chunk().await? {
            pending.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline) = pending.find('\n') {
                let line = pending[..newline].trim().to_string();
                pending.drain(..=newline);

                if line.is_empty() || line == "data: [DONE]" {
                    continue;
                }
                if let Some(data) = line.strip_prefix("data: ") {
                    if let Some(event) = accumulator.feed(data) {
                        let _ = tx.send(event).await;
                    }
                }
            }
        }

        Ok(accumulator.finish())
    }
}
