//! Reasoning engine client.
//!
//! The orchestration loop talks to the engine through the [`ReasoningEngine`]
//! trait: one opaque call taking the system prompt, the tool schema, and the
//! message history, returning either text or tool-invocation requests. The
//! production implementation is an HTTP client for the Anthropic Messages
//! API; tests script the trait directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// One tool made available to the engine.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content on the engine wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

/// One turn of conversation history.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// A user turn containing a single text block.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }
}

/// The engine's reply: an ordered list of content blocks.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub content: Vec<ContentBlock>,
}

impl EngineResponse {
    /// Tool-invocation requests in the order the engine emitted them.
    pub fn tool_uses(&self) -> Vec<(String, String, Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.clone(), name.clone(), input.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// All text segments concatenated.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Engine call failures. `Unavailable` maps to a retryable 503 at the
/// transport layer; everything else is terminal for the request.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("reasoning engine unavailable: {0}")]
    Unavailable(String),

    #[error("reasoning engine returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid engine response: {0}")]
    InvalidResponse(String),

    #[error("engine configuration error: {0}")]
    Config(String),
}

/// Opaque reasoning call: prompt + tools + history in, content blocks out.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        tools: &[ToolDefinition],
        messages: &[Message],
    ) -> Result<EngineResponse, EngineError>;
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    tools: &'a [ToolDefinition],
    messages: &'a [Message],
}

/// HTTP client for the Anthropic Messages API.
pub struct ClaudeEngine {
    http_client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeEngine {
    /// Build a client from configuration. The API key comes from the config
    /// file or the `ANTHROPIC_API_KEY` environment variable.
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let api_key = match &config.api_key {
            Some(key) if !key.is_empty() => key.clone(),
            _ => std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
                EngineError::Config(
                    "api key must be set in [engine] config or ANTHROPIC_API_KEY".to_string(),
                )
            })?,
        };

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    /// Convert the raw response body into content blocks, skipping block
    /// types this client does not model.
    fn parse_content(value: &Value) -> Result<Vec<ContentBlock>, EngineError> {
        let blocks = value
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                EngineError::InvalidResponse("response has no content array".to_string())
            })?;

        let mut content = Vec::with_capacity(blocks.len());
        for block in blocks {
            match serde_json::from_value::<ContentBlock>(block.clone()) {
                Ok(parsed) => content.push(parsed),
                Err(_) => {
                    let kind = block
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    warn!("Skipping unsupported content block type: {}", kind);
                }
            }
        }
        Ok(content)
    }
}

#[async_trait]
impl ReasoningEngine for ClaudeEngine {
    async fn complete(
        &self,
        system_prompt: &str,
        tools: &[ToolDefinition],
        messages: &[Message],
    ) -> Result<EngineResponse, EngineError> {
        let url = format!("{}/v1/messages", self.api_base);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: system_prompt,
            tools,
            messages,
        };

        info!(
            "[>]  Engine call [{}] ({} messages in history)",
            self.model,
            messages.len()
        );

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("[-]  Engine request failed: {}", e);
                if e.is_timeout() || e.is_connect() {
                    EngineError::Unavailable(e.to_string())
                } else {
                    EngineError::Api {
                        status: 0,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("[-]  Engine error {}: {}", status, body);
            // overloaded and service-unavailable responses are retryable
            if status.as_u16() == 529 || status.as_u16() == 503 {
                return Err(EngineError::Unavailable(format!("engine returned {status}")));
            }
            return Err(EngineError::Api {
                status: status.as_u16(),
                message: format!("engine returned {status}"),
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            EngineError::InvalidResponse(format!("failed to decode response body: {e}"))
        })?;

        let content = Self::parse_content(&body)?;
        debug!(
            "[<]  Engine response: {} blocks ({} tool requests)",
            content.len(),
            content
                .iter()
                .filter(|b| matches!(b, ContentBlock::ToolUse { .. }))
                .count()
        );

        Ok(EngineResponse { content })
    }
}
