//! Conversation orchestration loop.
//!
//! One `ask` drives a bounded cycle against the reasoning engine: call the
//! engine, dispatch whatever tools it requests, feed the results back, and
//! stop at the first tool-free response. The loop owns all per-question
//! state (history, tool results, call trail) and rebuilds it from scratch
//! every time, so concurrent questions share nothing but the read-only
//! stores.

use beacon_common::ConversationResponse;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::citations::extract_citations;
use crate::config::{MAX_MAX_ITERATIONS, MIN_MAX_ITERATIONS};
use crate::engine::{ContentBlock, EngineError, Message, ReasoningEngine, Role, ToolDefinition};
use crate::prompts::SYSTEM_PROMPT;
use crate::tools::{tool_definitions, ToolDispatcher};

/// Maximum question length in characters (inclusive).
pub const MAX_QUESTION_LEN: usize = 10_000;

/// Conversation failures surfaced to the transport layer.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Bad input, rejected before any engine or tool call.
    #[error("{0}")]
    Validation(String),

    /// The iteration limit ran out before the engine produced a final
    /// answer. A capacity/complexity failure, not a client error.
    #[error("max iterations ({0}) reached without final response")]
    MaxIterations(usize),

    /// The engine returned neither text nor tool requests.
    #[error("no text response from engine")]
    NoTextResponse,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// The conversation agent: reasoning engine + tool dispatcher + fixed policy.
pub struct ConversationAgent {
    engine: Arc<dyn ReasoningEngine>,
    dispatcher: ToolDispatcher,
    tools: Vec<ToolDefinition>,
    max_iterations: usize,
}

impl ConversationAgent {
    /// `max_iterations` is the default bound used by [`ask`](Self::ask);
    /// it must already be validated into [1, 20] (config load does this).
    pub fn new(
        engine: Arc<dyn ReasoningEngine>,
        dispatcher: ToolDispatcher,
        max_iterations: usize,
    ) -> Self {
        Self {
            engine,
            dispatcher,
            tools: tool_definitions(),
            max_iterations,
        }
    }

    /// Ask with the configured default iteration bound.
    pub async fn ask(&self, question: &str) -> Result<ConversationResponse, AgentError> {
        self.ask_with_limit(question, self.max_iterations).await
    }

    /// Ask with an explicit iteration bound.
    pub async fn ask_with_limit(
        &self,
        question: &str,
        max_iterations: usize,
    ) -> Result<ConversationResponse, AgentError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentError::Validation(
                "Question cannot be empty".to_string(),
            ));
        }
        if question.chars().count() > MAX_QUESTION_LEN {
            return Err(AgentError::Validation(format!(
                "Question exceeds maximum length of {MAX_QUESTION_LEN} characters"
            )));
        }
        if !(MIN_MAX_ITERATIONS..=MAX_MAX_ITERATIONS).contains(&max_iterations) {
            return Err(AgentError::Validation(format!(
                "max_iterations must be between {MIN_MAX_ITERATIONS} and {MAX_MAX_ITERATIONS}"
            )));
        }

        let mut messages = vec![Message::user_text(question)];
        let mut tool_results: Vec<Value> = Vec::new();
        let mut tool_calls_made: Vec<String> = Vec::new();

        for iteration in 1..=max_iterations {
            debug!("Iteration {}: calling reasoning engine", iteration);
            let response = self
                .engine
                .complete(SYSTEM_PROMPT, &self.tools, &messages)
                .await?;

            let tool_uses = response.tool_uses();
            if tool_uses.is_empty() {
                let answer = response.text();
                if answer.is_empty() {
                    return Err(AgentError::NoTextResponse);
                }

                let citations = extract_citations(&tool_results);
                info!(
                    "Answered after {} iteration(s): {} citations, {} tool calls",
                    iteration,
                    citations.len(),
                    tool_calls_made.len()
                );
                return Ok(ConversationResponse {
                    answer,
                    citations,
                    tool_calls_made,
                });
            }

            messages.push(Message {
                role: Role::Assistant,
                content: response.content,
            });

            // Dispatch strictly one at a time, in the order the engine asked:
            // its follow-up reasoning may depend on that order.
            let mut result_blocks = Vec::with_capacity(tool_uses.len());
            for (tool_use_id, tool_name, tool_input) in tool_uses {
                debug!("Executing tool: {} with input: {}", tool_name, tool_input);
                tool_calls_made.push(tool_name.clone());

                let result = self.dispatcher.dispatch(&tool_name, &tool_input).await;
                result_blocks.push(ContentBlock::ToolResult {
                    tool_use_id,
                    content: result.to_string(),
                });
                tool_results.push(result);
            }

            messages.push(Message {
                role: Role::User,
                content: result_blocks,
            });
        }

        Err(AgentError::MaxIterations(max_iterations))
    }
}
