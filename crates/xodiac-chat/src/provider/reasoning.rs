//! Single-shot reasoning adapter.
//!
//! Sends the whole conversation in one chat-completions request and reports
//! the model's reasoning trace ahead of its answer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use xodiac_core::Role;

use super::{emit, HistoryTurn, ProviderAdapter, ProviderEvent, TurnRequest};
use crate::error::ChatError;

/// Shown when the reasoning backend cannot be reached.
pub const REASONING_FAILURE_MESSAGE: &str =
    "Failed to reach the reasoning service. Please try again later.";

/// Shown when the reasoning backend answers with an empty or unexpected body.
pub const EMPTY_RESPONSE_MESSAGE: &str = "The reasoning model returned an empty response.";

/// Chat-completions request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<CompletionMessage>,
    pub stream: bool,
    pub include_reasoning: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionMessage {
    pub role: &'static str,
    pub content: String,
}

/// Request/response completion backend.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Perform the exchange and return the raw response body.
    ///
    /// Transport failures and non-success statuses are `Err`; body parsing is
    /// left to the adapter.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ChatError>;
}

/// Adapter for the reasoning backend.
pub struct ReasoningAdapter {
    backend: Arc<dyn ReasoningBackend>,
    model: String,
}

impl ReasoningAdapter {
    pub fn new(backend: Arc<dyn ReasoningBackend>, model: String) -> Self {
        Self { backend, model }
    }

    /// Map history to completion messages, making sure the query is last.
    pub fn build_request(&self, request: &TurnRequest) -> CompletionRequest {
        let mut messages: Vec<CompletionMessage> = request
            .history
            .iter()
            .map(|HistoryTurn { role, text }| CompletionMessage {
                role: wire_role(*role),
                content: text.clone(),
            })
            .collect();

        let ends_with_query = messages
            .last()
            .is_some_and(|m| m.role == "user" && m.content == request.query);
        if !ends_with_query {
            messages.push(CompletionMessage {
                role: wire_role(Role::User),
                content: request.query.clone(),
            });
        }

        CompletionRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            include_reasoning: true,
        }
    }
}

#[async_trait]
impl ProviderAdapter for ReasoningAdapter {
    fn name(&self) -> &'static str {
        "reasoning"
    }

    async fn stream(&self, request: &TurnRequest, events: mpsc::Sender<ProviderEvent>) {
        let completion = self.build_request(request);
        debug!(
            model = %completion.model,
            messages = completion.messages.len(),
            "Sending reasoning request"
        );

        let body = match self.backend.complete(&completion).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Reasoning backend failed");
                emit(&events, ProviderEvent::Error(REASONING_FAILURE_MESSAGE.to_string())).await;
                return;
            }
        };

        let reply = parse_completion(&body);
        if let Some(reasoning) = reply.reasoning {
            if !emit(&events, ProviderEvent::ReasoningDelta(reasoning)).await {
                return;
            }
        }
        let content = reply.content.unwrap_or_else(|| {
            warn!(body_len = body.len(), "Reasoning response had no content");
            EMPTY_RESPONSE_MESSAGE.to_string()
        });
        if !emit(&events, ProviderEvent::TextDelta(content)).await {
            return;
        }
        emit(&events, ProviderEvent::Done).await;
    }
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Content and reasoning pulled out of a completion body.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CompletionReply {
    pub content: Option<String>,
    pub reasoning: Option<String>,
}

/// Parse a completion body; anything unexpected yields empty fields.
pub fn parse_completion(body: &str) -> CompletionReply {
    let Ok(parsed) = serde_json::from_str::<CompletionResponse>(body) else {
        return CompletionReply::default();
    };
    let Some(message) = parsed.choices.into_iter().next().and_then(|c| c.message) else {
        return CompletionReply::default();
    };
    let non_blank = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
    CompletionReply {
        content: non_blank(message.content),
        reasoning: non_blank(message.reasoning),
    }
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
    reasoning: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================
