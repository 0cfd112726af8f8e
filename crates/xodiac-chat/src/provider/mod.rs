//! Provider adapters.
//!
//! Each execution mode is served by one adapter. Every adapter normalizes its
//! backend's output into the same ordered [`ProviderEvent`] sequence and ends
//! it with exactly one terminal event (`Done` or `Error`). Backend failures
//! never cross the adapter boundary as `Err`.

pub mod gemini;
pub mod image;
pub mod openrouter;
pub mod reasoning;
pub mod search;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use xodiac_core::{ExecutionMode, Role, Source, XodiacConfig};

use crate::error::ChatError;

pub use gemini::GeminiClient;
pub use image::ImageAdapter;
pub use openrouter::OpenRouterClient;
pub use reasoning::{ReasoningAdapter, ReasoningBackend};
pub use search::{SearchAdapter, SearchBackend, SearchChunk, SearchRequest};

// =============================================================================
// Events and requests
// =============================================================================

/// Normalized incremental output of a provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// A fragment of answer text.
    TextDelta(String),
    /// Citations delivered alongside the text.
    SourceBatch(Vec<Source>),
    /// A fragment of the reasoning trace (reasoning mode only).
    ReasoningDelta(String),
    /// Caption and image URL, applied together.
    ImageReady { caption: String, image_url: String },
    /// Successful end of stream.
    Done,
    /// Failed end of stream, with a human-readable message.
    Error(String),
}

impl ProviderEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProviderEvent::Done | ProviderEvent::Error(_))
    }

    /// Variant name, for logs and misuse reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderEvent::TextDelta(_) => "text_delta",
            ProviderEvent::SourceBatch(_) => "source_batch",
            ProviderEvent::ReasoningDelta(_) => "reasoning_delta",
            ProviderEvent::ImageReady { .. } => "image_ready",
            ProviderEvent::Done => "done",
            ProviderEvent::Error(_) => "error",
        }
    }
}

/// One prior turn as sent to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
}

impl HistoryTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Everything an adapter needs to serve one turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub query: String,
    pub mode: ExecutionMode,
    /// Prior turns, ending with the current user query.
    pub history: Vec<HistoryTurn>,
}

// =============================================================================
// ProviderAdapter
// =============================================================================

/// Common contract for every provider variant.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Adapter name for logging.
    fn name(&self) -> &'static str;

    /// Serve one turn, sending events in order and finishing with a terminal event.
    ///
    /// A closed receiver ends the stream early; nothing is reported for it.
    async fn stream(&self, request: &TurnRequest, events: mpsc::Sender<ProviderEvent>);
}

/// The closed set of adapters, one per execution mode.
pub struct ProviderSet {
    search: SearchAdapter,
    reasoning: ReasoningAdapter,
    image: ImageAdapter,
}

impl ProviderSet {
    pub fn new(search: SearchAdapter, reasoning: ReasoningAdapter, image: ImageAdapter) -> Self {
        Self {
            search,
            reasoning,
            image,
        }
    }

    /// Build the HTTP-backed adapters described by the configuration.
    pub fn from_config(config: &XodiacConfig) -> Result<Self, ChatError> {
        let gemini = GeminiClient::new(&config.search)?;
        let openrouter = OpenRouterClient::new(&config.reasoning)?;
        Ok(Self::new(
            SearchAdapter::new(Arc::new(gemini), config.search.web_search),
            ReasoningAdapter::new(Arc::new(openrouter), config.reasoning.model.clone()),
            ImageAdapter::new(
                config.image.base_url.clone(),
                Duration::from_millis(config.image.delay_ms),
                config.image.max_seed,
            ),
        ))
    }

    pub fn adapter_for(&self, mode: ExecutionMode) -> &dyn ProviderAdapter {
        match mode {
            ExecutionMode::Fast | ExecutionMode::DeepThink => &self.search,
            ExecutionMode::Reasoning => &self.reasoning,
            ExecutionMode::ImageGeneration => &self.image,
        }
    }
}

/// Send an event, reporting whether the receiver is still listening.
pub(crate) async fn emit(events: &mpsc::Sender<ProviderEvent>, event: ProviderEvent) -> bool {
    events.send(event).await.is_ok()
}
