//! Streaming search adapter (fast and deep-think modes).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use xodiac_core::Source;

use super::{emit, HistoryTurn, ProviderAdapter, ProviderEvent, TurnRequest};
use crate::error::ChatError;
use crate::prompts::system_instruction_for;

/// Shown in the transcript when the search backend fails.
pub const SEARCH_FAILURE_MESSAGE: &str =
    "I encountered an error while processing your request. Please try again later.";

/// Capacity of the backend-to-adapter chunk channel.
const CHUNK_BUFFER: usize = 32;

/// Request handed to a [`SearchBackend`].
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub system_instruction: String,
    /// Role-tagged turns, ending with the current query.
    pub turns: Vec<HistoryTurn>,
    /// Enable web search grounding.
    pub web_search: bool,
}

/// One incremental piece of backend output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchChunk {
    pub text: Option<String>,
    pub sources: Vec<Source>,
}

/// Token-incremental text generation backend with optional grounding.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Stream chunks into `chunks` until the backend is exhausted.
    ///
    /// Returns `Err` on any transport or backend failure; chunks already sent
    /// stay valid.
    async fn stream_generate(
        &self,
        request: &SearchRequest,
        chunks: mpsc::Sender<SearchChunk>,
    ) -> Result<(), ChatError>;
}

/// Adapter for the streaming search backend.
pub struct SearchAdapter {
    backend: Arc<dyn SearchBackend>,
    web_search: bool,
}

impl SearchAdapter {
    pub fn new(backend: Arc<dyn SearchBackend>, web_search: bool) -> Self {
        Self {
            backend,
            web_search,
        }
    }
}

#[async_trait]
impl ProviderAdapter for SearchAdapter {
    fn name(&self) -> &'static str {
        "search"
    }

    async fn stream(&self, request: &TurnRequest, events: mpsc::Sender<ProviderEvent>) {
        let search_request = SearchRequest {
            system_instruction: system_instruction_for(request.mode).to_string(),
            turns: request.history.clone(),
            web_search: self.web_search,
        };

        let (chunk_tx, mut chunk_rx) = mpsc::channel(CHUNK_BUFFER);
        let produce = self.backend.stream_generate(&search_request, chunk_tx);
        // Owns the receiver so an early exit unblocks the backend.
        let sink = &events;
        let forward = async move {
            let mut chunk_count = 0usize;
            while let Some(chunk) = chunk_rx.recv().await {
                chunk_count += 1;
                if !chunk.sources.is_empty()
                    && !emit(sink, ProviderEvent::SourceBatch(chunk.sources)).await
                {
                    break;
                }
                if let Some(text) = chunk.text.filter(|t| !t.is_empty()) {
                    if !emit(sink, ProviderEvent::TextDelta(text)).await {
                        break;
                    }
                }
            }
            chunk_count
        };

        let (result, chunk_count) = tokio::join!(produce, forward);
        debug!(mode = %request.mode, chunk_count, "Search stream finished");

        let terminal = match result {
            Ok(()) => ProviderEvent::Done,
            Err(e) => {
                warn!(error = %e, mode = %request.mode, "Search backend failed");
                ProviderEvent::Error(SEARCH_FAILURE_MESSAGE.to_string())
            }
        };
        emit(&events, terminal).await;
    }
}

// =============================================================================
// Tests
// =============================================================================
