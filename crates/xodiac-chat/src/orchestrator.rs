//! Turn orchestrator: classifies a query, runs the matching provider adapter
//! and folds its events into the transcript.
//!
//! The orchestrator is the only writer of the transcript. Every applied event
//! publishes a fresh [`Transcript`] snapshot on a watch channel, so readers
//! can render between updates without ever observing a half-applied change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use xodiac_core::config::ChatConfig;
use xodiac_core::{Role, XodiacConfig};

use crate::classifier::{ModeToggles, QueryClassifier};
use crate::error::ChatError;
use crate::provider::{HistoryTurn, ProviderEvent, ProviderSet, TurnRequest};
use crate::transcript::{Transcript, TranscriptAggregator};

/// Coordinates one conversation: one transcript, at most one turn in flight.
pub struct Orchestrator {
    config: ChatConfig,
    classifier: QueryClassifier,
    providers: ProviderSet,
    aggregator: Mutex<TranscriptAggregator>,
    updates: watch::Sender<Transcript>,
    busy: AtomicBool,
}

impl Orchestrator {
    /// Create an orchestrator around an explicit set of adapters.
    pub fn new(config: ChatConfig, providers: ProviderSet) -> Self {
        let (updates, _) = watch::channel(Transcript::default());
        Self {
            config,
            classifier: QueryClassifier,
            providers,
            aggregator: Mutex::new(TranscriptAggregator::new()),
            updates,
            busy: AtomicBool::new(false),
        }
    }

    /// Build the HTTP-backed adapters from configuration.
    pub fn from_config(config: &XodiacConfig) -> Result<Self, ChatError> {
        let providers = ProviderSet::from_config(config)?;
        Ok(Self::new(config.chat.clone(), providers))
    }

    /// Receive a new snapshot after every applied change.
    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.updates.subscribe()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Transcript {
        self.updates.borrow().clone()
    }

    /// Whether a turn is in flight. New submissions are rejected meanwhile.
    pub fn is_loading(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run one turn to completion and return the final snapshot.
    ///
    /// Backend failures do not surface here; they end up as a notice in the
    /// assistant entry. Only invalid input, a concurrent turn, or transcript
    /// misuse are returned as errors.
    pub async fn submit(&self, query: &str, toggles: ModeToggles) -> Result<Transcript, ChatError> {
        if !self.config.enabled {
            return Err(ChatError::Disabled);
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        if query.chars().count() > self.config.max_query_length {
            return Err(ChatError::QueryTooLong(self.config.max_query_length));
        }

        let Some(_turn) = TurnGuard::acquire(&self.busy) else {
            debug!("Rejected submission while a turn is in flight");
            return Err(ChatError::Busy);
        };

        let mode = self.classifier.classify(query, toggles);
        let adapter = self.providers.adapter_for(mode);
        info!(mode = %mode, adapter = adapter.name(), query_len = query.len(), "Turn started");

        let request = {
            let mut aggregator = self.lock_aggregator()?;
            let history = build_history(aggregator.transcript(), query);
            aggregator.begin_turn(query, mode).inspect_err(|e| {
                error!(error = %e, "Failed to begin turn");
            })?;
            self.publish(&aggregator);
            TurnRequest {
                query: query.to_string(),
                mode,
                history,
            }
        };

        let (tx, mut rx) = mpsc::channel(self.config.event_buffer.max(1));
        let produce = adapter.stream(&request, tx);
        // Owns the receiver: bailing out on misuse unblocks the adapter.
        let consume = async move {
            let mut applied = 0usize;
            while let Some(event) = rx.recv().await {
                self.apply(event)?;
                applied += 1;
            }
            Ok::<usize, ChatError>(applied)
        };
        let ((), consumed) = tokio::join!(produce, consume);

        let snapshot = {
            let mut aggregator = self.lock_aggregator()?;
            if aggregator.finalize() {
                warn!(mode = %mode, "Adapter ended without a terminal event; entry closed");
                self.publish(&aggregator);
            }
            aggregator.snapshot()
        };

        match consumed {
            Ok(applied) => {
                info!(mode = %mode, events = applied, entries = snapshot.len(), "Turn finished");
                Ok(snapshot)
            }
            Err(e) => {
                error!(mode = %mode, error = %e, "Turn aborted");
                Err(e)
            }
        }
    }

    /// Submit related question `question_index` of the entry at `entry_index`
    /// as a new query with no mode toggles.
    pub async fn select_related(
        &self,
        entry_index: usize,
        question_index: usize,
    ) -> Result<Transcript, ChatError> {
        let question = {
            let aggregator = self.lock_aggregator()?;
            aggregator
                .transcript()
                .get(entry_index)
                .filter(|entry| entry.role() == Role::Assistant)
                .and_then(|entry| entry.related_questions().get(question_index).cloned())
        };
        let question = question.ok_or(ChatError::RelatedQuestionNotFound {
            entry: entry_index,
            index: question_index,
        })?;

        info!(entry_index, question_index, "Related question selected");
        self.submit(&question, ModeToggles::default()).await
    }

    // -- Private helpers --

    fn apply(&self, event: ProviderEvent) -> Result<(), ChatError> {
        let kind = event.kind();
        let terminal = event.is_terminal();
        let mut aggregator = self.lock_aggregator()?;
        aggregator.apply_event(event).inspect_err(|e| {
            error!(event = kind, error = %e, "Provider event rejected");
        })?;
        if terminal {
            debug!(event = kind, version = aggregator.transcript().version(), "Entry closed");
        }
        self.publish(&aggregator);
        Ok(())
    }

    fn publish(&self, aggregator: &TranscriptAggregator) {
        self.updates.send_replace(aggregator.snapshot());
    }

    fn lock_aggregator(&self) -> Result<MutexGuard<'_, TranscriptAggregator>, ChatError> {
        self.aggregator
            .lock()
            .map_err(|e| ChatError::Internal(format!("transcript lock poisoned: {}", e)))
    }
}

/// Prior closed turns as role-tagged text, followed by the new query.
///
/// Assistant turns contribute their display text, so follow-up blocks are
/// never echoed back to a backend.
fn build_history(transcript: &Transcript, query: &str) -> Vec<HistoryTurn> {
    let mut history: Vec<HistoryTurn> = transcript
        .entries()
        .filter(|entry| entry.is_closed())
        .filter_map(|entry| match entry.role() {
            Role::User => Some(HistoryTurn::user(entry.text())),
            Role::Assistant if entry.display_text().is_empty() => None,
            Role::Assistant => Some(HistoryTurn::assistant(entry.display_text())),
        })
        .collect();
    history.push(HistoryTurn::user(query));
    history
}

/// Holds the busy flag for the lifetime of a turn.
struct TurnGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> TurnGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// =============================================================================
// Tests
// =============================================================================
