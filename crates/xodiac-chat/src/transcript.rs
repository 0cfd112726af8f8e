//! Conversation transcript and the aggregator that folds provider events into it.
//!
//! The transcript is an owned, versioned value. Entries are shared through
//! `Arc`, so a snapshot is a cheap clone; the aggregator copies the trailing
//! entry on write (`Arc::make_mut`) whenever a reader still holds the old one.
//! A consumer holding a snapshot therefore never observes a half-applied event.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;
use xodiac_core::{now_timestamp, ExecutionMode, Role, Source, Timestamp};

use crate::error::ChatError;
use crate::extractor::{
    contains_marker, extract_related, hold_back_partial_marker, RELATED_QUESTIONS_MARKER,
};
use crate::provider::ProviderEvent;

// =============================================================================
// LoadingStatus
// =============================================================================

/// Progress hint for an assistant entry that has no visible answer yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingStatus {
    /// Waiting for the first citation or text fragment.
    Searching,
    /// Citations have arrived; the answer has not.
    Reading { sources: usize },
    /// Deep-think, reasoning, or image generation in progress.
    Thinking,
}

impl LoadingStatus {
    pub fn message(&self) -> String {
        match self {
            LoadingStatus::Searching => "Searching web...".to_string(),
            LoadingStatus::Reading { sources } => format!("Reading {} sources...", sources),
            LoadingStatus::Thinking => "Deep Thinking...".to_string(),
        }
    }
}

// =============================================================================
// ConversationEntry
// =============================================================================

/// One role-tagged item in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationEntry {
    id: Uuid,
    role: Role,
    mode: ExecutionMode,
    created_at: Timestamp,
    /// Raw accumulated text, including any follow-up block.
    text: String,
    /// Text safe to render: no marker, nothing after it, no partial marker.
    display_text: String,
    is_streaming: bool,
    /// Set once a terminal event has been applied.
    closed: bool,
    sources: Vec<Source>,
    related_questions: Vec<String>,
    image_url: Option<String>,
    reasoning_trace: Option<String>,
}

impl ConversationEntry {
    fn user(text: &str, mode: ExecutionMode) -> Self {
        let mut entry = Self::blank(Role::User, mode);
        entry.text = text.to_string();
        entry.display_text = text.trim().to_string();
        entry.closed = true;
        entry
    }

    fn pending_assistant(mode: ExecutionMode) -> Self {
        let mut entry = Self::blank(Role::Assistant, mode);
        entry.is_streaming = true;
        entry
    }

    fn blank(role: Role, mode: ExecutionMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            mode,
            created_at: now_timestamp(),
            text: String::new(),
            display_text: String::new(),
            is_streaming: false,
            closed: false,
            sources: Vec::new(),
            related_questions: Vec::new(),
            image_url: None,
            reasoning_trace: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Raw accumulated text. Renderers should use [`display_text`](Self::display_text).
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn display_text(&self) -> &str {
        &self.display_text
    }

    /// True until the answer body is complete (terminal event or marker seen).
    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    /// True once a terminal event has been applied; no further events are accepted.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn related_questions(&self) -> &[String] {
        &self.related_questions
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn reasoning_trace(&self) -> Option<&str> {
        self.reasoning_trace.as_deref()
    }

    /// Progress hint while an assistant entry has nothing to show yet.
    pub fn loading_status(&self) -> Option<LoadingStatus> {
        if self.role != Role::Assistant || self.closed || !self.display_text.is_empty() {
            return None;
        }
        let status = match self.mode {
            ExecutionMode::ImageGeneration | ExecutionMode::Reasoning => LoadingStatus::Thinking,
            ExecutionMode::DeepThink if self.sources.is_empty() => LoadingStatus::Thinking,
            _ if !self.sources.is_empty() => LoadingStatus::Reading {
                sources: self.sources.len(),
            },
            _ => LoadingStatus::Searching,
        };
        Some(status)
    }

    // -- Mutation (aggregator only) --

    fn append_text(&mut self, delta: &str) {
        self.text.push_str(delta);
        if self.is_streaming && contains_marker(&self.text) {
            debug!(entry_id = %self.id, "Related-questions marker detected");
            self.is_streaming = false;
        }
    }

    /// Merge citations by URI; existing entries keep their position and title.
    fn merge_sources(&mut self, incoming: Vec<Source>) {
        for source in incoming {
            if !self.sources.iter().any(|s| s.uri == source.uri) {
                self.sources.push(source);
            }
        }
    }

    fn append_reasoning(&mut self, delta: &str) {
        self.reasoning_trace
            .get_or_insert_with(String::new)
            .push_str(delta);
    }

    /// Insert an error notice where it stays visible: before the follow-up
    /// block if one has started, otherwise at the end.
    fn append_error_notice(&mut self, message: &str) {
        let notice = format_error_notice(message);
        match self.text.find(RELATED_QUESTIONS_MARKER) {
            Some(idx) => self.text.insert_str(idx, &format!("{}\n", notice)),
            None => self.text.push_str(&notice),
        }
    }

    fn close(&mut self) {
        self.is_streaming = false;
        self.closed = true;
    }

    /// Recompute every field derived from `text`.
    fn refresh(&mut self) {
        let extracted = extract_related(&self.text);
        self.display_text = if self.is_streaming {
            hold_back_partial_marker(&extracted.display_text)
                .trim_end()
                .to_string()
        } else {
            extracted.display_text
        };
        self.related_questions = extracted.related_questions;
    }
}

/// Format a failure message as a visually separate aside.
pub fn format_error_notice(message: &str) -> String {
    format!("\n\n*{}*", message.trim())
}

// =============================================================================
// Transcript
// =============================================================================

/// Ordered, append-only conversation log.
///
/// Cloning is cheap and yields an immutable snapshot.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<Arc<ConversationEntry>>,
    version: u64,
}

impl Transcript {
    /// Incremented on every applied change.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ConversationEntry> {
        self.entries.get(index).map(Arc::as_ref)
    }

    pub fn last(&self) -> Option<&ConversationEntry> {
        self.entries.last().map(Arc::as_ref)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConversationEntry> {
        self.entries.iter().map(Arc::as_ref)
    }

    /// Most recent assistant entry, if any.
    pub fn last_assistant(&self) -> Option<&ConversationEntry> {
        self.entries
            .iter()
            .rev()
            .map(Arc::as_ref)
            .find(|e| e.role == Role::Assistant)
    }

    /// Whether the trailing entry is still accepting events.
    pub fn has_open_entry(&self) -> bool {
        self.last().is_some_and(|e| !e.closed)
    }

    /// Whether two snapshots share the same allocation for entry `index`.
    #[cfg(test)]
    pub(crate) fn shares_entry_with(&self, other: &Transcript, index: usize) -> bool {
        match (self.entries.get(index), other.entries.get(index)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// =============================================================================
// TranscriptAggregator
// =============================================================================

/// Sole owner and mutator of the transcript.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    transcript: Transcript,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Immutable snapshot of the current state.
    pub fn snapshot(&self) -> Transcript {
        self.transcript.clone()
    }

    /// Append the user entry and an open assistant placeholder.
    pub fn begin_turn(&mut self, user_text: &str, mode: ExecutionMode) -> Result<(), ChatError> {
        if self.transcript.has_open_entry() {
            return Err(ChatError::Misuse(
                "cannot begin a turn while the previous entry is open".to_string(),
            ));
        }
        let entries = &mut self.transcript.entries;
        entries.push(Arc::new(ConversationEntry::user(user_text, mode)));
        entries.push(Arc::new(ConversationEntry::pending_assistant(mode)));
        self.transcript.version += 1;
        Ok(())
    }

    /// Fold one provider event into the open trailing entry.
    ///
    /// Applying an event when there is no open entry is a caller bug and is
    /// reported as [`ChatError::Misuse`].
    pub fn apply_event(&mut self, event: ProviderEvent) -> Result<(), ChatError> {
        let entry = self.open_entry_mut(&event)?;

        match event {
            ProviderEvent::TextDelta(delta) => entry.append_text(&delta),
            ProviderEvent::SourceBatch(sources) => entry.merge_sources(sources),
            ProviderEvent::ReasoningDelta(delta) => entry.append_reasoning(&delta),
            ProviderEvent::ImageReady { caption, image_url } => {
                if entry.image_url.is_some() {
                    return Err(ChatError::Misuse(
                        "image already set on this entry".to_string(),
                    ));
                }
                entry.append_text(&caption);
                entry.image_url = Some(image_url);
            }
            ProviderEvent::Done => entry.close(),
            ProviderEvent::Error(message) => {
                entry.append_error_notice(&message);
                entry.close();
            }
        }

        entry.refresh();
        self.transcript.version += 1;
        Ok(())
    }

    /// Close a trailing entry that never received a terminal event.
    ///
    /// Returns `true` if an entry was closed by this call.
    pub fn finalize(&mut self) -> bool {
        if !self.transcript.has_open_entry() {
            return false;
        }
        if let Some(last) = self.transcript.entries.last_mut() {
            let entry = Arc::make_mut(last);
            entry.close();
            entry.refresh();
            self.transcript.version += 1;
        }
        true
    }

    fn open_entry_mut(&mut self, event: &ProviderEvent) -> Result<&mut ConversationEntry, ChatError> {
        let last = self.transcript.entries.last_mut().ok_or_else(|| {
            ChatError::Misuse(format!("{} applied to an empty transcript", event.kind()))
        })?;
        if last.closed {
            return Err(ChatError::Misuse(format!(
                "{} applied to a finalized entry",
                event.kind()
            )));
        }
        Ok(Arc::make_mut(last))
    }
}

// =============================================================================
// Tests
// =============================================================================
