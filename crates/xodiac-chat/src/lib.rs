//! Conversation engine for Xodiac.
//!
//! Classifies queries into execution modes, streams answers from the matching
//! backend, and folds the results into an observable conversation transcript
//! with citations, follow-up questions and reasoning traces.

pub mod classifier;
pub mod error;
pub mod extractor;
pub mod orchestrator;
pub mod prompts;
pub mod provider;
pub mod transcript;

pub use classifier::{ModeToggles, QueryClassifier};
pub use error::ChatError;
pub use extractor::{extract_related, Extracted, RELATED_QUESTIONS_MARKER};
pub use orchestrator::Orchestrator;
pub use provider::{ProviderAdapter, ProviderEvent, ProviderSet, TurnRequest};
pub use transcript::{ConversationEntry, LoadingStatus, Transcript, TranscriptAggregator};
