//! End-to-end turns through the orchestrator with in-process fake backends.
//!
//! Each test builds its own orchestrator; no network access is involved.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use xodiac_chat::provider::reasoning::CompletionRequest;
use xodiac_chat::provider::search::SEARCH_FAILURE_MESSAGE;
use xodiac_chat::provider::{
    ImageAdapter, ReasoningAdapter, ReasoningBackend, SearchAdapter, SearchBackend, SearchChunk,
    SearchRequest,
};
use xodiac_chat::{
    ChatError, LoadingStatus, ModeToggles, Orchestrator, ProviderSet, Transcript,
};
use xodiac_core::config::ChatConfig;
use xodiac_core::{ExecutionMode, Role, Source};

// =============================================================================
// Helpers
// =============================================================================

/// Search backend replaying chunks. It yields before each one so observers
/// see every intermediate snapshot.
struct ChunkBackend {
    chunks: Vec<SearchChunk>,
    fail_with: Option<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<SearchRequest>>,
}

impl ChunkBackend {
    fn new(chunks: Vec<SearchChunk>) -> Arc<Self> {
        Arc::new(Self {
            chunks,
            fail_with: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing(chunks: Vec<SearchChunk>, message: &str) -> Arc<Self> {
        Arc::new(Self {
            chunks,
            fail_with: Some(message.to_string()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SearchBackend for ChunkBackend {
    async fn stream_generate(
        &self,
        request: &SearchRequest,
        chunks: mpsc::Sender<SearchChunk>,
    ) -> Result<(), ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        for chunk in &self.chunks {
            tokio::task::yield_now().await;
            if chunks.send(chunk.clone()).await.is_err() {
                return Ok(());
            }
        }
        match &self.fail_with {
            Some(message) => Err(ChatError::Transport(message.clone())),
            None => Ok(()),
        }
    }
}

struct FixedReasoning {
    body: String,
}

#[async_trait]
impl ReasoningBackend for FixedReasoning {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, ChatError> {
        Ok(self.body.clone())
    }
}

fn text(s: &str) -> SearchChunk {
    SearchChunk {
        text: Some(s.to_string()),
        sources: vec![],
    }
}

fn orchestrator(search: Arc<ChunkBackend>) -> Orchestrator {
    let reasoning = FixedReasoning {
        body: r#"{"choices":[{"message":{"content":"Considered answer.","reasoning":"First, think."}}]}"#
            .to_string(),
    };
    let providers = ProviderSet::new(
        SearchAdapter::new(search, true),
        ReasoningAdapter::new(Arc::new(reasoning), "test-model".to_string()),
        ImageAdapter::new(
            "https://image.test/prompt".to_string(),
            Duration::ZERO,
            1_000_000,
        ),
    );
    Orchestrator::new(ChatConfig::default(), providers)
}

fn assistant_entries(transcript: &Transcript) -> usize {
    transcript
        .entries()
        .filter(|e| e.role() == Role::Assistant)
        .count()
}

// =============================================================================
// Image generation
// =============================================================================

#[tokio::test]
async fn test_image_turn_end_to_end() {
    let search = ChunkBackend::new(vec![text("should not be used")]);
    let orch = orchestrator(search.clone());

    let transcript = orch
        .submit("generate an image of a red fox", ModeToggles::default())
        .await
        .unwrap();

    assert_eq!(assistant_entries(&transcript), 1);
    let answer = transcript.last().unwrap();
    assert_eq!(answer.mode(), ExecutionMode::ImageGeneration);
    assert!(answer.text().contains("a red fox"));
    let url = answer.image_url().unwrap();
    assert!(url.starts_with("https://image.test/prompt/a%20red%20fox?nologo=true&seed="));
    assert!(answer.sources().is_empty());
    assert!(answer.is_closed());
    assert_eq!(search.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_image_toggle_without_phrase() {
    let orch = orchestrator(ChunkBackend::new(vec![]));
    let transcript = orch
        .submit("a quiet harbor at dawn", ModeToggles::image_generation())
        .await
        .unwrap();
    let answer = transcript.last().unwrap();
    assert_eq!(
        answer.display_text(),
        "Generated image for: **a quiet harbor at dawn**"
    );
}

// =============================================================================
// Streaming search
// =============================================================================

#[tokio::test]
async fn test_split_marker_never_flashes() {
    let orch = orchestrator(ChunkBackend::new(vec![
        text("Here is the answer. RELA"),
        text("TED_QUESTIONS:\n- Q1"),
    ]));
    let mut rx = orch.subscribe();

    let observe = async {
        let mut displayed = Vec::new();
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            let Some(entry) = snapshot.last() else { continue };
            displayed.push(entry.display_text().to_string());
            if entry.role() == Role::Assistant && entry.is_closed() {
                break;
            }
        }
        displayed
    };
    let (result, displayed) = tokio::join!(orch.submit("tell me", ModeToggles::default()), observe);

    for text in &displayed {
        assert!(!text.contains("RELA"), "marker fragment shown: {text:?}");
    }
    let transcript = result.unwrap();
    let answer = transcript.last().unwrap();
    assert_eq!(answer.display_text(), "Here is the answer.");
    assert_eq!(answer.related_questions(), &["Q1".to_string()]);
}

#[tokio::test]
async fn test_partial_then_error() {
    let orch = orchestrator(ChunkBackend::failing(
        vec![text("partial")],
        "connection reset",
    ));

    let transcript = orch.submit("hello there", ModeToggles::default()).await.unwrap();
    let answer = transcript.last().unwrap();
    assert_eq!(
        answer.display_text(),
        format!("partial\n\n*{}*", SEARCH_FAILURE_MESSAGE)
    );
    assert!(!answer.is_streaming());
    assert!(answer.is_closed());
    assert!(!orch.is_loading());

    // The conversation continues after a failed turn.
    let transcript = orch.submit("again", ModeToggles::default()).await.unwrap();
    assert_eq!(transcript.len(), 4);
}

#[tokio::test]
async fn test_sources_deduplicated_across_chunks() {
    let orch = orchestrator(ChunkBackend::new(vec![
        SearchChunk {
            text: Some("One".to_string()),
            sources: vec![
                Source::new("A", "https://a.test"),
                Source::new("B", "https://b.test"),
            ],
        },
        SearchChunk {
            text: Some(" two".to_string()),
            sources: vec![
                Source::new("A again", "https://a.test"),
                Source::new("C", "https://c.test"),
            ],
        },
    ]));

    let transcript = orch.submit("sources please", ModeToggles::default()).await.unwrap();
    let answer = transcript.last().unwrap();
    assert_eq!(
        answer.sources(),
        &[
            Source::new("A", "https://a.test"),
            Source::new("B", "https://b.test"),
            Source::new("C", "https://c.test"),
        ]
    );
    assert_eq!(answer.display_text(), "One two");
}

#[tokio::test]
async fn test_placeholder_reports_searching_first() {
    let orch = orchestrator(ChunkBackend::new(vec![text("Done.")]));
    let mut rx = orch.subscribe();

    let observe = async {
        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        snapshot.last().and_then(|e| e.loading_status())
    };
    let (result, first_status) =
        tokio::join!(orch.submit("weather", ModeToggles::default()), observe);

    result.unwrap();
    assert_eq!(first_status, Some(LoadingStatus::Searching));
}

#[tokio::test]
async fn test_use_grok_phrase_selects_deep_think() {
    let search = ChunkBackend::new(vec![text("Deep answer.")]);
    let orch = orchestrator(search.clone());

    let transcript = orch.submit("use grok for this", ModeToggles::default()).await.unwrap();
    assert_eq!(transcript.last().unwrap().mode(), ExecutionMode::DeepThink);

    let requests = search.requests.lock().unwrap();
    assert_eq!(
        requests[0].system_instruction,
        xodiac_chat::prompts::DEEP_THINK_SYSTEM_INSTRUCTION
    );
}

// =============================================================================
// Reasoning
// =============================================================================

#[tokio::test]
async fn test_reasoning_turn_keeps_trace_separate() {
    let orch = orchestrator(ChunkBackend::new(vec![]));
    let transcript = orch.submit("why is the sky blue", ModeToggles::reasoning()).await.unwrap();
    let answer = transcript.last().unwrap();
    assert_eq!(answer.mode(), ExecutionMode::Reasoning);
    assert_eq!(answer.display_text(), "Considered answer.");
    assert_eq!(answer.reasoning_trace(), Some("First, think."));
    assert!(answer.related_questions().is_empty());
}

// =============================================================================
// Related questions
// =============================================================================

#[tokio::test]
async fn test_related_question_reenters_as_new_query() {
    let search = ChunkBackend::new(vec![text(
        "Rust is a systems language.\n\nRELATED_QUESTIONS:\n- Who created Rust?\n- Is Rust fast?",
    )]);
    let orch = orchestrator(search.clone());

    orch.submit("what is rust", ModeToggles::default()).await.unwrap();
    let transcript = orch.select_related(1, 0).await.unwrap();

    assert_eq!(transcript.len(), 4);
    let follow_up = transcript.get(2).unwrap();
    assert_eq!(follow_up.role(), Role::User);
    assert_eq!(follow_up.text(), "Who created Rust?");

    let requests = search.requests.lock().unwrap();
    let turns = &requests[1].turns;
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[1].text, "Rust is a systems language.");
}

#[tokio::test]
async fn test_invalid_input_does_not_touch_transcript() {
    let orch = orchestrator(ChunkBackend::new(vec![text("x")]));
    assert!(matches!(
        orch.submit("  ", ModeToggles::default()).await,
        Err(ChatError::EmptyQuery)
    ));
    assert!(matches!(
        orch.select_related(0, 0).await,
        Err(ChatError::RelatedQuestionNotFound { .. })
    ));
    assert!(orch.snapshot().is_empty());
}
