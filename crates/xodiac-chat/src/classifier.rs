//! Query classifier.
//!
//! Maps raw query text plus the user's explicit toggles to the
//! [`ExecutionMode`] that decides which provider serves the turn.

use std::sync::LazyLock;

use regex::Regex;
use xodiac_core::ExecutionMode;

// =============================================================================
// Compiled patterns (compiled once, reused across calls)
// =============================================================================

/// "generate an image ...", "draw picture ...", etc. at the start of a query.
static IMAGE_INTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(generate|create|draw|make) (an )?(image|visual|picture|photo)")
        .expect("Invalid image intent regex")
});

/// Phrase that asks for the alternate research backend.
const ALTERNATE_BACKEND_PHRASE: &str = "use grok";

/// Queries longer than this many words are treated as complex.
const COMPLEX_WORD_THRESHOLD: usize = 15;

/// Substrings that mark a query as complex (matched against the lowercase query).
static COMPLEXITY_KEYWORDS: &[&str] = &[
    "analyze",
    "compare",
    "contrast",
    "evaluate",
    "implications",
    "history of",
    "detailed",
    "comprehensive",
    "code",
    "function",
    "app",
    "grok",
];

// =============================================================================
// ModeToggles
// =============================================================================

/// Explicit mode switches chosen by the user alongside the query text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeToggles {
    pub deep_think: bool,
    pub image_generation: bool,
    pub reasoning: bool,
}

impl ModeToggles {
    pub fn deep_think() -> Self {
        Self {
            deep_think: true,
            ..Self::default()
        }
    }

    pub fn image_generation() -> Self {
        Self {
            image_generation: true,
            ..Self::default()
        }
    }

    pub fn reasoning() -> Self {
        Self {
            reasoning: true,
            ..Self::default()
        }
    }
}

// =============================================================================
// QueryClassifier
// =============================================================================

/// Rule-based execution mode classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryClassifier;

impl QueryClassifier {
    /// Classify a query. First matching rule wins:
    ///
    /// 1. reasoning toggle
    /// 2. image toggle or image-intent phrase
    /// 3. deep-think toggle or the alternate-backend phrase
    /// 4. long or keyword-heavy query
    /// 5. fast
    pub fn classify(&self, query: &str, toggles: ModeToggles) -> ExecutionMode {
        if toggles.reasoning {
            return ExecutionMode::Reasoning;
        }
        if toggles.image_generation || self.is_image_intent(query) {
            return ExecutionMode::ImageGeneration;
        }
        if toggles.deep_think || self.requests_alternate_backend(query) {
            return ExecutionMode::DeepThink;
        }
        if self.is_complex(query) {
            return ExecutionMode::DeepThink;
        }
        ExecutionMode::Fast
    }

    /// Whether the query opens with an image request.
    pub fn is_image_intent(&self, query: &str) -> bool {
        IMAGE_INTENT_RE.is_match(query)
    }

    /// Whether the query asks for the alternate backend by name.
    pub fn requests_alternate_backend(&self, query: &str) -> bool {
        query.to_lowercase().contains(ALTERNATE_BACKEND_PHRASE)
    }

    /// Length and keyword complexity heuristic.
    pub fn is_complex(&self, query: &str) -> bool {
        if query.split_whitespace().count() > COMPLEX_WORD_THRESHOLD {
            return true;
        }
        let lower = query.to_lowercase();
        COMPLEXITY_KEYWORDS.iter().any(|kw| lower.contains(kw))
    }
}

// =============================================================================
// Tests
// =============================================================================
