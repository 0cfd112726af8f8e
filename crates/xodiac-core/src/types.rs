use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Execution path selected for a single query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Terse, search-biased answer from the streaming backend.
    #[default]
    Fast,
    /// Research-oriented answer from the streaming backend.
    DeepThink,
    /// Single-shot answer from the reasoning backend, with a reasoning trace.
    Reasoning,
    /// Synthetic image generation; no text backend involved.
    ImageGeneration,
}

impl ExecutionMode {
    /// Short human-readable label for display badges.
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionMode::Fast => "Fast",
            ExecutionMode::DeepThink => "Deep Think",
            ExecutionMode::Reasoning => "Reasoning",
            ExecutionMode::ImageGeneration => "Image",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Author of a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

// =============================================================================
// Value types
// =============================================================================

/// A citation supplied alongside generated text.
///
/// Identity is the `uri`; two sources with the same URI are the same source
/// even when their titles differ.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

impl Source {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
        }
    }
}

/// Seconds since the Unix epoch.
pub type Timestamp = i64;

/// Current time as epoch seconds.
pub fn now_timestamp() -> Timestamp {
    Utc::now().timestamp()
}

// =============================================================================
// Tests
// =============================================================================
