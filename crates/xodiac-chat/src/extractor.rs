//! Follow-up question extraction.
//!
//! The answer text and the follow-up questions share one stream. The model
//! ends its answer with a block such as:
//!
//! ```text
//! RELATED_QUESTIONS:
//! - First question
//! - Second question
//! ```
//!
//! Extraction re-parses the whole accumulated text from scratch on every
//! update, so arbitrary chunk boundaries need no parser state.

/// Delimiter between the answer body and the follow-up question block.
pub const RELATED_QUESTIONS_MARKER: &str = "RELATED_QUESTIONS:";

/// Answer text and follow-up questions split out of accumulated model output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    /// Everything before the first marker, trimmed.
    pub display_text: String,
    /// Accepted `- ` lines after the marker, in order.
    pub related_questions: Vec<String>,
}

/// Whether the full marker is present in `text`.
pub fn contains_marker(text: &str) -> bool {
    text.contains(RELATED_QUESTIONS_MARKER)
}

/// Split `full_text` into display text and follow-up questions.
pub fn extract_related(full_text: &str) -> Extracted {
    let Some((body, block)) = full_text.split_once(RELATED_QUESTIONS_MARKER) else {
        return Extracted {
            display_text: full_text.trim().to_string(),
            related_questions: Vec::new(),
        };
    };

    let related_questions = block
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('-'))
        .map(|question| question.trim_start().to_string())
        .collect();

    Extracted {
        display_text: body.trim().to_string(),
        related_questions,
    }
}

/// Drop a trailing fragment that could be the start of a marker still in flight.
///
/// Used only for entries that are still streaming; once the stream ends the
/// fragment is ordinary text.
pub fn hold_back_partial_marker(text: &str) -> &str {
    for len in (1..RELATED_QUESTIONS_MARKER.len()).rev() {
        let prefix = &RELATED_QUESTIONS_MARKER[..len];
        if let Some(kept) = text.strip_suffix(prefix) {
            return kept;
        }
    }
    text
}
