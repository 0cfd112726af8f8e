//! Error types for the conversation engine.

use std::time::Duration;

use xodiac_core::error::XodiacError;

/// Errors from the conversation engine and its backends.
///
/// Backend failures (`Transport`, `Timeout`, `Backend`, `MalformedResponse`)
/// never escape a provider adapter; they are logged there and folded into the
/// transcript as an inline notice. The remaining variants are returned to the
/// caller of the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat is disabled")]
    Disabled,
    #[error("query cannot be empty")]
    EmptyQuery,
    #[error("query exceeds maximum length of {0} characters")]
    QueryTooLong(usize),
    #[error("a turn is already in progress")]
    Busy,
    #[error("transcript misuse: {0}")]
    Misuse(String),
    #[error("related question {index} not found on entry {entry}")]
    RelatedQuestionNotFound { entry: usize, index: usize },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("backend returned HTTP {status}: {message}")]
    Backend { status: u16, message: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<XodiacError> for ChatError {
    fn from(err: XodiacError) -> Self {
        ChatError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}
