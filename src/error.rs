//! Error types for the mentorship chat core.

use thiserror::Error;

/// Common error type for chat operations.
///
/// Every failure reported back to a connection is one of these variants, so the
/// live channel and the HTTP API share a single taxonomy.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Missing, malformed or expired credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to touch this conversation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Unknown conversation or message cursor.
    #[error("{0} not found")]
    NotFound(String),

    /// Message body (or other input) rejected.
    #[error("validation error: {0}")]
    Validation(String),

    /// Request not valid in the connection's current state (e.g. send before join).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Conversation no longer accepts writes.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage or network hiccup. Retrying the whole request is safe.
    #[error("transient error: {0}")]
    Transient(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ChatError {
    /// Stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::Unauthorized(_) => "unauthorized",
            ChatError::Forbidden(_) => "forbidden",
            ChatError::NotFound(_) => "not_found",
            ChatError::Validation(_) => "validation_error",
            ChatError::InvalidState(_) => "invalid_state",
            ChatError::Conflict(_) => "conflict",
            ChatError::Transient(_) => "transient",
            ChatError::Io(_) | ChatError::Config(_) => "internal",
        }
    }

    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::Transient(_))
    }
}

// Storage failures are always reported as transient.
impl From<sqlx::Error> for ChatError {
    fn from(e: sqlx::Error) -> Self {
        ChatError::Transient(e.to_string())
    }
}

/// Result type alias for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;
