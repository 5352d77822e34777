//! Chat message model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{ChatError, Result};

/// Which side of the mentorship sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    /// The participant who asked for mentorship.
    Requester,
    /// The mentor.
    Mentor,
}

impl SenderRole {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::Requester => "requester",
            SenderRole::Mentor => "mentor",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requester" => Some(SenderRole::Requester),
            "mentor" => Some(SenderRole::Mentor),
            _ => None,
        }
    }
}

impl std::fmt::Display for SenderRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted chat message.
///
/// Within one conversation messages are totally ordered by `(created_at, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Message ID.
    pub id: i64,
    /// Conversation the message belongs to.
    pub conversation_id: i64,
    /// Sender's user ID.
    pub sender_id: i64,
    /// Sender's role in the conversation.
    pub sender_role: SenderRole,
    /// Message text.
    pub body: String,
    /// Server-assigned timestamp.
    pub created_at: DateTime<Utc>,
}

/// Validate a message body and return its trimmed form.
///
/// Length is counted in characters, not bytes.
pub fn validate_body(body: &str, max_length: usize) -> Result<&str> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ChatError::Validation("message body must not be empty".into()));
    }
    let length = trimmed.chars().count();
    if length > max_length {
        return Err(ChatError::Validation(format!(
            "message body is {length} characters, limit is {max_length}"
        )));
    }
    Ok(trimmed)
}
