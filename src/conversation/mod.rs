//! Conversation registry.
//!
//! A conversation is the two-party mentorship room. Its participant set is
//! fixed at creation; status only moves from active to closed.

mod registry;

pub use registry::ConversationRegistry;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chat::SenderRole;

/// Conversation lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    /// Accepting messages.
    Active,
    /// Terminal. Readable, no new messages.
    Closed,
}

impl ConversationStatus {
    /// Database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Closed => "closed",
        }
    }

    /// Parse from the database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ConversationStatus::Active),
            "closed" => Some(ConversationStatus::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A mentorship conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    /// Conversation ID (also the room ID).
    pub id: i64,
    /// The requester.
    pub participant_a: i64,
    /// The mentor.
    pub participant_b: i64,
    /// Mentorship topic.
    pub topic: String,
    /// Lifecycle status.
    pub status: ConversationStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Whether `user_id` is one of the two participants, regardless of status.
    pub fn has_participant(&self, user_id: i64) -> bool {
        self.participant_a == user_id || self.participant_b == user_id
    }

    /// Whether the conversation still accepts messages.
    pub fn is_active(&self) -> bool {
        self.status == ConversationStatus::Active
    }

    /// The role `user_id` plays in this conversation, if any.
    pub fn role_of(&self, user_id: i64) -> Option<SenderRole> {
        if user_id == self.participant_a {
            Some(SenderRole::Requester)
        } else if user_id == self.participant_b {
            Some(SenderRole::Mentor)
        } else {
            None
        }
    }

    /// The other participant.
    pub fn counterpart_of(&self, user_id: i64) -> Option<i64> {
        match self.role_of(user_id)? {
            SenderRole::Requester => Some(self.participant_b),
            SenderRole::Mentor => Some(self.participant_a),
        }
    }
}

/// Data for creating a conversation.
#[derive(Debug, Clone)]
pub struct NewConversation {
    /// The requester.
    pub requester_id: i64,
    /// The mentor.
    pub mentor_id: i64,
    /// Mentorship topic.
    pub topic: String,
}

impl NewConversation {
    /// Create a new conversation request.
    pub fn new(requester_id: i64, mentor_id: i64, topic: impl Into<String>) -> Self {
        Self {
            requester_id,
            mentor_id,
            topic: topic.into(),
        }
    }
}
