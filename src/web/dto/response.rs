//! Response DTOs for the HTTP API.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chat::{HistoryPage, Message, SenderRole};
use crate::conversation::{Conversation, ConversationStatus};

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Conversation as seen by one of its participants.
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    /// Conversation ID.
    pub id: i64,
    /// Mentorship topic.
    pub topic: String,
    /// Lifecycle status.
    pub status: ConversationStatus,
    /// Requester's user ID.
    pub requester_id: i64,
    /// Mentor's user ID.
    pub mentor_id: i64,
    /// The caller's role in this conversation.
    pub my_role: Option<SenderRole>,
    /// The other participant.
    pub counterpart_id: Option<i64>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl ConversationResponse {
    /// Build the view of `conversation` for `user_id`.
    pub fn for_user(conversation: Conversation, user_id: i64) -> Self {
        Self {
            my_role: conversation.role_of(user_id),
            counterpart_id: conversation.counterpart_of(user_id),
            id: conversation.id,
            topic: conversation.topic,
            status: conversation.status,
            requester_id: conversation.participant_a,
            mentor_id: conversation.participant_b,
            created_at: conversation.created_at,
        }
    }
}

/// One page of history.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Messages in conversation order.
    pub messages: Vec<Message>,
    /// Cursor for the next page, if the page was full.
    pub next_cursor: Option<i64>,
}

impl From<HistoryPage> for HistoryResponse {
    fn from(page: HistoryPage) -> Self {
        Self {
            messages: page.messages,
            next_cursor: page.next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_wraps_data() {
        let json = serde_json::to_value(ApiResponse::new(vec![1, 2])).unwrap();
        assert_eq!(json["data"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_conversation_response_for_mentor() {
        let conv = Conversation {
            id: 4,
            participant_a: 10,
            participant_b: 20,
            topic: "Interview prep".to_string(),
            status: ConversationStatus::Active,
            created_at: Utc::now(),
        };
        let view = ConversationResponse::for_user(conv, 20);
        assert_eq!(view.my_role, Some(SenderRole::Mentor));
        assert_eq!(view.counterpart_id, Some(10));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["my_role"], "mentor");
    }

    #[test]
    fn test_history_response_null_cursor() {
        let page = HistoryPage {
            conversation_id: 1,
            messages: Vec::new(),
            next_cursor: None,
        };
        let json = serde_json::to_value(HistoryResponse::from(page)).unwrap();
        assert!(json["next_cursor"].is_null());
        assert_eq!(json["messages"], serde_json::json!([]));
    }
}
