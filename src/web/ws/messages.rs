//! WebSocket message types for the live chat channel.

use serde::{Deserialize, Serialize};

use crate::chat::{HistoryPage, Message, Push};
use crate::ChatError;

/// Messages sent from client to server.
///
/// Every request may carry a `request_id`, echoed on its reply or error.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a conversation's room.
    Join {
        /// Conversation to join.
        conversation_id: i64,
        /// Correlation ID.
        #[serde(default)]
        request_id: Option<String>,
    },
    /// Leave a conversation's room.
    Leave {
        /// Conversation to leave.
        conversation_id: i64,
        /// Correlation ID.
        #[serde(default)]
        request_id: Option<String>,
    },
    /// Send a message to a joined room.
    Send {
        /// Target conversation.
        conversation_id: i64,
        /// Message text.
        body: String,
        /// Correlation ID.
        #[serde(default)]
        request_id: Option<String>,
    },
    /// Fetch history (no join required).
    History {
        /// Conversation to read.
        conversation_id: i64,
        /// Return only messages after this id.
        #[serde(default)]
        since_id: Option<i64>,
        /// Page size.
        #[serde(default)]
        limit: Option<u32>,
        /// Correlation ID.
        #[serde(default)]
        request_id: Option<String>,
    },
    /// Heartbeat ping.
    Ping {
        /// Correlation ID.
        #[serde(default)]
        request_id: Option<String>,
    },
}

impl ClientMessage {
    /// Correlation ID of this request.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ClientMessage::Join { request_id, .. }
            | ClientMessage::Leave { request_id, .. }
            | ClientMessage::Send { request_id, .. }
            | ClientMessage::History { request_id, .. }
            | ClientMessage::Ping { request_id } => request_id.as_deref(),
        }
    }
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Successfully joined a room.
    Joined {
        /// Correlation ID.
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        /// Conversation joined.
        conversation_id: i64,
    },
    /// Left a room.
    Left {
        /// Correlation ID.
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        /// Conversation left.
        conversation_id: i64,
    },
    /// Send confirmation: the message is persisted.
    Sent {
        /// Correlation ID.
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        /// The stored message.
        message: Message,
    },
    /// History page.
    History {
        /// Correlation ID.
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        /// Conversation read.
        conversation_id: i64,
        /// Messages in conversation order.
        messages: Vec<Message>,
        /// Cursor for the next page.
        next_cursor: Option<i64>,
    },
    /// A message was committed to a joined room.
    NewMessage {
        /// The message.
        message: Message,
    },
    /// Request failed.
    Error {
        /// Correlation ID of the failed request.
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        /// Error code.
        code: String,
        /// Error message.
        message: String,
    },
    /// Heartbeat pong response.
    Pong {
        /// Correlation ID.
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(
        request_id: Option<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Error {
            request_id,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Report a failed request. Internal details of transient and internal
    /// failures are not sent to the client.
    pub fn from_error(request_id: Option<String>, err: &ChatError) -> Self {
        let message = match err {
            ChatError::Transient(_) => "temporarily unavailable, please retry".to_string(),
            ChatError::Io(_) | ChatError::Config(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        Self::error(request_id, err.code(), message)
    }

    /// Create a history reply.
    pub fn history(request_id: Option<String>, page: HistoryPage) -> Self {
        Self::History {
            request_id,
            conversation_id: page.conversation_id,
            messages: page.messages,
            next_cursor: page.next_cursor,
        }
    }
}

impl From<Push> for ServerMessage {
    fn from(push: Push) -> Self {
        match push {
            Push::NewMessage(message) => ServerMessage::NewMessage { message },
        }
    }
}
