//! Chat gateway.
//!
//! Entry point for every chat operation. Enforces the per-room state machine
//! (unjoined, joining, joined), authorization against the conversation
//! registry, and write-then-broadcast ordering for sends.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::broadcaster::RoomBroadcaster;
use super::message::{validate_body, Message};
use super::session::{Connection, ConnectionId, JoinTicket, RoomState, SessionManager};
use super::store::MessageStore;
use crate::auth::Authenticator;
use crate::config::ChatConfig;
use crate::conversation::{Conversation, ConversationRegistry};
use crate::db::Database;
use crate::{ChatError, Result};

/// One page of conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryPage {
    /// Conversation the page belongs to.
    pub conversation_id: i64,
    /// Messages in `(created_at, id)` order.
    pub messages: Vec<Message>,
    /// Pass as `since_id` to fetch the next page; `None` when caught up.
    pub next_cursor: Option<i64>,
}

/// Coordinates sessions, rooms, the registry and the message store.
pub struct ChatGateway {
    sessions: Arc<SessionManager>,
    broadcaster: Arc<RoomBroadcaster>,
    registry: ConversationRegistry,
    store: Arc<MessageStore>,
    default_history_limit: u32,
    max_history_limit: u32,
}

impl ChatGateway {
    /// Wire a gateway over an opened database.
    pub fn new(db: &Database, authenticator: Arc<dyn Authenticator>, config: &ChatConfig) -> Self {
        let broadcaster = Arc::new(RoomBroadcaster::new());
        let sessions = Arc::new(SessionManager::new(
            authenticator,
            Arc::clone(&broadcaster),
            config.outbound_buffer,
        ));

        Self {
            sessions,
            broadcaster,
            registry: ConversationRegistry::new(db.pool().clone()),
            store: Arc::new(MessageStore::new(db.pool().clone(), config.max_body_length)),
            default_history_limit: config.default_history_limit.max(1),
            max_history_limit: config.max_history_limit.max(1),
        }
    }

    /// Session manager.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Room broadcaster.
    pub fn broadcaster(&self) -> &RoomBroadcaster {
        &self.broadcaster
    }

    /// Conversation registry.
    pub fn registry(&self) -> &ConversationRegistry {
        &self.registry
    }

    /// Message store.
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Authenticate and register a connection.
    pub async fn attach(&self, credential: &str) -> Result<Connection> {
        self.sessions.attach(credential).await
    }

    /// Tear down a connection and all of its subscriptions.
    pub async fn detach(&self, connection_id: ConnectionId) {
        self.sessions.detach(connection_id).await;
    }

    /// Join a conversation's room.
    ///
    /// Returns true if the connection newly joined, false if it already had.
    /// Unknown conversations, closed conversations and non-participants are
    /// all `Forbidden`.
    pub async fn join_room(&self, connection_id: ConnectionId, conversation_id: i64) -> Result<bool> {
        let (identity, sender) = match self.sessions.begin_join(connection_id, conversation_id).await? {
            JoinTicket::AlreadyJoined => return Ok(false),
            JoinTicket::Proceed { identity, sender } => (identity, sender),
        };

        let allowed = match self
            .registry
            .is_participant(conversation_id, identity.user_id)
            .await
        {
            Ok(allowed) => allowed,
            Err(e) => {
                self.sessions.abort_join(connection_id, conversation_id).await;
                return Err(e);
            }
        };
        if !allowed {
            self.sessions.abort_join(connection_id, conversation_id).await;
            warn!(
                %connection_id,
                conversation_id,
                user_id = identity.user_id,
                "Join refused"
            );
            return Err(ChatError::Forbidden(format!(
                "not a participant of conversation {conversation_id}"
            )));
        }

        self.broadcaster
            .join(conversation_id, connection_id, sender)
            .await;
        if !self.sessions.complete_join(connection_id, conversation_id).await {
            // Detached while authorizing; undo the subscription it may have missed.
            self.broadcaster.leave(conversation_id, connection_id).await;
            return Err(ChatError::InvalidState(format!(
                "connection {connection_id} detached during join"
            )));
        }

        info!(
            %connection_id,
            conversation_id,
            user_id = identity.user_id,
            "Joined room"
        );
        Ok(true)
    }

    /// Leave a conversation's room. Always succeeds.
    pub async fn leave_room(&self, connection_id: ConnectionId, conversation_id: i64) {
        let was_member = self.sessions.leave_room(connection_id, conversation_id).await;
        self.broadcaster.leave(conversation_id, connection_id).await;
        if was_member {
            debug!(%connection_id, conversation_id, "Left room");
        }
    }

    /// Persist a message and push it to everyone in the room.
    ///
    /// The returned message is the sender's confirmation; it is durable and
    /// visible to history. Once the write starts it finishes on its own task
    /// even if this future is dropped.
    pub async fn send_message(
        &self,
        connection_id: ConnectionId,
        conversation_id: i64,
        body: &str,
    ) -> Result<Message> {
        let identity = self.sessions.identity(connection_id).await?;

        let conversation = self
            .registry
            .find(conversation_id)
            .await?
            .ok_or_else(|| forbidden(conversation_id))?;
        let sender_role = conversation
            .role_of(identity.user_id)
            .ok_or_else(|| forbidden(conversation_id))?;

        if self.sessions.room_state(connection_id, conversation_id).await != Some(RoomState::Joined) {
            return Err(ChatError::InvalidState(format!(
                "join conversation {conversation_id} before sending"
            )));
        }
        if !conversation.is_active() {
            return Err(ChatError::Conflict(format!(
                "conversation {conversation_id} is closed"
            )));
        }

        let body = validate_body(body, self.store.max_body_length())?.to_string();

        let store = Arc::clone(&self.store);
        let broadcaster = Arc::clone(&self.broadcaster);
        let sender_id = identity.user_id;
        let commit = tokio::spawn(async move {
            let mut clock = store.clock(conversation_id).await;
            let message = store
                .append_with(&mut clock, sender_id, sender_role, &body)
                .await?;
            // Enqueue while still holding the clock so push order is commit order.
            let report = broadcaster.publish(conversation_id, &message).await;
            drop(clock);
            debug!(
                conversation_id,
                message_id = message.id,
                delivered = report.delivered,
                dropped = report.dropped,
                "Message published"
            );
            Ok::<_, ChatError>(message)
        });

        let message = commit
            .await
            .map_err(|e| ChatError::Transient(format!("send task failed: {e}")))??;

        info!(
            %connection_id,
            conversation_id,
            message_id = message.id,
            sender_id,
            "Message sent"
        );
        Ok(message)
    }

    /// Read a page of history for `user_id`.
    ///
    /// Requires no join. Participants may read closed conversations.
    /// `limit` defaults to the configured page size and is capped at the
    /// configured maximum.
    pub async fn fetch_history(
        &self,
        user_id: i64,
        conversation_id: i64,
        since_id: Option<i64>,
        limit: Option<u32>,
    ) -> Result<HistoryPage> {
        self.readable_conversation(user_id, conversation_id).await?;

        let limit = limit
            .unwrap_or(self.default_history_limit)
            .clamp(1, self.max_history_limit);
        let messages = self.store.history(conversation_id, since_id, limit).await?;

        let next_cursor = if messages.len() == limit as usize {
            messages.last().map(|m| m.id)
        } else {
            None
        };

        Ok(HistoryPage {
            conversation_id,
            messages,
            next_cursor,
        })
    }

    /// Conversations `user_id` takes part in, newest first.
    pub async fn list_conversations(&self, user_id: i64) -> Result<Vec<Conversation>> {
        self.registry.list_for_user(user_id).await
    }

    /// One conversation, visible only to its participants.
    pub async fn conversation(&self, user_id: i64, conversation_id: i64) -> Result<Conversation> {
        self.readable_conversation(user_id, conversation_id).await
    }

    async fn readable_conversation(&self, user_id: i64, conversation_id: i64) -> Result<Conversation> {
        let conversation = self.registry.get(conversation_id).await?;
        if !conversation.has_participant(user_id) {
            return Err(forbidden(conversation_id));
        }
        Ok(conversation)
    }
}

fn forbidden(conversation_id: i64) -> ChatError {
    ChatError::Forbidden(format!("not a participant of conversation {conversation_id}"))
}
