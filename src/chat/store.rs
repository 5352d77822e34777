//! Durable message log.
//!
//! Messages are appended per conversation under a per-conversation clock so
//! that ids and timestamps are assigned in one total order, and read back in
//! that same order for catch-up.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::message::{validate_body, Message, SenderRole};
use crate::db::{format_timestamp, parse_timestamp, DbPool};
use crate::{ChatError, Result};

/// Ordering state of one conversation.
///
/// Holding the guard returned by [`MessageStore::clock`] is the serialization
/// point for that conversation.
#[derive(Debug)]
pub struct ConversationClock {
    conversation_id: i64,
    last_created_at: Option<DateTime<Utc>>,
    loaded: bool,
}

impl ConversationClock {
    fn new(conversation_id: i64) -> Self {
        Self {
            conversation_id,
            last_created_at: None,
            loaded: false,
        }
    }

    /// Conversation this clock orders.
    pub fn conversation_id(&self) -> i64 {
        self.conversation_id
    }

    /// Next timestamp: now, or one microsecond past the previous message,
    /// whichever is later. Wall-clock steps backwards never reorder history.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        }
    }
}

/// Exclusive hold on a conversation's clock.
pub type ClockGuard = OwnedMutexGuard<ConversationClock>;

/// Database row type for Message.
#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    conversation_id: i64,
    sender_id: i64,
    sender_role: String,
    body: String,
    created_at: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = ChatError;

    fn try_from(row: MessageRow) -> Result<Self> {
        let sender_role = SenderRole::parse(&row.sender_role).ok_or_else(|| {
            ChatError::Transient(format!(
                "message {} has unknown sender role '{}'",
                row.id, row.sender_role
            ))
        })?;
        let created_at = parse_timestamp(&row.created_at).ok_or_else(|| {
            ChatError::Transient(format!(
                "message {} has malformed timestamp '{}'",
                row.id, row.created_at
            ))
        })?;

        Ok(Self {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            sender_role,
            body: row.body,
            created_at,
        })
    }
}

/// Append-only, per-conversation ordered message log.
pub struct MessageStore {
    pool: DbPool,
    max_body_length: usize,
    clocks: Mutex<ClockMap>,
}

/// Clocks of recently written conversations.
///
/// Idle entries are pruned once the map reaches `prune_at`; a pruned clock
/// reloads its last timestamp from the database on the next append.
struct ClockMap {
    clocks: HashMap<i64, Arc<Mutex<ConversationClock>>>,
    prune_at: usize,
}

/// Map size that triggers the first prune.
const CLOCK_PRUNE_THRESHOLD: usize = 1024;

impl ClockMap {
    fn new() -> Self {
        Self {
            clocks: HashMap::new(),
            prune_at: CLOCK_PRUNE_THRESHOLD,
        }
    }

    fn get(&mut self, conversation_id: i64) -> Arc<Mutex<ConversationClock>> {
        if self.clocks.len() >= self.prune_at {
            self.prune();
        }
        Arc::clone(
            self.clocks
                .entry(conversation_id)
                .or_insert_with(|| Arc::new(Mutex::new(ConversationClock::new(conversation_id)))),
        )
    }

    /// Drop clocks nobody holds or waits on.
    fn prune(&mut self) {
        let before = self.clocks.len();
        self.clocks.retain(|_, clock| Arc::strong_count(clock) > 1);
        self.prune_at = (self.clocks.len() * 2).max(CLOCK_PRUNE_THRESHOLD);
        debug!(
            pruned = before - self.clocks.len(),
            retained = self.clocks.len(),
            "Pruned idle conversation clocks"
        );
    }
}

impl MessageStore {
    /// Create a store over the given pool.
    pub fn new(pool: DbPool, max_body_length: usize) -> Self {
        Self {
            pool,
            max_body_length,
            clocks: Mutex::new(ClockMap::new()),
        }
    }

    /// Maximum accepted body length in characters.
    pub fn max_body_length(&self) -> usize {
        self.max_body_length
    }

    /// Acquire the ordering clock of a conversation.
    ///
    /// Appends to the same conversation wait here; other conversations are
    /// unaffected.
    pub async fn clock(&self, conversation_id: i64) -> ClockGuard {
        let clock = self.clocks.lock().await.get(conversation_id);
        clock.lock_owned().await
    }

    #[cfg(test)]
    async fn cached_clocks(&self) -> usize {
        self.clocks.lock().await.clocks.len()
    }

    /// Append a message, taking the conversation's clock for the duration.
    pub async fn append(
        &self,
        conversation_id: i64,
        sender_id: i64,
        sender_role: SenderRole,
        body: &str,
    ) -> Result<Message> {
        let mut clock = self.clock(conversation_id).await;
        self.append_with(&mut clock, sender_id, sender_role, body)
            .await
    }

    /// Append a message while the caller already holds the clock.
    ///
    /// The message is committed and visible to [`history`](Self::history)
    /// when this returns. On error nothing was written.
    ///
    /// Reads run before the write and outside any transaction; the write is
    /// one autocommit `INSERT`. A WAL read transaction that upgrades to a
    /// write fails with `SQLITE_BUSY_SNAPSHOT` (not retried by the busy
    /// timeout) if another connection committed in between.
    pub async fn append_with(
        &self,
        clock: &mut ConversationClock,
        sender_id: i64,
        sender_role: SenderRole,
        body: &str,
    ) -> Result<Message> {
        let body = validate_body(body, self.max_body_length)?;
        let conversation_id = clock.conversation_id;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM conversations WHERE id = $1)")
                .bind(conversation_id)
                .fetch_one(&self.pool)
                .await?;
        if !exists {
            return Err(ChatError::NotFound(format!("conversation {conversation_id}")));
        }

        if !clock.loaded {
            let last: Option<String> = sqlx::query_scalar(
                "SELECT created_at FROM messages WHERE conversation_id = $1
                 ORDER BY created_at DESC, id DESC LIMIT 1",
            )
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?;
            clock.last_created_at = match last {
                Some(raw) => Some(parse_timestamp(&raw).ok_or_else(|| {
                    ChatError::Transient(format!(
                        "conversation {conversation_id} has malformed message timestamp '{raw}'"
                    ))
                })?),
                None => None,
            };
            clock.loaded = true;
        }

        let created_at = clock.next_timestamp();

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO messages (conversation_id, sender_id, sender_role, body, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(sender_role.as_str())
        .bind(body)
        .bind(format_timestamp(created_at))
        .fetch_one(&self.pool)
        .await?;

        clock.last_created_at = Some(created_at);

        debug!(conversation_id, message_id = id, sender_id, "Message appended");

        Ok(Message {
            id,
            conversation_id,
            sender_id,
            sender_role,
            body: body.to_string(),
            created_at,
        })
    }

    /// Read messages in `(created_at, id)` order.
    ///
    /// With `since_id`, only messages after that cursor are returned. The
    /// cursor must name a message of this conversation.
    pub async fn history(
        &self,
        conversation_id: i64,
        since_id: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Message>> {
        if limit == 0 {
            return Err(ChatError::Validation("limit must be at least 1".into()));
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM conversations WHERE id = $1)")
                .bind(conversation_id)
                .fetch_one(&self.pool)
                .await?;
        if !exists {
            return Err(ChatError::NotFound(format!("conversation {conversation_id}")));
        }

        if let Some(cursor) = since_id {
            let known: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM messages WHERE id = $1 AND conversation_id = $2)",
            )
            .bind(cursor)
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await?;
            if !known {
                return Err(ChatError::NotFound(format!("message cursor {cursor}")));
            }
        }

        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, conversation_id, sender_id, sender_role, body, created_at
            FROM messages
            WHERE conversation_id = $1 AND id > $2
            ORDER BY created_at ASC, id ASC
            LIMIT $3
            "#,
        )
        .bind(conversation_id)
        .bind(since_id.unwrap_or(0))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }
}
