//! Conversation registry backed by the `conversations` table.

use chrono::Utc;
use tracing::info;

use super::{Conversation, ConversationStatus, NewConversation};
use crate::db::{format_timestamp, parse_timestamp, DbPool};
use crate::{ChatError, Result};

/// Database row type for Conversation.
#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: i64,
    participant_a: i64,
    participant_b: i64,
    topic: String,
    status: String,
    created_at: String,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = ChatError;

    fn try_from(row: ConversationRow) -> Result<Self> {
        let status = ConversationStatus::parse(&row.status).ok_or_else(|| {
            ChatError::Transient(format!(
                "conversation {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;
        let created_at = parse_timestamp(&row.created_at).ok_or_else(|| {
            ChatError::Transient(format!(
                "conversation {} has malformed timestamp '{}'",
                row.id, row.created_at
            ))
        })?;

        Ok(Self {
            id: row.id,
            participant_a: row.participant_a,
            participant_b: row.participant_b,
            topic: row.topic,
            status,
            created_at,
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, participant_a, participant_b, topic, status, created_at FROM conversations";

/// Authoritative record of conversations and who may take part in them.
///
/// The chat core only reads through [`get`](Self::get) and
/// [`is_participant`](Self::is_participant); `create` and `close` belong to the
/// mentorship lifecycle flow.
#[derive(Clone)]
pub struct ConversationRegistry {
    pool: DbPool,
}

impl ConversationRegistry {
    /// Create a registry over the given pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a conversation, failing with `NotFound` if it does not exist.
    pub async fn get(&self, conversation_id: i64) -> Result<Conversation> {
        self.find(conversation_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("conversation {conversation_id}")))
    }

    /// Get a conversation if it exists.
    pub async fn find(&self, conversation_id: i64) -> Result<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Conversation::try_from).transpose()
    }

    /// True iff `user_id` is one of the participants and the conversation is active.
    ///
    /// An unknown conversation is simply `false`.
    pub async fn is_participant(&self, conversation_id: i64, user_id: i64) -> Result<bool> {
        Ok(self
            .find(conversation_id)
            .await?
            .is_some_and(|c| c.is_active() && c.has_participant(user_id)))
    }

    /// List conversations `user_id` takes part in, newest first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationRow>(&format!(
            "{SELECT_COLUMNS} WHERE participant_a = $1 OR participant_b = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Conversation::try_from).collect()
    }

    /// Create a conversation once a mentorship has been established.
    pub async fn create(&self, new: &NewConversation) -> Result<Conversation> {
        if new.requester_id == new.mentor_id {
            return Err(ChatError::Validation(
                "requester and mentor must be different users".into(),
            ));
        }
        let topic = new.topic.trim();
        if topic.is_empty() {
            return Err(ChatError::Validation("topic must not be empty".into()));
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO conversations (participant_a, participant_b, topic, status, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(new.requester_id)
        .bind(new.mentor_id)
        .bind(topic)
        .bind(ConversationStatus::Active.as_str())
        .bind(format_timestamp(Utc::now()))
        .fetch_one(&self.pool)
        .await?;

        info!(
            conversation_id = id,
            requester_id = new.requester_id,
            mentor_id = new.mentor_id,
            "Conversation created"
        );
        self.get(id).await
    }

    /// Close a conversation.
    ///
    /// Returns true if it moved from active to closed, false if it was already
    /// closed. Closed is terminal; there is no reopen.
    pub async fn close(&self, conversation_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE conversations SET status = $1, closed_at = $2
             WHERE id = $3 AND status = $4",
        )
        .bind(ConversationStatus::Closed.as_str())
        .bind(format_timestamp(Utc::now()))
        .bind(conversation_id)
        .bind(ConversationStatus::Active.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish "already closed" from "no such conversation".
            self.get(conversation_id).await?;
            return Ok(false);
        }

        info!(conversation_id, "Conversation closed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> ConversationRegistry {
        let db = Database::open_in_memory().await.unwrap();
        ConversationRegistry::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = setup().await;
        let conv = registry
            .create(&NewConversation::new(1, 2, "  Career advice  "))
            .await
            .unwrap();

        assert_eq!(conv.participant_a, 1);
        assert_eq!(conv.participant_b, 2);
        assert_eq!(conv.topic, "Career advice");
        assert_eq!(conv.status, ConversationStatus::Active);

        let fetched = registry.get(conv.id).await.unwrap();
        assert_eq!(fetched, conv);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let registry = setup().await;
        let result = registry.get(999).await;
        assert!(matches!(result, Err(ChatError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_self_mentorship() {
        let registry = setup().await;
        let result = registry.create(&NewConversation::new(5, 5, "Solo")).await;
        assert!(matches!(result, Err(ChatError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_topic() {
        let registry = setup().await;
        let result = registry.create(&NewConversation::new(1, 2, "   ")).await;
        assert!(matches!(result, Err(ChatError::Validation(_))));
    }

    #[tokio::test]
    async fn test_is_participant() {
        let registry = setup().await;
        let conv = registry
            .create(&NewConversation::new(1, 2, "Topic"))
            .await
            .unwrap();

        assert!(registry.is_participant(conv.id, 1).await.unwrap());
        assert!(registry.is_participant(conv.id, 2).await.unwrap());
        assert!(!registry.is_participant(conv.id, 3).await.unwrap());
        assert!(!registry.is_participant(999, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_conversation_rejects_participants() {
        let registry = setup().await;
        let conv = registry
            .create(&NewConversation::new(1, 2, "Topic"))
            .await
            .unwrap();

        assert!(registry.close(conv.id).await.unwrap());
        assert!(!registry.is_participant(conv.id, 1).await.unwrap());

        let closed = registry.get(conv.id).await.unwrap();
        assert_eq!(closed.status, ConversationStatus::Closed);
        assert!(closed.has_participant(1));
    }

    #[tokio::test]
    async fn test_close_is_terminal_and_idempotent() {
        let registry = setup().await;
        let conv = registry
            .create(&NewConversation::new(1, 2, "Topic"))
            .await
            .unwrap();

        assert!(registry.close(conv.id).await.unwrap());
        assert!(!registry.close(conv.id).await.unwrap());
        assert!(matches!(
            registry.close(12345).await,
            Err(ChatError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_for_user() {
        let registry = setup().await;
        let first = registry
            .create(&NewConversation::new(1, 2, "First"))
            .await
            .unwrap();
        let second = registry
            .create(&NewConversation::new(3, 1, "Second"))
            .await
            .unwrap();
        registry
            .create(&NewConversation::new(3, 4, "Unrelated"))
            .await
            .unwrap();

        let list = registry.list_for_user(1).await.unwrap();
        let ids: Vec<i64> = list.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert!(registry.list_for_user(99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_timestamp_is_transient() {
        let db = Database::open_in_memory().await.unwrap();
        let registry = ConversationRegistry::new(db.pool().clone());
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO conversations (participant_a, participant_b, topic, status, created_at)
             VALUES (1, 2, 'Broken', 'active', 'yesterday')
             RETURNING id",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();

        let result = registry.get(id).await;
        assert!(matches!(result, Err(ChatError::Transient(_))));
        assert!(matches!(
            registry.list_for_user(1).await,
            Err(ChatError::Transient(_))
        ));
    }
}
