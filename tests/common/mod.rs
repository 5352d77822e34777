//! Test helpers for integration tests.
//!
//! Provides a fully wired chat core over an in-memory or file database plus
//! helpers for minting tokens and waiting on pushes.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::timeout;

use mentorlink::chat::{ChatGateway, Connection, Message, Push};
use mentorlink::config::ChatConfig;
use mentorlink::{Database, Identity, JwtAuthenticator, NewConversation, UserRole};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Secret shared by every test authenticator.
pub const TEST_SECRET: &str = "test-secret-key-for-testing-only";

/// Chat core wired over a test database.
pub struct TestChat {
    pub db: Database,
    pub auth: JwtAuthenticator,
    pub gateway: Arc<ChatGateway>,
    _dir: Option<TempDir>,
}

impl TestChat {
    /// Create a chat core with default limits.
    pub async fn new() -> Self {
        Self::with_config(ChatConfig::default()).await
    }

    /// Create a chat core with custom limits.
    pub async fn with_config(config: ChatConfig) -> Self {
        let db = Database::open_in_memory()
            .await
            .expect("Failed to create test database");
        Self::wire(db, config, None)
    }

    /// Create a chat core over a WAL database file with a pool of
    /// `max_connections`, as `Database::open` is used in production.
    pub async fn on_disk(max_connections: u32) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db = Database::open(dir.path().join("chat.db"), max_connections)
            .await
            .expect("Failed to open test database");
        Self::wire(db, ChatConfig::default(), Some(dir))
    }

    fn wire(db: Database, config: ChatConfig, dir: Option<TempDir>) -> Self {
        let auth = JwtAuthenticator::new(TEST_SECRET);
        let gateway = Arc::new(ChatGateway::new(&db, Arc::new(auth.clone()), &config));
        Self {
            db,
            auth,
            gateway,
            _dir: dir,
        }
    }

    /// Mint a token for `user_id`.
    pub fn token(&self, user_id: i64) -> String {
        self.auth
            .issue(Identity::new(user_id, UserRole::Student), 3600)
            .expect("Failed to issue token")
    }

    /// Attach a new connection for `user_id`.
    pub async fn connect(&self, user_id: i64) -> Connection {
        self.gateway
            .attach(&self.token(user_id))
            .await
            .expect("Failed to attach")
    }

    /// Attach and join in one step.
    pub async fn connect_joined(&self, user_id: i64, conversation_id: i64) -> Connection {
        let conn = self.connect(user_id).await;
        self.gateway
            .join_room(conn.id(), conversation_id)
            .await
            .expect("Failed to join");
        conn
    }

    /// Create an active conversation.
    pub async fn conversation(&self, requester_id: i64, mentor_id: i64) -> i64 {
        self.gateway
            .registry()
            .create(&NewConversation::new(requester_id, mentor_id, "Mentoring"))
            .await
            .expect("Failed to create conversation")
            .id
    }
}

/// Wait for the next pushed message on a connection.
pub async fn next_message(conn: &mut Connection) -> Message {
    match timeout(DEFAULT_TIMEOUT, conn.recv()).await {
        Ok(Some(Push::NewMessage(message))) => message,
        Ok(None) => panic!("connection closed while waiting for a push"),
        Err(_) => panic!("timed out waiting for a push"),
    }
}

/// Assert that nothing more is queued for a connection.
pub async fn assert_no_push(conn: &mut Connection) {
    tokio::task::yield_now().await;
    assert!(conn.try_recv().is_none(), "unexpected push");
}
