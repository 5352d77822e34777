//! MentorLink - mentorship real-time chat core.
//!
//! Two-party conversations between a requester and a mentor, with messages
//! persisted in one total order per conversation and pushed live to every
//! joined connection in that same order.

pub mod auth;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod logging;
pub mod web;

pub use auth::{Authenticator, Identity, JwtAuthenticator, UserRole};
pub use chat::{ChatGateway, Connection, ConnectionId, HistoryPage, Message, SenderRole};
pub use config::Config;
pub use conversation::{Conversation, ConversationRegistry, ConversationStatus, NewConversation};
pub use db::Database;
pub use error::{ChatError, Result};
pub use web::WebServer;
