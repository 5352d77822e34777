//! API handlers.

pub mod conversation;

pub use conversation::*;

use std::sync::Arc;

use crate::chat::ChatGateway;

/// Shared application state.
pub struct AppState {
    /// Chat gateway.
    pub gateway: Arc<ChatGateway>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(gateway: Arc<ChatGateway>) -> Self {
        Self { gateway }
    }
}
