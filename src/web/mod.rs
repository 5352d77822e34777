//! HTTP and WebSocket surface.
//!
//! A small REST API for conversation lists and history, plus the WebSocket
//! live channel for join/leave/send and message pushes.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
pub mod ws;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::{create_health_router, create_router};
pub use server::WebServer;
