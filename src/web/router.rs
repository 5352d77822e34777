//! Router configuration for the HTTP surface.

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{get_conversation, get_messages, list_conversations, AppState};
use super::middleware::{auth_layer, create_cors_layer, SharedAuthenticator};
use super::ws::chat_ws_handler;

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    authenticator: SharedAuthenticator,
    cors_origins: &[String],
) -> Router {
    let conversation_routes = Router::new()
        .route("/", get(list_conversations))
        .route("/:id", get(get_conversation))
        .route("/:id/messages", get(get_messages));

    let chat_routes = Router::new().route("/ws", get(chat_ws_handler));

    let api_routes = Router::new()
        .nest("/conversations", conversation_routes)
        .nest("/chat", chat_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(move |req, next| {
                    let authenticator = authenticator.clone();
                    auth_layer(authenticator, req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
