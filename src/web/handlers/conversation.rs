//! Conversation and history handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use super::AppState;
use crate::web::dto::{ApiResponse, ConversationResponse, HistoryQuery, HistoryResponse};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// GET /api/conversations - List the caller's conversations.
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<ApiResponse<Vec<ConversationResponse>>>, ApiError> {
    let conversations = state.gateway.list_conversations(identity.user_id).await?;

    let responses = conversations
        .into_iter()
        .map(|c| ConversationResponse::for_user(c, identity.user_id))
        .collect();

    Ok(Json(ApiResponse::new(responses)))
}

/// GET /api/conversations/:id - Get one conversation.
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(conversation_id): Path<i64>,
) -> Result<Json<ApiResponse<ConversationResponse>>, ApiError> {
    let conversation = state
        .gateway
        .conversation(identity.user_id, conversation_id)
        .await?;

    Ok(Json(ApiResponse::new(ConversationResponse::for_user(
        conversation,
        identity.user_id,
    ))))
}

/// GET /api/conversations/:id/messages - Read history after an optional cursor.
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(conversation_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<HistoryResponse>>, ApiError> {
    let page = state
        .gateway
        .fetch_history(identity.user_id, conversation_id, query.since_id, query.limit)
        .await?;

    tracing::debug!(
        user_id = identity.user_id,
        conversation_id,
        count = page.messages.len(),
        "History served"
    );

    Ok(Json(ApiResponse::new(HistoryResponse::from(page))))
}
