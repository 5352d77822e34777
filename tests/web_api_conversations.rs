//! Web API Conversation Tests
//!
//! Integration tests for conversation and history endpoints.

mod common;

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;
use common::TestChat;
use mentorlink::web::handlers::AppState;
use mentorlink::web::middleware::SharedAuthenticator;
use mentorlink::web::router::{create_health_router, create_router};
use serde_json::Value;

const REQUESTER: i64 = 1;
const MENTOR: i64 = 2;
const OUTSIDER: i64 = 3;

/// Create a test server over a fresh chat core.
fn create_test_server(chat: &TestChat) -> TestServer {
    let app_state = Arc::new(AppState::new(Arc::clone(&chat.gateway)));
    let authenticator: SharedAuthenticator = Arc::new(chat.auth.clone());

    let router = create_router(app_state, authenticator, &[]).merge(create_health_router());

    TestServer::new(router).expect("Failed to create test server")
}

/// Persist `count` messages from the requester.
async fn seed_messages(chat: &TestChat, conv: i64, count: usize) {
    let conn = chat.connect_joined(REQUESTER, conv).await;
    for i in 1..=count {
        chat.gateway
            .send_message(conn.id(), conv, &format!("message {i}"))
            .await
            .unwrap();
    }
    chat.gateway.detach(conn.id()).await;
}

fn bearer(chat: &TestChat, user_id: i64) -> String {
    format!("Bearer {}", chat.token(user_id))
}

#[tokio::test]
async fn test_health() {
    let chat = TestChat::new().await;
    let server = create_test_server(&chat);

    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "OK");
}

#[tokio::test]
async fn test_list_conversations() {
    let chat = TestChat::new().await;
    let server = create_test_server(&chat);
    let first = chat.conversation(REQUESTER, MENTOR).await;
    let second = chat.conversation(OUTSIDER, MENTOR).await;

    let response = server
        .get("/api/conversations")
        .add_header(AUTHORIZATION, bearer(&chat, MENTOR))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let list = body["data"].as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["id"], second);
    assert_eq!(list[1]["id"], first);
    assert_eq!(list[0]["my_role"], "mentor");

    let response = server
        .get("/api/conversations")
        .add_header(AUTHORIZATION, bearer(&chat, REQUESTER))
        .await;
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_requires_authentication() {
    let chat = TestChat::new().await;
    let server = create_test_server(&chat);

    let response = server.get("/api/conversations").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .get("/api/conversations")
        .add_header(AUTHORIZATION, "Bearer not-a-token")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_get_conversation() {
    let chat = TestChat::new().await;
    let server = create_test_server(&chat);
    let conv = chat.conversation(REQUESTER, MENTOR).await;

    let response = server
        .get(&format!("/api/conversations/{conv}"))
        .add_header(AUTHORIZATION, bearer(&chat, REQUESTER))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["topic"], "Mentoring");
    assert_eq!(body["data"]["counterpart_id"], MENTOR);
    assert_eq!(body["data"]["status"], "active");

    let response = server
        .get(&format!("/api/conversations/{conv}"))
        .add_header(AUTHORIZATION, bearer(&chat, OUTSIDER))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = server
        .get("/api/conversations/9999")
        .add_header(AUTHORIZATION, bearer(&chat, REQUESTER))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_history_with_cursor() {
    let chat = TestChat::new().await;
    let server = create_test_server(&chat);
    let conv = chat.conversation(REQUESTER, MENTOR).await;
    seed_messages(&chat, conv, 5).await;

    let response = server
        .get(&format!("/api/conversations/{conv}/messages?since_id=2"))
        .add_header(AUTHORIZATION, bearer(&chat, MENTOR))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let ids: Vec<i64> = body["data"]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 4, 5]);
    assert!(body["data"]["next_cursor"].is_null());
}

#[tokio::test]
async fn test_history_paging() {
    let chat = TestChat::new().await;
    let server = create_test_server(&chat);
    let conv = chat.conversation(REQUESTER, MENTOR).await;
    seed_messages(&chat, conv, 5).await;

    let response = server
        .get(&format!("/api/conversations/{conv}/messages?limit=2"))
        .add_header(AUTHORIZATION, bearer(&chat, REQUESTER))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["next_cursor"], 2);
    assert_eq!(body["data"]["messages"][0]["body"], "message 1");
    assert_eq!(body["data"]["messages"][0]["sender_role"], "requester");
}

#[tokio::test]
async fn test_history_token_in_query() {
    let chat = TestChat::new().await;
    let server = create_test_server(&chat);
    let conv = chat.conversation(REQUESTER, MENTOR).await;

    let response = server
        .get(&format!(
            "/api/conversations/{conv}/messages?token={}",
            chat.token(MENTOR)
        ))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_history_errors() {
    let chat = TestChat::new().await;
    let server = create_test_server(&chat);
    let conv = chat.conversation(REQUESTER, MENTOR).await;
    seed_messages(&chat, conv, 1).await;

    let response = server
        .get(&format!("/api/conversations/{conv}/messages"))
        .add_header(AUTHORIZATION, bearer(&chat, OUTSIDER))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let response = server
        .get("/api/conversations/9999/messages")
        .add_header(AUTHORIZATION, bearer(&chat, REQUESTER))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server
        .get(&format!("/api/conversations/{conv}/messages?since_id=777"))
        .add_header(AUTHORIZATION, bearer(&chat, REQUESTER))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_history_of_closed_conversation() {
    let chat = TestChat::new().await;
    let server = create_test_server(&chat);
    let conv = chat.conversation(REQUESTER, MENTOR).await;
    seed_messages(&chat, conv, 2).await;
    chat.gateway.registry().close(conv).await.unwrap();

    let response = server
        .get(&format!("/api/conversations/{conv}/messages"))
        .add_header(AUTHORIZATION, bearer(&chat, MENTOR))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["messages"].as_array().unwrap().len(), 2);

    let response = server
        .get(&format!("/api/conversations/{conv}"))
        .add_header(AUTHORIZATION, bearer(&chat, MENTOR))
        .await;
    let body: Value = response.json();
    assert_eq!(body["data"]["status"], "closed");
}

#[tokio::test]
async fn test_websocket_requires_credential() {
    let chat = TestChat::new().await;
    let server = create_test_server(&chat);

    let response = server.get("/api/chat/ws").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}
