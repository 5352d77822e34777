//! Chat WebSocket handler.
//!
//! One task per socket: it forwards the connection's queued pushes to the
//! socket and processes client requests one at a time, in arrival order.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

use crate::chat::{ChatGateway, Connection, ConnectionId};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::BearerCredential;
use crate::ChatError;

use super::messages::{ClientMessage, ServerMessage};

/// WebSocket chat handler.
///
/// GET /api/chat/ws?token={jwt}
///
/// The token may also be sent as `Authorization: Bearer`. The connection is
/// attached before the upgrade so a bad credential is answered with 401.
pub async fn chat_ws_handler(
    State(state): State<Arc<AppState>>,
    BearerCredential(token): BearerCredential,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let gateway = Arc::clone(&state.gateway);
    let connection = gateway.attach(&token).await?;
    let connection_id = connection.id();

    tracing::info!(
        %connection_id,
        user_id = connection.user_id(),
        "WebSocket connection accepted"
    );

    let failed_gateway = Arc::clone(&gateway);
    Ok(ws
        .on_failed_upgrade(move |e| {
            tracing::debug!(%connection_id, "WebSocket upgrade failed: {}", e);
            tokio::spawn(async move {
                failed_gateway.detach(connection_id).await;
            });
        })
        .on_upgrade(move |socket| handle_socket(socket, gateway, connection)))
}

/// Drive one WebSocket until either side goes away.
async fn handle_socket(socket: WebSocket, gateway: Arc<ChatGateway>, mut connection: Connection) {
    let connection_id = connection.id();
    let user_id = connection.user_id();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text(&gateway, connection_id, user_id, &text).await;
                        if send_json(&mut ws_sender, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(%connection_id, "WebSocket closed by client");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(%connection_id, "WebSocket error: {}", e);
                        break;
                    }
                }
            }

            push = connection.recv() => {
                match push {
                    Some(push) => {
                        if send_json(&mut ws_sender, &ServerMessage::from(push)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    gateway.detach(connection_id).await;
    tracing::debug!(%connection_id, "WebSocket session ended");
}

async fn send_json(
    ws_sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => ws_sender.send(Message::Text(json.into())).await,
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            Ok(())
        }
    }
}

/// Parse and handle one text frame.
async fn handle_text(
    gateway: &ChatGateway,
    connection_id: ConnectionId,
    user_id: i64,
    text: &str,
) -> ServerMessage {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => handle_client_message(gateway, connection_id, user_id, msg).await,
        Err(e) => {
            tracing::debug!(%connection_id, "Failed to parse client message: {}", e);
            let request_id = serde_json::from_str::<serde_json::Value>(text)
                .ok()
                .and_then(|v| v.get("request_id")?.as_str().map(str::to_owned));
            ServerMessage::from_error(
                request_id,
                &ChatError::Validation("invalid message format".into()),
            )
        }
    }
}

/// Handle a client message and produce its reply.
async fn handle_client_message(
    gateway: &ChatGateway,
    connection_id: ConnectionId,
    user_id: i64,
    msg: ClientMessage,
) -> ServerMessage {
    let request_id = msg.request_id().map(str::to_owned);

    let result = match msg {
        ClientMessage::Join {
            conversation_id, ..
        } => gateway
            .join_room(connection_id, conversation_id)
            .await
            .map(|_| ServerMessage::Joined {
                request_id: request_id.clone(),
                conversation_id,
            }),

        ClientMessage::Leave {
            conversation_id, ..
        } => {
            gateway.leave_room(connection_id, conversation_id).await;
            Ok(ServerMessage::Left {
                request_id: request_id.clone(),
                conversation_id,
            })
        }

        ClientMessage::Send {
            conversation_id,
            body,
            ..
        } => gateway
            .send_message(connection_id, conversation_id, &body)
            .await
            .map(|message| ServerMessage::Sent {
                request_id: request_id.clone(),
                message,
            }),

        ClientMessage::History {
            conversation_id,
            since_id,
            limit,
            ..
        } => gateway
            .fetch_history(user_id, conversation_id, since_id, limit)
            .await
            .map(|page| ServerMessage::history(request_id.clone(), page)),

        ClientMessage::Ping { .. } => Ok(ServerMessage::Pong {
            request_id: request_id.clone(),
        }),
    };

    result.unwrap_or_else(|e| {
        tracing::debug!(%connection_id, code = e.code(), "Request failed: {}", e);
        ServerMessage::from_error(request_id, &e)
    })
}
