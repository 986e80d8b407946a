mod subscriptions;

use axum::{
    extract::{ws::{Message, WebSocket}, Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::middleware::auth::{resolve_session, token_from_headers};
use crate::models::AuthUser;
use crate::ws::events::{ClientEvent, ServerEvent};
use crate::ws::gateway::ClientId;
use crate::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let auth_user = extract_session(&state, &headers, &query).await;
    ws.on_upgrade(move |socket| handle_socket(socket, state, auth_user))
}

/// `?token=` first, then the same bearer/cookie lookup the REST routes use.
async fn extract_session(
    state: &AppState,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> Option<AuthUser> {
    let token = query
        .get("token")
        .filter(|t| !t.is_empty())
        .cloned()
        .or_else(|| token_from_headers(headers))?;

    match resolve_session(&state.db, &token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Gateway session lookup failed: {}", e);
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, auth_user: Option<AuthUser>) {
    let user = match auth_user {
        Some(u) => u,
        None => return,
    };

    let client_id = state.gateway.next_client_id().await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    state
        .gateway
        .register(client_id, user.profile_id.clone(), tx)
        .await;
    tracing::info!("Gateway client {} connected as {}", client_id, user.profile_id);

    // Forward queued frames to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let state_clone = state.clone();
    let user_clone = user.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => {
                    let text_str: &str = &text;
                    match serde_json::from_str::<ClientEvent>(text_str) {
                        Ok(event) => {
                            handle_client_event(&state_clone, client_id, &user_clone, event).await;
                        }
                        Err(_) => {
                            state_clone
                                .gateway
                                .send_to(
                                    client_id,
                                    &ServerEvent::Error {
                                        message: "Unrecognized frame".into(),
                                    },
                                )
                                .await;
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.gateway.unregister(client_id).await;
    tracing::info!("Gateway client {} disconnected", client_id);
}

async fn handle_client_event(
    state: &AppState,
    client_id: ClientId,
    user: &AuthUser,
    event: ClientEvent,
) {
    match event {
        ClientEvent::Subscribe { conversation_id } => {
            subscriptions::handle_subscribe(state, client_id, user, conversation_id).await;
        }
        ClientEvent::Unsubscribe { conversation_id } => {
            state.gateway.unsubscribe(client_id, &conversation_id).await;
        }
        ClientEvent::Ping => {
            state.gateway.send_to(client_id, &ServerEvent::Pong).await;
        }
    }
}
