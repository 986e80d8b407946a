use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use roomchat_shared::wire::{EditMessageRequest, SendMessageRequest};
use serde::Deserialize;
use std::sync::Arc;

use crate::authority::{conversation, messages};
use crate::error::AppResult;
use crate::models::AuthUser;
use crate::ws::events::ServerEvent;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub cursor: Option<String>,
}

/// GET /api/conversations/:conversationId/messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conversation_id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> AppResult<impl IntoResponse> {
    let scope = conversation::resolve(&state.db, &conversation_id).await?;
    conversation::require_access(&state.db, &scope, &user.profile_id).await?;

    let cursor = query.cursor.as_deref().filter(|c| !c.is_empty());
    let page = messages::list_page(
        &state.db,
        &scope.id,
        cursor,
        state.config.message_page_size,
    )
    .await?;
    Ok(Json(page))
}

/// POST /api/conversations/:conversationId/messages
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conversation_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> AppResult<impl IntoResponse> {
    let scope = conversation::resolve(&state.db, &conversation_id).await?;
    let actor = conversation::require_access(&state.db, &scope, &user.profile_id).await?;

    let message = messages::send(
        &state.db,
        &state.terms,
        &scope,
        &actor,
        &body.content,
        body.file_url.as_deref(),
    )
    .await?;

    state
        .gateway
        .broadcast_conversation(
            &scope.id,
            &ServerEvent::MessageCreated {
                conversation_id: scope.id.clone(),
                message: message.clone(),
            },
        )
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// PATCH /api/conversations/:conversationId/messages/:messageId
pub async fn edit_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((conversation_id, message_id)): Path<(String, String)>,
    Json(body): Json<EditMessageRequest>,
) -> AppResult<impl IntoResponse> {
    let scope = conversation::resolve(&state.db, &conversation_id).await?;
    let actor = conversation::require_access(&state.db, &scope, &user.profile_id).await?;

    let message =
        messages::edit(&state.db, &state.terms, &scope, &actor, &message_id, &body.content).await?;
    broadcast_update(&state, &scope.id, &message).await;

    Ok(Json(message))
}

/// DELETE /api/conversations/:conversationId/messages/:messageId
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((conversation_id, message_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let scope = conversation::resolve(&state.db, &conversation_id).await?;
    let actor = conversation::require_access(&state.db, &scope, &user.profile_id).await?;

    let message = messages::delete(&state.db, &scope, &actor, &message_id).await?;
    broadcast_update(&state, &scope.id, &message).await;

    Ok(Json(message))
}

async fn broadcast_update(
    state: &AppState,
    conversation_id: &str,
    message: &roomchat_shared::wire::Message,
) {
    state
        .gateway
        .broadcast_conversation(
            conversation_id,
            &ServerEvent::MessageUpdated {
                conversation_id: conversation_id.to_string(),
                message: message.clone(),
            },
        )
        .await;
}
