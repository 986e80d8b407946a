use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::authority::{self, chats};
use crate::error::AppResult;
use crate::models::{AuthUser, CreateChatRequest, UpdateChatRequest};
use crate::AppState;

/// GET /api/rooms/:roomId/chats
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(room_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    authority::require_member(&state.db, &room_id, &user.profile_id).await?;
    Ok(Json(chats::list_chats(&state.db, &room_id).await?))
}

/// POST /api/rooms/:roomId/chats
pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(room_id): Path<String>,
    Json(body): Json<CreateChatRequest>,
) -> AppResult<impl IntoResponse> {
    let chat = chats::create_chat(&state.db, &room_id, &user.profile_id, &body).await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

/// PATCH /api/rooms/:roomId/chats/:chatId
pub async fn update_chat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((room_id, chat_id)): Path<(String, String)>,
    Json(body): Json<UpdateChatRequest>,
) -> AppResult<impl IntoResponse> {
    let chat = chats::update_chat(&state.db, &room_id, &user.profile_id, &chat_id, &body).await?;
    Ok(Json(chat))
}

/// DELETE /api/rooms/:roomId/chats/:chatId
pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((room_id, chat_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    chats::delete_chat(&state.db, &room_id, &user.profile_id, &chat_id).await?;
    state.gateway.drop_conversations(&[chat_id]).await;
    Ok(StatusCode::NO_CONTENT)
}
