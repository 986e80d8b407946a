use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::authority::conversation;
use crate::error::AppResult;
use crate::models::AuthUser;
use crate::AppState;

/// POST /api/rooms/:roomId/conversations/:memberId
pub async fn open_direct(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((room_id, member_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let direct =
        conversation::open_direct(&state.db, &room_id, &user.profile_id, &member_id).await?;
    Ok(Json(direct))
}
