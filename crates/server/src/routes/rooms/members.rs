use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use roomchat_shared::wire::ChangeRoleRequest;
use std::sync::Arc;

use super::notify_member_removed;
use crate::authority::{self, membership};
use crate::error::AppResult;
use crate::models::AuthUser;
use crate::ws::events::ServerEvent;
use crate::AppState;

/// GET /api/rooms/:roomId/members
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(room_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    authority::require_member(&state.db, &room_id, &user.profile_id).await?;
    Ok(Json(authority::list_members(&state.db, &room_id).await?))
}

/// PATCH /api/rooms/:roomId/members/:memberId
pub async fn change_role(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((room_id, member_id)): Path<(String, String)>,
    Json(body): Json<ChangeRoleRequest>,
) -> AppResult<impl IntoResponse> {
    let member =
        membership::change_role(&state.db, &room_id, &user.profile_id, &member_id, body.role)
            .await?;

    let profiles = authority::room_profile_ids(&state.db, &room_id).await?;
    state
        .gateway
        .send_to_profiles(
            &profiles,
            &ServerEvent::MemberRoleUpdated {
                room_id: room_id.clone(),
                member_id: member.id.clone(),
                role: member.role,
            },
        )
        .await;

    Ok(Json(member))
}

/// DELETE /api/rooms/:roomId/members/:memberId
pub async fn kick_member(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((room_id, member_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let member = membership::kick_member(&state.db, &room_id, &user.profile_id, &member_id).await?;
    notify_member_removed(&state, &room_id, &member.id, &member.profile_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
