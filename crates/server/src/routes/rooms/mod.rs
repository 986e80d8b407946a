mod chats;
mod members;

pub use chats::*;
pub use members::*;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::authority::{self, membership};
use crate::error::AppResult;
use crate::models::{AuthUser, CreateRoomRequest, RoomDetail, UpdateRoomRequest};
use crate::ws::events::ServerEvent;
use crate::AppState;

/// POST /api/rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<CreateRoomRequest>,
) -> AppResult<impl IntoResponse> {
    let room = membership::create_room(&state.db, &user.profile_id, &body).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// GET /api/rooms
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    Ok(Json(membership::list_rooms(&state.db, &user.profile_id).await?))
}

/// GET /api/rooms/:roomId
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(room_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let room = authority::find_room(&state.db, &room_id).await?;
    let me = authority::require_member(&state.db, &room_id, &user.profile_id).await?;

    Ok(Json(RoomDetail {
        room,
        role: me.role,
        member_id: me.id,
        chats: authority::chats::list_chats(&state.db, &room_id).await?,
        members: authority::list_members(&state.db, &room_id).await?,
    }))
}

/// PATCH /api/rooms/:roomId
pub async fn update_room(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(room_id): Path<String>,
    Json(body): Json<UpdateRoomRequest>,
) -> AppResult<impl IntoResponse> {
    let room = membership::update_room(&state.db, &room_id, &user.profile_id, &body).await?;
    Ok(Json(room))
}

/// DELETE /api/rooms/:roomId
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(room_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let conversations = authority::room_conversation_ids(&state.db, &room_id).await?;
    let profiles = membership::delete_room(&state.db, &room_id, &user.profile_id).await?;

    state.gateway.drop_conversations(&conversations).await;
    state
        .gateway
        .send_to_profiles(&profiles, &ServerEvent::RoomDeleted { room_id })
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/rooms/:roomId/invite-code
pub async fn rotate_invite_code(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(room_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let room = membership::rotate_invite_code(&state.db, &room_id, &user.profile_id).await?;

    let profiles = authority::room_profile_ids(&state.db, &room_id).await?;
    state
        .gateway
        .send_to_profiles(&profiles, &ServerEvent::InviteCodeRotated { room_id })
        .await;

    Ok(Json(room))
}

/// POST /api/invites/:inviteCode
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(invite_code): Path<String>,
) -> AppResult<impl IntoResponse> {
    let outcome = membership::join_by_invite(&state.db, &user.profile_id, &invite_code).await?;
    let status = if outcome.newly_joined {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.room)))
}

/// DELETE /api/rooms/:roomId/members/me
pub async fn leave_room(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(room_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let member = membership::leave_room(&state.db, &room_id, &user.profile_id).await?;
    notify_member_removed(&state, &room_id, &member.id, &member.profile_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Tells the room (and the removed profile) and cuts the removed profile's
/// live subscriptions.
pub(crate) async fn notify_member_removed(
    state: &AppState,
    room_id: &str,
    member_id: &str,
    profile_id: &str,
) -> AppResult<()> {
    let conversations = authority::room_conversation_ids(&state.db, room_id).await?;
    state
        .gateway
        .unsubscribe_profile(profile_id, &conversations)
        .await;

    let mut profiles = authority::room_profile_ids(&state.db, room_id).await?;
    profiles.push(profile_id.to_string());
    state
        .gateway
        .send_to_profiles(
            &profiles,
            &ServerEvent::MemberRemoved {
                room_id: room_id.to_string(),
                member_id: member_id.to_string(),
            },
        )
        .await;
    Ok(())
}
