use roomchat_shared::constants::GENERAL_CHAT_NAME;
use roomchat_shared::membership::{MemberState, MembershipEvent};
use roomchat_shared::permissions::{authorize, Action, ResourceState, Role};
use roomchat_shared::validation::validate_room_name;
use roomchat_shared::wire::ChatKind;
use sqlx::{FromRow, Row, SqlitePool};

use super::{admin_count, find_member, find_member_by_id, find_room, require_member, room_profile_ids};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{CreateRoomRequest, Member, Room, RoomWithRole, UpdateRoomRequest};

fn new_invite_code() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Creates the room, its ADMIN creator and the `general` text chat in one
/// transaction.
pub async fn create_room(
    db: &SqlitePool,
    profile_id: &str,
    body: &CreateRoomRequest,
) -> AppResult<Room> {
    validate_room_name(&body.name).map_err(AppError::ValidationFailed)?;
    let role = MemberState::None
        .apply(MembershipEvent::CreateRoom, 0)?
        .role()
        .unwrap_or(Role::Admin);

    let room = Room {
        id: uuid::Uuid::new_v4().to_string(),
        name: body.name.trim().to_string(),
        image_url: body.image_url.clone().filter(|u| !u.trim().is_empty()),
        invite_code: new_invite_code(),
        profile_id: profile_id.to_string(),
        created_at: db::now(),
        updated_at: db::now(),
    };

    let mut tx = db.begin().await?;

    sqlx::query(
        "INSERT INTO rooms (id, name, image_url, invite_code, profile_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&room.id)
    .bind(&room.name)
    .bind(&room.image_url)
    .bind(&room.invite_code)
    .bind(&room.profile_id)
    .bind(&room.created_at)
    .bind(&room.updated_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO members (id, role, profile_id, room_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(role.as_str())
    .bind(profile_id)
    .bind(&room.id)
    .bind(&room.created_at)
    .bind(&room.created_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO chats (id, name, kind, profile_id, room_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(GENERAL_CHAT_NAME)
    .bind(ChatKind::Text.as_str())
    .bind(profile_id)
    .bind(&room.id)
    .bind(&room.created_at)
    .bind(&room.created_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!("Room {} created by {}", room.id, profile_id);
    Ok(room)
}

pub struct JoinOutcome {
    pub room: Room,
    pub member: Member,
    pub newly_joined: bool,
}

/// Joining a room the caller already belongs to returns the existing
/// membership unchanged.
pub async fn join_by_invite(
    db: &SqlitePool,
    profile_id: &str,
    invite_code: &str,
) -> AppResult<JoinOutcome> {
    let room = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE invite_code = ?")
        .bind(invite_code)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Invite"))?;

    if let Some(member) = find_member(db, &room.id, profile_id).await? {
        return Ok(JoinOutcome {
            room,
            member,
            newly_joined: false,
        });
    }

    let role = MemberState::None
        .apply(MembershipEvent::Join, 0)?
        .role()
        .unwrap_or(Role::Guest);
    let now = db::now();

    let inserted = sqlx::query(
        r#"INSERT INTO members (id, role, profile_id, room_id, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?)
           ON CONFLICT (profile_id, room_id) DO NOTHING"#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(role.as_str())
    .bind(profile_id)
    .bind(&room.id)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?
    .rows_affected();

    let member = require_member(db, &room.id, profile_id).await?;
    if inserted > 0 {
        tracing::info!("Profile {} joined room {} as {}", profile_id, room.id, member.role);
    }
    Ok(JoinOutcome {
        room,
        member,
        newly_joined: inserted > 0,
    })
}

/// Deletes the member only while the room would keep an admin.
async fn delete_member_guarded(db: &SqlitePool, room_id: &str, member_id: &str) -> AppResult<()> {
    let removed = sqlx::query(
        r#"DELETE FROM members
           WHERE id = ? AND room_id = ?
             AND (role != 'ADMIN'
                  OR (SELECT COUNT(*) FROM members WHERE room_id = ? AND role = 'ADMIN') > 1)"#,
    )
    .bind(member_id)
    .bind(room_id)
    .bind(room_id)
    .execute(db)
    .await?
    .rows_affected();

    if removed == 0 {
        return Err(AppError::Conflict("A room must keep at least one admin".into()));
    }
    Ok(())
}

/// Changes the role only while the room would keep an admin. The count is
/// re-read inside the UPDATE, so concurrent demotions cannot both pass.
pub async fn update_role_guarded(
    db: &SqlitePool,
    room_id: &str,
    member_id: &str,
    role: Role,
) -> AppResult<()> {
    let changed = sqlx::query(
        r#"UPDATE members SET role = ?, updated_at = ?
           WHERE id = ? AND room_id = ?
             AND (role != 'ADMIN' OR ? = 'ADMIN'
                  OR (SELECT COUNT(*) FROM members WHERE room_id = ? AND role = 'ADMIN') > 1)"#,
    )
    .bind(role.as_str())
    .bind(db::now())
    .bind(member_id)
    .bind(room_id)
    .bind(role.as_str())
    .bind(room_id)
    .execute(db)
    .await?
    .rows_affected();

    if changed == 0 {
        return Err(AppError::Conflict("A room must keep at least one admin".into()));
    }
    Ok(())
}

pub async fn leave_room(db: &SqlitePool, room_id: &str, profile_id: &str) -> AppResult<Member> {
    let actor = require_member(db, room_id, profile_id).await?;
    let admins = admin_count(db, room_id).await?;

    let resource = ResourceState {
        targets_self: true,
        sole_admin: actor.role == Role::Admin && admins <= 1,
        ..ResourceState::member()
    };
    authorize(actor.role, Action::LeaveRoom, &resource).into_result()?;
    MemberState::Member(actor.role).apply(MembershipEvent::Leave, admins)?;

    delete_member_guarded(db, room_id, &actor.id).await?;
    tracing::info!("Member {} left room {}", actor.id, room_id);
    Ok(actor)
}

/// Role gate first, then the last-admin invariant, then the self check.
pub async fn kick_member(
    db: &SqlitePool,
    room_id: &str,
    profile_id: &str,
    target_member_id: &str,
) -> AppResult<Member> {
    let actor = require_member(db, room_id, profile_id).await?;
    authorize(actor.role, Action::KickMember, &ResourceState::member()).into_result()?;

    let target = find_member_by_id(db, room_id, target_member_id).await?;
    let admins = admin_count(db, room_id).await?;
    MemberState::Member(target.role).apply(MembershipEvent::Kick, admins)?;

    let resource = ResourceState {
        targets_self: target.id == actor.id,
        ..ResourceState::member()
    };
    authorize(actor.role, Action::KickMember, &resource).into_result()?;

    delete_member_guarded(db, room_id, &target.id).await?;
    tracing::info!("Member {} kicked from room {} by {}", target.id, room_id, actor.id);
    Ok(target)
}

pub async fn change_role(
    db: &SqlitePool,
    room_id: &str,
    profile_id: &str,
    target_member_id: &str,
    role: Role,
) -> AppResult<Member> {
    let actor = require_member(db, room_id, profile_id).await?;
    authorize(actor.role, Action::ChangeRole, &ResourceState::member()).into_result()?;

    let target = find_member_by_id(db, room_id, target_member_id).await?;
    let admins = admin_count(db, room_id).await?;
    MemberState::Member(target.role).apply(MembershipEvent::ChangeRole(role), admins)?;

    let resource = ResourceState {
        targets_self: target.id == actor.id,
        ..ResourceState::member()
    };
    authorize(actor.role, Action::ChangeRole, &resource).into_result()?;

    update_role_guarded(db, room_id, &target.id, role).await?;

    tracing::info!(
        "Member {} in room {} changed from {} to {} by {}",
        target.id,
        room_id,
        target.role,
        role,
        actor.id
    );
    Ok(Member { role, ..target })
}

/// A single UPDATE swaps the code, so the previous one stops resolving at
/// commit.
pub async fn rotate_invite_code(db: &SqlitePool, room_id: &str, profile_id: &str) -> AppResult<Room> {
    let actor = require_member(db, room_id, profile_id).await?;
    authorize(actor.role, Action::RotateInviteCode, &ResourceState::member()).into_result()?;

    sqlx::query("UPDATE rooms SET invite_code = ?, updated_at = ? WHERE id = ?")
        .bind(new_invite_code())
        .bind(db::now())
        .bind(room_id)
        .execute(db)
        .await?;

    tracing::info!("Invite code rotated for room {}", room_id);
    find_room(db, room_id).await
}

pub async fn update_room(
    db: &SqlitePool,
    room_id: &str,
    profile_id: &str,
    body: &UpdateRoomRequest,
) -> AppResult<Room> {
    let actor = require_member(db, room_id, profile_id).await?;
    authorize(actor.role, Action::UpdateRoom, &ResourceState::member()).into_result()?;

    let room = find_room(db, room_id).await?;
    let name = match &body.name {
        Some(name) => {
            validate_room_name(name).map_err(AppError::ValidationFailed)?;
            name.trim().to_string()
        }
        None => room.name.clone(),
    };
    let image_url = match &body.image_url {
        Some(url) if url.trim().is_empty() => None,
        Some(url) => Some(url.clone()),
        None => room.image_url.clone(),
    };
    let now = db::now();

    sqlx::query("UPDATE rooms SET name = ?, image_url = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(&image_url)
        .bind(&now)
        .bind(room_id)
        .execute(db)
        .await?;

    Ok(Room {
        name,
        image_url,
        updated_at: now,
        ..room
    })
}

/// Returns the profiles that were members, for notification.
pub async fn delete_room(db: &SqlitePool, room_id: &str, profile_id: &str) -> AppResult<Vec<String>> {
    let actor = require_member(db, room_id, profile_id).await?;
    authorize(actor.role, Action::DeleteRoom, &ResourceState::member()).into_result()?;

    let profiles = room_profile_ids(db, room_id).await?;

    // Members, chats, direct conversations and messages cascade.
    sqlx::query("DELETE FROM rooms WHERE id = ?")
        .bind(room_id)
        .execute(db)
        .await?;

    tracing::info!("Room {} deleted by {}", room_id, profile_id);
    Ok(profiles)
}

/// Rooms the profile belongs to, with its role in each.
pub async fn list_rooms(db: &SqlitePool, profile_id: &str) -> AppResult<Vec<RoomWithRole>> {
    let rows = sqlx::query(
        r#"SELECT r.id, r.name, r.image_url, r.invite_code, r.profile_id, r.created_at, r.updated_at, m.role
           FROM members m
           INNER JOIN rooms r ON r.id = m.room_id
           WHERE m.profile_id = ?
           ORDER BY r.created_at ASC"#,
    )
    .bind(profile_id)
    .fetch_all(db)
    .await?;

    let rooms = rows
        .iter()
        .map(|row| -> Result<RoomWithRole, sqlx::Error> {
            let role: String = row.try_get("role")?;
            let role = role.parse::<Role>().map_err(|e| sqlx::Error::ColumnDecode {
                index: "role".into(),
                source: e.into(),
            })?;
            Ok(RoomWithRole {
                room: Room::from_row(row)?,
                role,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rooms)
}
