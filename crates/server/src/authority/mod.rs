//! Server-side authority over rooms, membership and messages.
//!
//! Every mutation re-reads the actor's membership from the database before
//! consulting the permission table; nothing here trusts client-held roles.

pub mod chats;
pub mod conversation;
pub mod membership;
pub mod messages;

use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::models::{Member, Room, MEMBER_SELECT};

pub async fn find_room(db: &SqlitePool, room_id: &str) -> AppResult<Room> {
    sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = ?")
        .bind(room_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Room"))
}

pub async fn find_member(
    db: &SqlitePool,
    room_id: &str,
    profile_id: &str,
) -> AppResult<Option<Member>> {
    let sql = format!("{} WHERE m.room_id = ? AND m.profile_id = ?", MEMBER_SELECT);
    Ok(sqlx::query_as::<_, Member>(&sql)
        .bind(room_id)
        .bind(profile_id)
        .fetch_optional(db)
        .await?)
}

/// The caller's current membership, or `Unauthorized`.
pub async fn require_member(db: &SqlitePool, room_id: &str, profile_id: &str) -> AppResult<Member> {
    find_member(db, room_id, profile_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Not a member of this room".into()))
}

pub async fn find_member_by_id(
    db: &SqlitePool,
    room_id: &str,
    member_id: &str,
) -> AppResult<Member> {
    let sql = format!("{} WHERE m.room_id = ? AND m.id = ?", MEMBER_SELECT);
    sqlx::query_as::<_, Member>(&sql)
        .bind(room_id)
        .bind(member_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Member"))
}

pub async fn list_members(db: &SqlitePool, room_id: &str) -> AppResult<Vec<Member>> {
    let sql = format!(
        "{} WHERE m.room_id = ? ORDER BY CASE m.role WHEN 'ADMIN' THEN 0 WHEN 'MODERATOR' THEN 1 ELSE 2 END, m.created_at ASC",
        MEMBER_SELECT
    );
    Ok(sqlx::query_as::<_, Member>(&sql)
        .bind(room_id)
        .fetch_all(db)
        .await?)
}

pub async fn admin_count(db: &SqlitePool, room_id: &str) -> AppResult<usize> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM members WHERE room_id = ? AND role = 'ADMIN'",
    )
    .bind(room_id)
    .fetch_one(db)
    .await?;
    Ok(count.max(0) as usize)
}

/// Profiles to notify about room-level events.
pub async fn room_profile_ids(db: &SqlitePool, room_id: &str) -> AppResult<Vec<String>> {
    Ok(
        sqlx::query_scalar::<_, String>("SELECT profile_id FROM members WHERE room_id = ?")
            .bind(room_id)
            .fetch_all(db)
            .await?,
    )
}

/// Every chat and direct conversation id in the room.
pub async fn room_conversation_ids(db: &SqlitePool, room_id: &str) -> AppResult<Vec<String>> {
    Ok(sqlx::query_scalar::<_, String>(
        r#"SELECT id FROM chats WHERE room_id = ?
           UNION ALL
           SELECT id FROM direct_conversations WHERE room_id = ?"#,
    )
    .bind(room_id)
    .bind(room_id)
    .fetch_all(db)
    .await?)
}
