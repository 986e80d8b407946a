use roomchat_shared::constants::GENERAL_CHAT_NAME;
use roomchat_shared::permissions::{authorize, Action, ResourceState};
use roomchat_shared::validation::validate_chat_name;
use sqlx::SqlitePool;

use super::require_member;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{Chat, CreateChatRequest, UpdateChatRequest};

pub async fn list_chats(db: &SqlitePool, room_id: &str) -> AppResult<Vec<Chat>> {
    Ok(sqlx::query_as::<_, Chat>(
        "SELECT * FROM chats WHERE room_id = ? ORDER BY created_at ASC, id ASC",
    )
    .bind(room_id)
    .fetch_all(db)
    .await?)
}

async fn find_chat(db: &SqlitePool, room_id: &str, chat_id: &str) -> AppResult<Chat> {
    sqlx::query_as::<_, Chat>("SELECT * FROM chats WHERE id = ? AND room_id = ?")
        .bind(chat_id)
        .bind(room_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Chat"))
}

fn chat_resource(chat: &Chat) -> ResourceState {
    ResourceState {
        general_chat: chat.name == GENERAL_CHAT_NAME,
        ..ResourceState::member()
    }
}

pub async fn create_chat(
    db: &SqlitePool,
    room_id: &str,
    profile_id: &str,
    body: &CreateChatRequest,
) -> AppResult<Chat> {
    let actor = require_member(db, room_id, profile_id).await?;
    authorize(actor.role, Action::CreateChat, &ResourceState::member()).into_result()?;
    validate_chat_name(&body.name).map_err(AppError::ValidationFailed)?;

    let now = db::now();
    let chat = Chat {
        id: uuid::Uuid::new_v4().to_string(),
        name: body.name.trim().to_string(),
        kind: body.kind.as_str().to_string(),
        profile_id: profile_id.to_string(),
        room_id: room_id.to_string(),
        created_at: now.clone(),
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO chats (id, name, kind, profile_id, room_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&chat.id)
    .bind(&chat.name)
    .bind(&chat.kind)
    .bind(&chat.profile_id)
    .bind(&chat.room_id)
    .bind(&chat.created_at)
    .bind(&chat.updated_at)
    .execute(db)
    .await?;

    Ok(chat)
}

pub async fn update_chat(
    db: &SqlitePool,
    room_id: &str,
    profile_id: &str,
    chat_id: &str,
    body: &UpdateChatRequest,
) -> AppResult<Chat> {
    let actor = require_member(db, room_id, profile_id).await?;
    authorize(actor.role, Action::EditChat, &ResourceState::member()).into_result()?;
    let chat = find_chat(db, room_id, chat_id).await?;
    authorize(actor.role, Action::EditChat, &chat_resource(&chat)).into_result()?;

    let name = match &body.name {
        Some(name) => {
            validate_chat_name(name).map_err(AppError::ValidationFailed)?;
            name.trim().to_string()
        }
        None => chat.name.clone(),
    };
    let kind = body
        .kind
        .map(|k| k.as_str().to_string())
        .unwrap_or_else(|| chat.kind.clone());
    let now = db::now();

    sqlx::query("UPDATE chats SET name = ?, kind = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(&kind)
        .bind(&now)
        .bind(&chat.id)
        .execute(db)
        .await?;

    Ok(Chat {
        name,
        kind,
        updated_at: now,
        ..chat
    })
}

pub async fn delete_chat(
    db: &SqlitePool,
    room_id: &str,
    profile_id: &str,
    chat_id: &str,
) -> AppResult<()> {
    let actor = require_member(db, room_id, profile_id).await?;
    authorize(actor.role, Action::DeleteChat, &ResourceState::member()).into_result()?;
    let chat = find_chat(db, room_id, chat_id).await?;
    authorize(actor.role, Action::DeleteChat, &chat_resource(&chat)).into_result()?;

    let mut tx = db.begin().await?;
    sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
        .bind(&chat.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chats WHERE id = ?")
        .bind(&chat.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!("Chat {} deleted from room {}", chat.id, room_id);
    Ok(())
}
