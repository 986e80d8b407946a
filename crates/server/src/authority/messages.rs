use roomchat_shared::constants::DELETED_MESSAGE_TOMBSTONE;
use roomchat_shared::moderation::TermList;
use roomchat_shared::permissions::{authorize, Action, ResourceState};
use roomchat_shared::validation::validate_message_content;
use roomchat_shared::wire::{Message, MessagePage};
use sqlx::SqlitePool;

use super::conversation::ConversationScope;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{Member, MessageRow, MESSAGE_COLUMNS};

fn into_messages(rows: Vec<MessageRow>) -> AppResult<Vec<Message>> {
    Ok(rows
        .into_iter()
        .map(Message::try_from)
        .collect::<Result<Vec<_>, _>>()?)
}

/// Newest-first page strictly older than `cursor`, where the cursor is the id
/// of the oldest message the caller already holds.
pub async fn list_page(
    db: &SqlitePool,
    conversation_id: &str,
    cursor: Option<&str>,
    limit: i64,
) -> AppResult<MessagePage> {
    let rows = match cursor {
        Some(cursor) => {
            let anchor = sqlx::query_scalar::<_, String>(
                "SELECT created_at FROM messages WHERE id = ? AND conversation_id = ?",
            )
            .bind(cursor)
            .bind(conversation_id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::not_found("Cursor"))?;

            let sql = format!(
                r#"SELECT {} FROM messages
                   WHERE conversation_id = ?
                     AND (created_at < ? OR (created_at = ? AND id < ?))
                   ORDER BY created_at DESC, id DESC
                   LIMIT ?"#,
                MESSAGE_COLUMNS
            );
            sqlx::query_as::<_, MessageRow>(&sql)
                .bind(conversation_id)
                .bind(&anchor)
                .bind(&anchor)
                .bind(cursor)
                .bind(limit + 1)
                .fetch_all(db)
                .await?
        }
        None => {
            let sql = format!(
                r#"SELECT {} FROM messages
                   WHERE conversation_id = ?
                   ORDER BY created_at DESC, id DESC
                   LIMIT ?"#,
                MESSAGE_COLUMNS
            );
            sqlx::query_as::<_, MessageRow>(&sql)
                .bind(conversation_id)
                .bind(limit + 1)
                .fetch_all(db)
                .await?
        }
    };

    let mut items = into_messages(rows)?;
    let has_more = items.len() as i64 > limit;
    if has_more {
        items.pop();
    }
    let next_cursor = if has_more {
        items.last().map(|m| m.id.clone())
    } else {
        None
    };

    Ok(MessagePage { items, next_cursor })
}

async fn find_message(db: &SqlitePool, conversation_id: &str, message_id: &str) -> AppResult<Message> {
    let sql = format!(
        "SELECT {} FROM messages WHERE id = ? AND conversation_id = ?",
        MESSAGE_COLUMNS
    );
    let row = sqlx::query_as::<_, MessageRow>(&sql)
        .bind(message_id)
        .bind(conversation_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Message"))?;
    Ok(Message::try_from(row)?)
}

fn message_resource(actor: &Member, message: &Message) -> ResourceState {
    ResourceState {
        targets_self: message.member_id == actor.id,
        message_deleted: message.deleted,
        has_attachment: message.file_url.is_some(),
        ..ResourceState::member()
    }
}

pub async fn send(
    db: &SqlitePool,
    terms: &TermList,
    scope: &ConversationScope,
    actor: &Member,
    content: &str,
    file_url: Option<&str>,
) -> AppResult<Message> {
    let file_url = file_url.map(str::trim).filter(|u| !u.is_empty());
    let has_attachment = file_url.is_some();

    validate_message_content(content, has_attachment).map_err(AppError::ValidationFailed)?;
    terms
        .check(content, has_attachment)
        .map_err(AppError::ValidationFailed)?;
    authorize(actor.role, Action::SendMessage, &ResourceState::member()).into_result()?;

    let now = db::now();
    let message = Message {
        id: uuid::Uuid::new_v4().to_string(),
        conversation_id: scope.id.clone(),
        member_id: actor.id.clone(),
        content: content.trim().to_string(),
        file_url: file_url.map(str::to_string),
        deleted: false,
        created_at: db::parse_timestamp("created_at", &now)?,
        updated_at: db::parse_timestamp("updated_at", &now)?,
    };

    sqlx::query(
        r#"INSERT INTO messages (id, conversation_id, room_id, member_id, content, file_url, deleted, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)"#,
    )
    .bind(&message.id)
    .bind(&message.conversation_id)
    .bind(&scope.room_id)
    .bind(&message.member_id)
    .bind(&message.content)
    .bind(&message.file_url)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(message)
}

/// Rewrites the content of a live message. A tombstone is never touched,
/// even if it was deleted after the caller read it.
pub async fn update_content_unless_deleted(
    db: &SqlitePool,
    message_id: &str,
    content: &str,
    now: &str,
) -> AppResult<()> {
    let edited = sqlx::query("UPDATE messages SET content = ?, updated_at = ? WHERE id = ? AND deleted = 0")
        .bind(content)
        .bind(now)
        .bind(message_id)
        .execute(db)
        .await?
        .rows_affected();

    if edited == 0 {
        return Err(AppError::Conflict("Deleted messages cannot be edited".into()));
    }
    Ok(())
}

/// Edits apply last-write-wins; there is no version check.
pub async fn edit(
    db: &SqlitePool,
    terms: &TermList,
    scope: &ConversationScope,
    actor: &Member,
    message_id: &str,
    content: &str,
) -> AppResult<Message> {
    let message = find_message(db, &scope.id, message_id).await?;
    authorize(actor.role, Action::EditMessage, &message_resource(actor, &message)).into_result()?;

    validate_message_content(content, false).map_err(AppError::ValidationFailed)?;
    terms.check(content, false).map_err(AppError::ValidationFailed)?;

    let now = db::now();
    let content = content.trim().to_string();
    update_content_unless_deleted(db, &message.id, &content, &now).await?;

    Ok(Message {
        content,
        updated_at: db::parse_timestamp("updated_at", &now)?,
        ..message
    })
}

/// Soft delete: the row stays, content becomes the tombstone and the
/// attachment is dropped.
pub async fn delete(
    db: &SqlitePool,
    scope: &ConversationScope,
    actor: &Member,
    message_id: &str,
) -> AppResult<Message> {
    let message = find_message(db, &scope.id, message_id).await?;
    authorize(actor.role, Action::DeleteMessage, &message_resource(actor, &message)).into_result()?;

    let now = db::now();
    sqlx::query(
        "UPDATE messages SET content = ?, file_url = NULL, deleted = 1, updated_at = ? WHERE id = ?",
    )
    .bind(DELETED_MESSAGE_TOMBSTONE)
    .bind(&now)
    .bind(&message.id)
    .execute(db)
    .await?;

    Ok(Message {
        content: DELETED_MESSAGE_TOMBSTONE.to_string(),
        file_url: None,
        deleted: true,
        updated_at: db::parse_timestamp("updated_at", &now)?,
        ..message
    })
}
