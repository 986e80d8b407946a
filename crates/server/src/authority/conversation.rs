use roomchat_shared::wire::ChatKind;
use sqlx::SqlitePool;

use super::{find_member_by_id, require_member};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{Chat, DirectConversation, Member};

#[derive(Debug, Clone)]
pub enum ConversationKind {
    Chat { name: String, kind: ChatKind },
    Direct { member_one_id: String, member_two_id: String },
}

/// A conversation id resolved to the room it lives in.
#[derive(Debug, Clone)]
pub struct ConversationScope {
    pub id: String,
    pub room_id: String,
    pub kind: ConversationKind,
}

impl ConversationScope {
    pub fn has_media(&self) -> bool {
        match &self.kind {
            ConversationKind::Chat { kind, .. } => kind.has_media(),
            ConversationKind::Direct { .. } => true,
        }
    }
}

pub async fn resolve(db: &SqlitePool, conversation_id: &str) -> AppResult<ConversationScope> {
    let chat = sqlx::query_as::<_, Chat>("SELECT * FROM chats WHERE id = ?")
        .bind(conversation_id)
        .fetch_optional(db)
        .await?;
    if let Some(chat) = chat {
        return Ok(ConversationScope {
            id: chat.id,
            room_id: chat.room_id,
            kind: ConversationKind::Chat {
                kind: ChatKind::parse(&chat.kind).unwrap_or(ChatKind::Text),
                name: chat.name,
            },
        });
    }

    let direct = sqlx::query_as::<_, DirectConversation>(
        "SELECT * FROM direct_conversations WHERE id = ?",
    )
    .bind(conversation_id)
    .fetch_optional(db)
    .await?;
    match direct {
        Some(d) => Ok(ConversationScope {
            id: d.id,
            room_id: d.room_id,
            kind: ConversationKind::Direct {
                member_one_id: d.member_one_id,
                member_two_id: d.member_two_id,
            },
        }),
        None => Err(AppError::not_found("Conversation")),
    }
}

/// The caller's membership if they may read and write in the conversation.
/// Direct conversations are private to their two members.
pub async fn require_access(
    db: &SqlitePool,
    scope: &ConversationScope,
    profile_id: &str,
) -> AppResult<Member> {
    let member = require_member(db, &scope.room_id, profile_id).await?;
    if let ConversationKind::Direct {
        member_one_id,
        member_two_id,
    } = &scope.kind
    {
        if member.id != *member_one_id && member.id != *member_two_id {
            return Err(AppError::Unauthorized(
                "Not a participant in this conversation".into(),
            ));
        }
    }
    Ok(member)
}

/// Get-or-create the 1:1 conversation between the caller and another member
/// of the same room. Either member order resolves to the same row.
pub async fn open_direct(
    db: &SqlitePool,
    room_id: &str,
    profile_id: &str,
    other_member_id: &str,
) -> AppResult<DirectConversation> {
    let me = require_member(db, room_id, profile_id).await?;
    let other = find_member_by_id(db, room_id, other_member_id).await?;

    let (one, two) = if me.id <= other.id {
        (me.id, other.id)
    } else {
        (other.id, me.id)
    };

    sqlx::query(
        r#"INSERT INTO direct_conversations (id, room_id, member_one_id, member_two_id, created_at)
           VALUES (?, ?, ?, ?, ?)
           ON CONFLICT (member_one_id, member_two_id) DO NOTHING"#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(room_id)
    .bind(&one)
    .bind(&two)
    .bind(db::now())
    .execute(db)
    .await?;

    Ok(sqlx::query_as::<_, DirectConversation>(
        "SELECT * FROM direct_conversations WHERE member_one_id = ? AND member_two_id = ?",
    )
    .bind(&one)
    .bind(&two)
    .fetch_one(db)
    .await?)
}

