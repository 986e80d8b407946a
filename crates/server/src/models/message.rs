use roomchat_shared::wire::Message;

use crate::db::parse_timestamp;

pub const MESSAGE_COLUMNS: &str =
    "id, conversation_id, member_id, content, file_url, deleted, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub member_id: String,
    pub content: String,
    pub file_url: Option<String>,
    pub deleted: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = sqlx::Error;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            created_at: parse_timestamp("created_at", &row.created_at)?,
            updated_at: parse_timestamp("updated_at", &row.updated_at)?,
            id: row.id,
            conversation_id: row.conversation_id,
            member_id: row.member_id,
            content: row.content,
            file_url: row.file_url,
            deleted: row.deleted != 0,
        })
    }
}
