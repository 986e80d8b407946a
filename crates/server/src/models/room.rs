use roomchat_shared::permissions::Role;
use roomchat_shared::wire::ChatKind;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub invite_code: String,
    pub profile_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomWithRole {
    #[serde(flatten)]
    pub room: Room,
    pub role: Role,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetail {
    #[serde(flatten)]
    pub room: Room,
    pub role: Role,
    pub member_id: String,
    pub chats: Vec<Chat>,
    pub members: Vec<Member>,
}

/// Members are always loaded joined with their profile.
pub const MEMBER_SELECT: &str = r#"SELECT m.id, m.role, m.profile_id, m.room_id, m.created_at,
       p.name, p.image_url
  FROM members m
  INNER JOIN profiles p ON p.id = m.profile_id"#;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub role: Role,
    pub profile_id: String,
    pub room_id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub created_at: String,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for Member {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        let role = role.parse::<Role>().map_err(|e| sqlx::Error::ColumnDecode {
            index: "role".into(),
            source: e.into(),
        })?;
        Ok(Member {
            id: row.try_get("id")?,
            role,
            profile_id: row.try_get("profile_id")?,
            room_id: row.try_get("room_id")?,
            name: row.try_get("name")?,
            image_url: row.try_get("image_url")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub profile_id: String,
    pub room_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DirectConversation {
    pub id: String,
    pub room_id: String,
    pub member_one_id: String,
    pub member_two_id: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub name: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomRequest {
    pub name: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub name: String,
    #[serde(default = "default_chat_kind")]
    pub kind: ChatKind,
}

fn default_chat_kind() -> ChatKind {
    ChatKind::Text
}

#[derive(Debug, Deserialize)]
pub struct UpdateChatRequest {
    pub name: Option<String>,
    pub kind: Option<ChatKind>,
}
