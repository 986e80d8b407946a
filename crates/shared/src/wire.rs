use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::permissions::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub member_id: String,
    pub content: String,
    pub file_url: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn is_edited(&self) -> bool {
        !self.deleted && self.updated_at != self.created_at
    }

    /// Feed order: creation time descending, then id descending.
    pub fn newest_first(a: &Message, b: &Message) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    }
}

/// One page of history, newest first. `next_cursor` is the id of the oldest
/// item when older history exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub items: Vec<Message>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Text,
    Audio,
    Video,
}

impl ChatKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatKind::Text => "text",
            ChatKind::Audio => "audio",
            ChatKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(ChatKind::Text),
            "audio" => Some(ChatKind::Audio),
            "video" => Some(ChatKind::Video),
            _ => None,
        }
    }

    pub fn has_media(self) -> bool {
        !matches!(self, ChatKind::Text)
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

// ── Client → Server gateway frames ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Subscribe {
        #[serde(rename = "conversationId")]
        conversation_id: String,
    },
    Unsubscribe {
        #[serde(rename = "conversationId")]
        conversation_id: String,
    },
    Ping,
}

// ── Server → Client gateway frames ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    MessageCreated {
        #[serde(rename = "conversationId")]
        conversation_id: String,
        message: Message,
    },
    MessageUpdated {
        #[serde(rename = "conversationId")]
        conversation_id: String,
        message: Message,
    },
    MemberRoleUpdated {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "memberId")]
        member_id: String,
        role: Role,
    },
    MemberRemoved {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "memberId")]
        member_id: String,
    },
    InviteCodeRotated {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    RoomDeleted {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    Subscribed {
        #[serde(rename = "conversationId")]
        conversation_id: String,
    },
    Pong,
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// Routing key for the message events.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            ServerEvent::MessageCreated { conversation_id, .. }
            | ServerEvent::MessageUpdated { conversation_id, .. }
            | ServerEvent::Subscribed { conversation_id } => Some(conversation_id),
            _ => None,
        }
    }
}
