use reqwest::{Method, RequestBuilder, Response};
use roomchat_shared::error::ErrorBody;
use roomchat_shared::permissions::Role;
use roomchat_shared::wire::{
    ChangeRoleRequest, EditMessageRequest, Message, MessagePage, SendMessageRequest, ServerEvent,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};
use crate::fetcher::MessageSource;

/// The caller's view of one room's membership, as last reported by the
/// server. Used only for client-side pre-checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub member_id: String,
    pub role: Role,
    pub members: HashMap<String, Role>,
}

impl RoomSnapshot {
    pub fn role_of(&self, member_id: &str) -> Option<Role> {
        self.members.get(member_id).copied()
    }

    pub fn admin_count(&self) -> usize {
        self.members.values().filter(|r| **r == Role::Admin).count()
    }

    /// Folds a membership event into the snapshot. Returns false when the
    /// caller is no longer in the room.
    pub fn apply(&mut self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::MemberRoleUpdated {
                room_id,
                member_id,
                role,
            } if *room_id == self.room_id => {
                self.members.insert(member_id.clone(), *role);
                if *member_id == self.member_id {
                    self.role = *role;
                }
                true
            }
            ServerEvent::MemberRemoved { room_id, member_id } if *room_id == self.room_id => {
                self.members.remove(member_id);
                *member_id != self.member_id
            }
            ServerEvent::RoomDeleted { room_id } if *room_id == self.room_id => false,
            _ => true,
        }
    }
}

/// Mutations and membership reads against the room server.
pub trait RoomApi: Send + Sync {
    fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        file_url: Option<&str>,
    ) -> impl Future<Output = SyncResult<Message>> + Send;

    fn edit_message(
        &self,
        conversation_id: &str,
        message_id: &str,
        content: &str,
    ) -> impl Future<Output = SyncResult<Message>> + Send;

    fn delete_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> impl Future<Output = SyncResult<Message>> + Send;

    fn change_role(
        &self,
        room_id: &str,
        member_id: &str,
        role: Role,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    fn kick_member(&self, room_id: &str, member_id: &str)
        -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns the new invite code.
    fn rotate_invite_code(&self, room_id: &str) -> impl Future<Output = SyncResult<String>> + Send;

    fn leave_room(&self, room_id: &str) -> impl Future<Output = SyncResult<()>> + Send;

    fn room_snapshot(&self, room_id: &str) -> impl Future<Output = SyncResult<RoomSnapshot>> + Send;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomDetailBody {
    id: String,
    role: Role,
    member_id: String,
    members: Vec<MemberBody>,
}

#[derive(Deserialize)]
struct MemberBody {
    id: String,
    role: Role,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomBody {
    invite_code: String,
}

/// REST client for the `/api` surface.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("roomchat-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> SyncResult<RequestBuilder> {
        let url = self
            .config
            .api_url
            .join(path)
            .map_err(|e| SyncError::ValidationFailed(format!("Invalid path {}: {}", path, e)))?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(&self.config.session_token))
    }

    async fn execute(&self, request: RequestBuilder) -> SyncResult<Response> {
        let res = request.send().await?;
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status();
        let body = res.json::<ErrorBody>().await.ok();
        let err = SyncError::from_response(status, body);
        tracing::debug!("Request failed with {}: {}", status, err);
        Err(err)
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> SyncResult<T> {
        Ok(self.execute(request).await?.json::<T>().await?)
    }
}

fn messages_path(conversation_id: &str) -> String {
    format!(
        "/api/conversations/{}/messages",
        urlencoding::encode(conversation_id)
    )
}

fn message_path(conversation_id: &str, message_id: &str) -> String {
    format!(
        "{}/{}",
        messages_path(conversation_id),
        urlencoding::encode(message_id)
    )
}

fn member_path(room_id: &str, member_id: &str) -> String {
    format!(
        "/api/rooms/{}/members/{}",
        urlencoding::encode(room_id),
        urlencoding::encode(member_id)
    )
}

impl MessageSource for HttpClient {
    async fn fetch_page(
        &self,
        conversation_id: &str,
        cursor: Option<&str>,
    ) -> SyncResult<MessagePage> {
        let mut path = messages_path(conversation_id);
        if let Some(cursor) = cursor {
            path.push_str("?cursor=");
            path.push_str(&urlencoding::encode(cursor));
        }
        self.json(self.request(Method::GET, &path)?).await
    }
}

impl RoomApi for HttpClient {
    async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        file_url: Option<&str>,
    ) -> SyncResult<Message> {
        let body = SendMessageRequest {
            content: content.to_string(),
            file_url: file_url.map(str::to_string),
        };
        let req = self
            .request(Method::POST, &messages_path(conversation_id))?
            .json(&body);
        self.json(req).await
    }

    async fn edit_message(
        &self,
        conversation_id: &str,
        message_id: &str,
        content: &str,
    ) -> SyncResult<Message> {
        let body = EditMessageRequest {
            content: content.to_string(),
        };
        let req = self
            .request(Method::PATCH, &message_path(conversation_id, message_id))?
            .json(&body);
        self.json(req).await
    }

    async fn delete_message(&self, conversation_id: &str, message_id: &str) -> SyncResult<Message> {
        let req = self.request(Method::DELETE, &message_path(conversation_id, message_id))?;
        self.json(req).await
    }

    async fn change_role(&self, room_id: &str, member_id: &str, role: Role) -> SyncResult<()> {
        let req = self
            .request(Method::PATCH, &member_path(room_id, member_id))?
            .json(&ChangeRoleRequest { role });
        self.execute(req).await?;
        Ok(())
    }

    async fn kick_member(&self, room_id: &str, member_id: &str) -> SyncResult<()> {
        self.execute(self.request(Method::DELETE, &member_path(room_id, member_id))?)
            .await?;
        Ok(())
    }

    async fn rotate_invite_code(&self, room_id: &str) -> SyncResult<String> {
        let path = format!("/api/rooms/{}/invite-code", urlencoding::encode(room_id));
        let room: RoomBody = self.json(self.request(Method::PATCH, &path)?).await?;
        Ok(room.invite_code)
    }

    async fn leave_room(&self, room_id: &str) -> SyncResult<()> {
        let path = format!("/api/rooms/{}/members/me", urlencoding::encode(room_id));
        self.execute(self.request(Method::DELETE, &path)?).await?;
        Ok(())
    }

    async fn room_snapshot(&self, room_id: &str) -> SyncResult<RoomSnapshot> {
        let path = format!("/api/rooms/{}", urlencoding::encode(room_id));
        let detail: RoomDetailBody = self.json(self.request(Method::GET, &path)?).await?;
        Ok(RoomSnapshot {
            room_id: detail.id,
            member_id: detail.member_id,
            role: detail.role,
            members: detail
                .members
                .into_iter()
                .map(|m| (m.id, m.role))
                .collect(),
        })
    }
}
