pub mod conversations;
pub mod media;
pub mod messages;
pub mod rooms;

use crate::ws;
use crate::AppState;
use axum::{routing::{get, post, patch, delete}, Router};
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Rooms
        .route("/rooms", post(rooms::create_room))
        .route("/rooms", get(rooms::list_rooms))
        .route("/rooms/{roomId}", get(rooms::get_room))
        .route("/rooms/{roomId}", patch(rooms::update_room))
        .route("/rooms/{roomId}", delete(rooms::delete_room))
        .route("/rooms/{roomId}/invite-code", patch(rooms::rotate_invite_code))
        .route("/invites/{inviteCode}", post(rooms::join_room))
        // Members
        .route("/rooms/{roomId}/members", get(rooms::list_members))
        .route("/rooms/{roomId}/members/me", delete(rooms::leave_room))
        .route("/rooms/{roomId}/members/{memberId}", patch(rooms::change_role))
        .route("/rooms/{roomId}/members/{memberId}", delete(rooms::kick_member))
        // Chats
        .route("/rooms/{roomId}/chats", get(rooms::list_chats))
        .route("/rooms/{roomId}/chats", post(rooms::create_chat))
        .route("/rooms/{roomId}/chats/{chatId}", patch(rooms::update_chat))
        .route("/rooms/{roomId}/chats/{chatId}", delete(rooms::delete_chat))
        // Direct conversations
        .route("/rooms/{roomId}/conversations/{memberId}", post(conversations::open_direct))
        // Messages
        .route("/conversations/{conversationId}/messages", get(messages::list_messages))
        .route("/conversations/{conversationId}/messages", post(messages::send_message))
        .route("/conversations/{conversationId}/messages/{messageId}", patch(messages::edit_message))
        .route("/conversations/{conversationId}/messages/{messageId}", delete(messages::delete_message))
        // Media
        .route("/media/token", get(media::get_token));

    Router::new()
        .nest("/api", api_routes)
        .route("/gateway", get(ws::handler::ws_handler))
        .with_state(state)
}
