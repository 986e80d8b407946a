#![allow(dead_code)]

pub mod ws_helpers;

use axum::Router;
use roomchat_server::{config::Config, db, routes, ws, AppState};
use roomchat_shared::moderation::TermList;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;

/// Create an in-memory SQLite pool with schema applied.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    db::apply_schema(&pool).await.unwrap();
    pool
}

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_path: ":memory:".into(),
        livekit_api_key: "".into(),
        livekit_api_secret: "".into(),
        livekit_url: "ws://localhost:7880".into(),
        moderation_terms_path: None,
        message_page_size: 10,
    }
}

/// Build a test Axum app with the given pool and a one-word term list.
pub fn create_test_app(pool: SqlitePool) -> Router {
    create_test_app_with(pool, test_config(), TermList::new(["badword"]))
}

pub fn create_test_app_with(pool: SqlitePool, config: Config, terms: TermList) -> Router {
    let state = Arc::new(AppState {
        db: pool,
        config,
        gateway: Arc::new(ws::gateway::GatewayState::new()),
        terms,
    });

    routes::build_router(state)
}

/// Create a profile with a live session. Returns (profile_id, session_token).
pub async fn create_test_profile(pool: &SqlitePool, name: &str) -> (String, String) {
    let profile_id = uuid::Uuid::new_v4().to_string();
    let now = db::now();

    sqlx::query(
        "INSERT INTO profiles (id, user_id, name, image_url, email, created_at, updated_at) VALUES (?, ?, ?, NULL, ?, ?, ?)",
    )
    .bind(&profile_id)
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(name)
    .bind(format!("{}@test.com", name))
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();

    let token = uuid::Uuid::new_v4().to_string();
    let expires_at = db::format_timestamp(chrono::Utc::now() + chrono::Duration::days(30));
    sqlx::query("INSERT INTO sessions (token, profile_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
        .bind(&token)
        .bind(&profile_id)
        .bind(&expires_at)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();

    (profile_id, token)
}

pub struct TestRoom {
    pub room_id: String,
    pub invite_code: String,
    pub general_chat_id: String,
    pub admin_member_id: String,
}

/// Create a room with the owner as ADMIN and a `general` text chat.
pub async fn create_test_room(pool: &SqlitePool, owner_id: &str, name: &str) -> TestRoom {
    let room_id = uuid::Uuid::new_v4().to_string();
    let invite_code = uuid::Uuid::new_v4().to_string();
    let now = db::now();

    sqlx::query("INSERT INTO rooms (id, name, image_url, invite_code, profile_id, created_at, updated_at) VALUES (?, ?, NULL, ?, ?, ?, ?)")
        .bind(&room_id).bind(name).bind(&invite_code).bind(owner_id).bind(&now).bind(&now)
        .execute(pool).await.unwrap();

    let admin_member_id = add_member(pool, owner_id, &room_id, "ADMIN").await;
    let general_chat_id = create_chat(pool, &room_id, owner_id, "general", "text").await;

    TestRoom {
        room_id,
        invite_code,
        general_chat_id,
        admin_member_id,
    }
}

/// Add a member to a room with the given role. Returns the member id.
pub async fn add_member(pool: &SqlitePool, profile_id: &str, room_id: &str, role: &str) -> String {
    let member_id = uuid::Uuid::new_v4().to_string();
    let now = db::now();
    sqlx::query("INSERT INTO members (id, role, profile_id, room_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)")
        .bind(&member_id).bind(role).bind(profile_id).bind(room_id).bind(&now).bind(&now)
        .execute(pool).await.unwrap();
    member_id
}

pub async fn create_chat(pool: &SqlitePool, room_id: &str, profile_id: &str, name: &str, kind: &str) -> String {
    let chat_id = uuid::Uuid::new_v4().to_string();
    let now = db::now();
    sqlx::query("INSERT INTO chats (id, name, kind, profile_id, room_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)")
        .bind(&chat_id).bind(name).bind(kind).bind(profile_id).bind(room_id).bind(&now).bind(&now)
        .execute(pool).await.unwrap();
    chat_id
}

/// Insert a message with an explicit id and creation time.
pub async fn insert_message(
    pool: &SqlitePool,
    id: &str,
    conversation_id: &str,
    room_id: &str,
    member_id: &str,
    content: &str,
    created_at: &str,
) {
    sqlx::query("INSERT INTO messages (id, conversation_id, room_id, member_id, content, file_url, deleted, created_at, updated_at) VALUES (?, ?, ?, ?, ?, NULL, 0, ?, ?)")
        .bind(id).bind(conversation_id).bind(room_id).bind(member_id).bind(content).bind(created_at).bind(created_at)
        .execute(pool).await.unwrap();
}

/// Timestamp `minutes` after a fixed base, in the stored format.
pub fn at_minute(minutes: i64) -> String {
    let base = chrono::DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    db::format_timestamp(base + chrono::Duration::minutes(minutes))
}
