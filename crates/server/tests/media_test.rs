mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use roomchat_shared::moderation::TermList;

fn auth_header(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authorization"),
        format!("Bearer {}", token).parse().unwrap(),
    )
}

#[tokio::test]
async fn media_token_requires_livekit_config() {
    let pool = common::setup_test_db().await;
    let server = TestServer::new(common::create_test_app(pool.clone())).unwrap();
    let (alice, token) = common::create_test_profile(&pool, "alice").await;
    let room = common::create_test_room(&pool, &alice, "Room").await;
    let voice = common::create_chat(&pool, &room.room_id, &alice, "voice", "audio").await;

    let (h, v) = auth_header(&token);
    let res = server
        .get("/api/media/token")
        .add_query_param("conversationId", &voice)
        .add_header(h, v)
        .await;
    res.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn media_token_issued_for_media_chat() {
    let pool = common::setup_test_db().await;
    let config = roomchat_server::config::Config {
        livekit_api_key: "devkey".into(),
        livekit_api_secret: "devsecret-devsecret-devsecret-32b".into(),
        ..common::test_config()
    };
    let app = common::create_test_app_with(pool.clone(), config, TermList::default());
    let server = TestServer::new(app).unwrap();
    let (alice, token) = common::create_test_profile(&pool, "alice").await;
    let room = common::create_test_room(&pool, &alice, "Room").await;
    let video = common::create_chat(&pool, &room.room_id, &alice, "stage", "video").await;

    let (h, v) = auth_header(&token);
    let res = server
        .get("/api/media/token")
        .add_query_param("conversationId", &video)
        .add_header(h, v)
        .await;
    res.assert_status_ok();
    let body: serde_json::Value = res.json();
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["url"], "ws://localhost:7880");

    // Text chats have no media session.
    let (h, v) = auth_header(&token);
    let res = server
        .get("/api/media/token")
        .add_query_param("conversationId", &room.general_chat_id)
        .add_header(h, v)
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
}
