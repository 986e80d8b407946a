use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Start the test app on a random TCP port and return the base URL.
pub async fn start_server() -> (String, sqlx::SqlitePool) {
    let pool = super::setup_test_db().await;
    let app = super::create_test_app(pool.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://127.0.0.1:{}", addr.port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    (base, pool)
}

/// Connect to the gateway with a session token.
pub async fn ws_connect(base: &str, token: &str) -> WsStream {
    let ws_url = format!(
        "{}/gateway?token={}",
        base.replace("http://", "ws://"),
        token
    );
    let (ws, _) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();
    ws
}

/// Next text frame as JSON, or `None` after three seconds.
pub async fn recv_json(ws: &mut WsStream) -> Option<Value> {
    let next = tokio::time::timeout(Duration::from_secs(3), ws.next()).await;
    match next {
        Ok(Some(Ok(Message::Text(text)))) => serde_json::from_str(&text).ok(),
        _ => None,
    }
}

/// Reads frames until one of the given type arrives.
pub async fn recv_type(ws: &mut WsStream, event_type: &str) -> Option<Value> {
    while let Some(frame) = recv_json(ws).await {
        if frame["type"] == event_type {
            return Some(frame);
        }
    }
    None
}

/// Everything already queued, stopping after 200ms of silence.
pub async fn drain_messages(ws: &mut WsStream) -> Vec<Value> {
    let mut messages = Vec::new();
    while let Ok(Some(Ok(Message::Text(text)))) =
        tokio::time::timeout(Duration::from_millis(200), ws.next()).await
    {
        if let Ok(v) = serde_json::from_str::<Value>(&text) {
            messages.push(v);
        }
    }
    messages
}

pub async fn send_json(ws: &mut WsStream, value: &Value) {
    ws.send(Message::Text(serde_json::to_string(value).unwrap().into()))
        .await
        .unwrap();
}

/// Subscribes and returns the server's reply (`subscribed` or `error`).
pub async fn subscribe(ws: &mut WsStream, conversation_id: &str) -> Value {
    send_json(
        ws,
        &json!({"type": "subscribe", "conversationId": conversation_id}),
    )
    .await;
    recv_json(ws).await.expect("no reply to subscribe")
}
