use futures::{SinkExt, StreamExt};
use roomchat_shared::constants::{
    WS_HEARTBEAT_INTERVAL_MS, WS_RECONNECT_BASE_DELAY_MS, WS_RECONNECT_MAX_DELAY_MS,
};
use roomchat_shared::wire::{ClientEvent, ServerEvent};
use std::collections::HashSet;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Frame(ServerEvent),
    /// The socket dropped; the worker is reconnecting.
    Disconnected,
    /// A new socket is up and every subscription has been re-sent.
    Reconnected,
    /// The gateway refused the session on reconnect. The worker has stopped
    /// and no further events follow.
    SessionRejected(String),
}

#[derive(Debug)]
enum Command {
    Subscribe(String),
    Unsubscribe(String),
    Shutdown,
}

enum Exit {
    Shutdown,
    Lost,
}

/// Delay before reconnect attempt `attempt` (0-based): doubles from the base
/// delay up to the cap.
pub fn reconnect_delay(attempt: u32) -> Duration {
    let factor = 1u64 << attempt.min(16);
    Duration::from_millis(
        WS_RECONNECT_BASE_DELAY_MS
            .saturating_mul(factor)
            .min(WS_RECONNECT_MAX_DELAY_MS),
    )
}

/// Handle to the gateway connection worker.
///
/// The worker owns the socket. It sends a heartbeat ping, reconnects with
/// exponential backoff after a drop and re-subscribes every conversation it
/// was subscribed to.
#[derive(Clone)]
pub struct GatewayTransport {
    commands: mpsc::UnboundedSender<Command>,
}

impl GatewayTransport {
    pub async fn connect(
        config: &ClientConfig,
    ) -> SyncResult<(Self, mpsc::UnboundedReceiver<TransportEvent>)> {
        let url = config.authenticated_gateway_url().to_string();
        let ws = open(&url).await?;
        tracing::info!("Connected to gateway at {}", config.gateway_url);

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            run(url, ws, commands_rx, events_tx).await;
            tracing::debug!("Gateway worker stopped");
        });

        Ok((
            Self {
                commands: commands_tx,
            },
            events_rx,
        ))
    }

    pub fn subscribe(&self, conversation_id: &str) -> SyncResult<()> {
        self.send(Command::Subscribe(conversation_id.to_string()))
    }

    pub fn unsubscribe(&self, conversation_id: &str) -> SyncResult<()> {
        self.send(Command::Unsubscribe(conversation_id.to_string()))
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    fn send(&self, command: Command) -> SyncResult<()> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::Transient("Gateway connection closed".into()))
    }
}

async fn open(url: &str) -> SyncResult<Ws> {
    match connect_async(url).await {
        Ok((ws, _)) => Ok(ws),
        Err(tungstenite::Error::Http(resp)) if resp.status() == StatusCode::UNAUTHORIZED => Err(
            SyncError::Unauthorized("Gateway rejected the session token".into()),
        ),
        Err(e) => Err(e.into()),
    }
}

async fn run(
    url: String,
    ws: Ws,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut subscriptions = HashSet::new();
    let mut ws = ws;
    let mut resumed = false;

    loop {
        match drive(ws, resumed, &mut subscriptions, &mut commands, &events).await {
            Exit::Shutdown => return,
            Exit::Lost => {
                tracing::warn!("Gateway connection lost");
                if events.send(TransportEvent::Disconnected).is_err() {
                    return;
                }
            }
        }

        let mut attempt = 0;
        ws = loop {
            let delay = reconnect_delay(attempt);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                command = commands.recv() => {
                    match command {
                        Some(Command::Subscribe(id)) => { subscriptions.insert(id); }
                        Some(Command::Unsubscribe(id)) => { subscriptions.remove(&id); }
                        Some(Command::Shutdown) | None => return,
                    }
                    continue;
                }
            }

            match open(&url).await {
                Ok(ws) => break ws,
                Err(SyncError::Unauthorized(msg)) => {
                    tracing::error!("Gateway reconnect refused: {}", msg);
                    let _ = events.send(TransportEvent::SessionRejected(msg));
                    return;
                }
                Err(e) => {
                    attempt = attempt.saturating_add(1);
                    tracing::debug!("Gateway reconnect attempt {} failed: {}", attempt, e);
                }
            }
        };
        tracing::info!("Reconnected to gateway");
        resumed = true;
    }
}

async fn drive(
    ws: Ws,
    resumed: bool,
    subscriptions: &mut HashSet<String>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> Exit {
    let (mut sink, mut stream) = ws.split();

    for id in subscriptions.iter() {
        let frame = ClientEvent::Subscribe {
            conversation_id: id.clone(),
        };
        if send_frame(&mut sink, &frame).await.is_err() {
            return Exit::Lost;
        }
    }
    if resumed && events.send(TransportEvent::Reconnected).is_err() {
        return Exit::Shutdown;
    }

    let mut heartbeat = tokio::time::interval(Duration::from_millis(WS_HEARTBEAT_INTERVAL_MS));
    heartbeat.tick().await;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let frame = match command {
                    Some(Command::Subscribe(id)) => {
                        subscriptions.insert(id.clone());
                        ClientEvent::Subscribe { conversation_id: id }
                    }
                    Some(Command::Unsubscribe(id)) => {
                        subscriptions.remove(&id);
                        ClientEvent::Unsubscribe { conversation_id: id }
                    }
                    Some(Command::Shutdown) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return Exit::Shutdown;
                    }
                };
                if send_frame(&mut sink, &frame).await.is_err() {
                    return Exit::Lost;
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => {
                                if events.send(TransportEvent::Frame(event)).is_err() {
                                    return Exit::Shutdown;
                                }
                            }
                            Err(e) => tracing::debug!("Ignoring unrecognized gateway frame: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Exit::Lost,
                    Some(Err(e)) => {
                        tracing::debug!("Gateway read error: {}", e);
                        return Exit::Lost;
                    }
                    Some(Ok(_)) => {}
                }
            }
            _ = heartbeat.tick() => {
                if send_frame(&mut sink, &ClientEvent::Ping).await.is_err() {
                    return Exit::Lost;
                }
            }
        }
    }
}

async fn send_frame<S>(sink: &mut S, event: &ClientEvent) -> SyncResult<()>
where
    S: futures::Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(event)
        .map_err(|e| SyncError::ValidationFailed(format!("Unencodable frame: {}", e)))?;
    sink.send(Message::Text(text.into())).await?;
    Ok(())
}
