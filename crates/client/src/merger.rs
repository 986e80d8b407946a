use roomchat_shared::wire::{Message, ServerEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

use crate::store::{lock_store, SharedStore};
use crate::transport::TransportEvent;

/// What a subscriber sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeEvent {
    Created(Message),
    /// Edits and soft deletes.
    Updated(Message),
    /// Membership or room event for the subscribed room.
    RoomChanged(ServerEvent),
    ConnectionLost,
    Reconnected,
    /// The session is no longer accepted. Live events will not resume.
    SessionEnded(String),
}

type Handler = Arc<dyn Fn(&MergeEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Conversation(String),
    Room(String),
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<u64, (Route, Handler)>,
}

impl Registry {
    fn matching(&self, route: Option<&Route>) -> Vec<Handler> {
        self.handlers
            .values()
            .filter(|(r, _)| route.map_or(true, |route| r == route))
            .map(|(_, h)| h.clone())
            .collect()
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps a handler registered until dropped or unsubscribed.
#[must_use = "the handler is removed when the subscription is dropped"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).handlers.remove(&self.id);
        }
    }
}

/// Routes gateway events to subscribers by conversation id or room id.
///
/// Message events are delivered only to handlers of their conversation, so a
/// misbehaving store never sees another conversation's traffic. Connection
/// events go to every handler.
#[derive(Clone, Default)]
pub struct LiveEventMerger {
    registry: Arc<Mutex<Registry>>,
    disconnected: Arc<AtomicBool>,
    session_ended: Arc<AtomicBool>,
}

impl LiveEventMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, conversation_id: &str, handler: F) -> Subscription
    where
        F: Fn(&MergeEvent) + Send + Sync + 'static,
    {
        self.register(Route::Conversation(conversation_id.to_string()), Arc::new(handler))
    }

    pub fn subscribe_room<F>(&self, room_id: &str, handler: F) -> Subscription
    where
        F: Fn(&MergeEvent) + Send + Sync + 'static,
    {
        self.register(Route::Room(room_id.to_string()), Arc::new(handler))
    }

    /// Upserts the conversation's message events into `store` and marks it
    /// stale when the connection drops.
    pub fn subscribe_store(&self, conversation_id: &str, store: SharedStore) -> Subscription {
        self.subscribe(conversation_id, move |event| match event {
            MergeEvent::Created(message) | MergeEvent::Updated(message) => {
                lock_store(&store).upsert_message(message.clone());
            }
            MergeEvent::ConnectionLost => lock_store(&store).mark_stale(),
            _ => {}
        })
    }

    fn register(&self, route: Route, handler: Handler) -> Subscription {
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.handlers.insert(id, (route, handler));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).handlers.len()
    }

    /// True between a disconnect and the following reconnect.
    pub fn is_stale(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// True once the gateway refused the session.
    pub fn is_session_ended(&self) -> bool {
        self.session_ended.load(Ordering::SeqCst)
    }

    /// Delivers one gateway event and returns how many handlers received it.
    pub fn dispatch(&self, event: &ServerEvent) -> usize {
        let (route, merge_event) = match event {
            ServerEvent::MessageCreated {
                conversation_id,
                message,
            } => (
                Route::Conversation(conversation_id.clone()),
                MergeEvent::Created(message.clone()),
            ),
            ServerEvent::MessageUpdated {
                conversation_id,
                message,
            } => (
                Route::Conversation(conversation_id.clone()),
                MergeEvent::Updated(message.clone()),
            ),
            ServerEvent::MemberRoleUpdated { room_id, .. }
            | ServerEvent::MemberRemoved { room_id, .. }
            | ServerEvent::InviteCodeRotated { room_id }
            | ServerEvent::RoomDeleted { room_id } => (
                Route::Room(room_id.clone()),
                MergeEvent::RoomChanged(event.clone()),
            ),
            ServerEvent::Error { message } => {
                tracing::warn!("Gateway error: {}", message);
                return 0;
            }
            ServerEvent::Subscribed { .. } | ServerEvent::Pong => return 0,
        };

        self.deliver(Some(&route), &merge_event)
    }

    pub fn connection_lost(&self) {
        if !self.disconnected.swap(true, Ordering::SeqCst) {
            tracing::info!("Live events interrupted; open conversations are stale");
        }
        self.deliver(None, &MergeEvent::ConnectionLost);
    }

    pub fn reconnected(&self) {
        self.disconnected.store(false, Ordering::SeqCst);
        self.deliver(None, &MergeEvent::Reconnected);
    }

    /// Stores stay stale; only a fresh session can resynchronize them.
    pub fn session_ended(&self, reason: &str) {
        self.disconnected.store(true, Ordering::SeqCst);
        if !self.session_ended.swap(true, Ordering::SeqCst) {
            tracing::warn!("Live events ended: {}", reason);
        }
        self.deliver(None, &MergeEvent::ConnectionLost);
        self.deliver(None, &MergeEvent::SessionEnded(reason.to_string()));
    }

    /// Consumes transport events until the transport goes away.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Frame(event) => {
                    self.dispatch(&event);
                }
                TransportEvent::Disconnected => self.connection_lost(),
                TransportEvent::Reconnected => self.reconnected(),
                TransportEvent::SessionRejected(reason) => self.session_ended(&reason),
            }
        }
    }

    fn deliver(&self, route: Option<&Route>, event: &MergeEvent) -> usize {
        // Handlers run outside the lock so they may subscribe or unsubscribe.
        let handlers = lock(&self.registry).matching(route);
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }
}
