mod broadcast;

use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, RwLock};

pub type ClientId = u64;

pub struct ConnectedClient {
    pub profile_id: String,
    pub tx: mpsc::UnboundedSender<String>,
    pub subscribed_conversations: HashSet<String>,
}

/// Live connections and their conversation subscriptions. One logical
/// stream per connection, multiplexed by conversation id.
pub struct GatewayState {
    next_id: RwLock<u64>,
    pub clients: RwLock<HashMap<ClientId, ConnectedClient>>,
    pub conversation_subs: RwLock<HashMap<String, HashSet<ClientId>>>,
}

impl Default for GatewayState {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayState {
    pub fn new() -> Self {
        Self {
            next_id: RwLock::new(1),
            clients: RwLock::new(HashMap::new()),
            conversation_subs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn next_client_id(&self) -> ClientId {
        let mut id = self.next_id.write().await;
        let current = *id;
        *id += 1;
        current
    }

    pub async fn register(
        &self,
        client_id: ClientId,
        profile_id: String,
        tx: mpsc::UnboundedSender<String>,
    ) {
        let client = ConnectedClient {
            profile_id,
            tx,
            subscribed_conversations: HashSet::new(),
        };
        self.clients.write().await.insert(client_id, client);
    }

    pub async fn unregister(&self, client_id: ClientId) -> Option<ConnectedClient> {
        let client = self.clients.write().await.remove(&client_id)?;

        let mut subs = self.conversation_subs.write().await;
        for conversation_id in &client.subscribed_conversations {
            if let Some(set) = subs.get_mut(conversation_id) {
                set.remove(&client_id);
                if set.is_empty() {
                    subs.remove(conversation_id);
                }
            }
        }

        Some(client)
    }

    pub async fn subscribe(&self, client_id: ClientId, conversation_id: &str) {
        self.conversation_subs
            .write()
            .await
            .entry(conversation_id.to_string())
            .or_default()
            .insert(client_id);

        if let Some(client) = self.clients.write().await.get_mut(&client_id) {
            client
                .subscribed_conversations
                .insert(conversation_id.to_string());
        }
    }

    pub async fn unsubscribe(&self, client_id: ClientId, conversation_id: &str) {
        let mut subs = self.conversation_subs.write().await;
        if let Some(set) = subs.get_mut(conversation_id) {
            set.remove(&client_id);
            if set.is_empty() {
                subs.remove(conversation_id);
            }
        }

        if let Some(client) = self.clients.write().await.get_mut(&client_id) {
            client.subscribed_conversations.remove(conversation_id);
        }
    }

    /// Drops every connection of `profile_id` from the given conversations.
    /// Used when a member is kicked or leaves so they stop receiving pushes.
    pub async fn unsubscribe_profile(&self, profile_id: &str, conversation_ids: &[String]) {
        let client_ids: Vec<ClientId> = {
            let clients = self.clients.read().await;
            clients
                .iter()
                .filter(|(_, c)| c.profile_id == profile_id)
                .map(|(&id, _)| id)
                .collect()
        };

        for client_id in client_ids {
            for conversation_id in conversation_ids {
                self.unsubscribe(client_id, conversation_id).await;
            }
        }
    }

    /// Removes the conversations from every subscriber set.
    pub async fn drop_conversations(&self, conversation_ids: &[String]) {
        let mut subs = self.conversation_subs.write().await;
        let mut clients = self.clients.write().await;
        for conversation_id in conversation_ids {
            if let Some(set) = subs.remove(conversation_id) {
                for client_id in set {
                    if let Some(client) = clients.get_mut(&client_id) {
                        client.subscribed_conversations.remove(conversation_id);
                    }
                }
            }
        }
    }

    pub async fn is_subscribed(&self, client_id: ClientId, conversation_id: &str) -> bool {
        self.conversation_subs
            .read()
            .await
            .get(conversation_id)
            .is_some_and(|set| set.contains(&client_id))
    }

    pub async fn subscriber_count(&self, conversation_id: &str) -> usize {
        self.conversation_subs
            .read()
            .await
            .get(conversation_id)
            .map_or(0, HashSet::len)
    }
}
