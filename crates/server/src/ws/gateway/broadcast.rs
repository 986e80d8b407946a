use super::{ClientId, GatewayState};
use crate::ws::events::ServerEvent;

impl GatewayState {
    pub async fn broadcast_conversation(&self, conversation_id: &str, event: &ServerEvent) {
        let msg = match serde_json::to_string(event) {
            Ok(m) => m,
            Err(_) => return,
        };

        let subs = self.conversation_subs.read().await;
        let clients = self.clients.read().await;

        if let Some(subscriber_ids) = subs.get(conversation_id) {
            for &cid in subscriber_ids {
                if let Some(client) = clients.get(&cid) {
                    let _ = client.tx.send(msg.clone());
                }
            }
        }
    }

    pub async fn send_to(&self, client_id: ClientId, event: &ServerEvent) {
        let msg = match serde_json::to_string(event) {
            Ok(m) => m,
            Err(_) => return,
        };

        let clients = self.clients.read().await;
        if let Some(client) = clients.get(&client_id) {
            let _ = client.tx.send(msg);
        }
    }

    /// Every connection of every listed profile.
    pub async fn send_to_profiles(&self, profile_ids: &[String], event: &ServerEvent) {
        let msg = match serde_json::to_string(event) {
            Ok(m) => m,
            Err(_) => return,
        };

        let clients = self.clients.read().await;
        for client in clients.values() {
            if profile_ids.iter().any(|p| *p == client.profile_id) {
                let _ = client.tx.send(msg.clone());
            }
        }
    }
}
