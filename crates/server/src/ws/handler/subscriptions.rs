use crate::authority::conversation;
use crate::models::AuthUser;
use crate::ws::events::ServerEvent;
use crate::ws::gateway::ClientId;
use crate::AppState;

/// Subscribing needs the same access as reading the history over REST.
pub async fn handle_subscribe(
    state: &AppState,
    client_id: ClientId,
    user: &AuthUser,
    conversation_id: String,
) {
    let access = match conversation::resolve(&state.db, &conversation_id).await {
        Ok(scope) => conversation::require_access(&state.db, &scope, &user.profile_id)
            .await
            .map(|_| ()),
        Err(e) => Err(e),
    };

    match access {
        Ok(()) => {
            state.gateway.subscribe(client_id, &conversation_id).await;
            state
                .gateway
                .send_to(client_id, &ServerEvent::Subscribed { conversation_id })
                .await;
        }
        Err(e) => {
            tracing::debug!(
                "Client {} denied subscription to {}: {}",
                client_id,
                conversation_id,
                e
            );
            state
                .gateway
                .send_to(client_id, &ServerEvent::Error { message: e.to_string() })
                .await;
        }
    }
}
