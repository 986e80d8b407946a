use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::authority::conversation;
use crate::error::{AppError, AppResult};
use crate::models::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaTokenQuery {
    pub conversation_id: String,
}

/// GET /api/media/token?conversationId=
pub async fn get_token(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<MediaTokenQuery>,
) -> AppResult<impl IntoResponse> {
    let scope = conversation::resolve(&state.db, &query.conversation_id).await?;
    conversation::require_access(&state.db, &scope, &user.profile_id).await?;

    if !scope.has_media() {
        return Err(AppError::ValidationFailed(
            "Not an audio or video conversation".into(),
        ));
    }

    if state.config.livekit_api_key.is_empty() || state.config.livekit_api_secret.is_empty() {
        return Err(AppError::Transient(
            "LiveKit not configured. Set LIVEKIT_API_KEY and LIVEKIT_API_SECRET in .env".into(),
        ));
    }

    let token = livekit_api::access_token::AccessToken::with_api_key(
        &state.config.livekit_api_key,
        &state.config.livekit_api_secret,
    )
    .with_identity(&user.profile_id)
    .with_name(&user.name)
    .with_grants(livekit_api::access_token::VideoGrants {
        room_join: true,
        room: scope.id.clone(),
        can_publish: true,
        can_subscribe: true,
        ..Default::default()
    })
    .to_jwt()
    .map_err(|e| {
        tracing::error!("Failed to generate media token: {}", e);
        AppError::Transient("Failed to generate token".into())
    })?;

    Ok(Json(serde_json::json!({
        "token": token,
        "url": state.config.livekit_url,
    })))
}
