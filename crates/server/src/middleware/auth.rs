use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use chrono::Utc;
use std::sync::Arc;

use crate::db::parse_timestamp;
use crate::error::AppError;
use crate::models::AuthUser;
use crate::AppState;

pub const SESSION_COOKIE: &str = "roomchat.session_token";

/// Bearer header first, then the session cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    bearer
        .or_else(|| {
            headers
                .get("cookie")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .split(';')
                .filter_map(|c| c.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
                .map(|t| t.to_string())
                .next()
        })
        .filter(|t| !t.is_empty())
}

/// Looks up a live session. `Ok(None)` for unknown or expired tokens.
pub async fn resolve_session(
    db: &sqlx::SqlitePool,
    token: &str,
) -> Result<Option<AuthUser>, AppError> {
    let row = sqlx::query_as::<_, (String, String, String)>(
        r#"SELECT p.id, p.name, s.expires_at
           FROM sessions s
           JOIN profiles p ON p.id = s.profile_id
           WHERE s.token = ?"#,
    )
    .bind(token)
    .fetch_optional(db)
    .await?;

    let Some((profile_id, name, expires_at)) = row else {
        return Ok(None);
    };

    if parse_timestamp("expires_at", &expires_at)? < Utc::now() {
        return Ok(None);
    }

    Ok(Some(AuthUser { profile_id, name }))
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or(AppError::Unauthenticated)?;
        resolve_session(&state.db, &token)
            .await?
            .ok_or(AppError::Unauthenticated)
    }
}
