use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

/// The authenticated caller, resolved from a session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub profile_id: String,
    pub name: String,
}
