use roomchat_shared::constants::{MAX_MESSAGE_PAGE_SIZE, MESSAGE_PAGE_SIZE};
use roomchat_shared::moderation::TermList;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub livekit_api_key: String,
    pub livekit_api_secret: String,
    pub livekit_url: String,
    pub moderation_terms_path: Option<String>,
    pub message_page_size: i64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "./roomchat.db".into()),
            livekit_api_key: env::var("LIVEKIT_API_KEY").unwrap_or_default(),
            livekit_api_secret: env::var("LIVEKIT_API_SECRET").unwrap_or_default(),
            livekit_url: env::var("LIVEKIT_URL")
                .unwrap_or_else(|_| "ws://localhost:7880".into()),
            moderation_terms_path: env::var("MODERATION_TERMS_PATH")
                .ok()
                .filter(|p| !p.is_empty()),
            message_page_size: env::var("MESSAGE_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MESSAGE_PAGE_SIZE)
                .clamp(1, MAX_MESSAGE_PAGE_SIZE),
        }
    }

    /// Missing path means an empty list.
    pub fn load_terms(&self) -> std::io::Result<TermList> {
        match &self.moderation_terms_path {
            Some(path) => Ok(TermList::parse(&std::fs::read_to_string(path)?)),
            None => Ok(TermList::default()),
        }
    }
}
