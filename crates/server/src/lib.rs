pub mod authority;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod ws;

use config::Config;
use roomchat_shared::moderation::TermList;
use std::sync::Arc;

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub gateway: Arc<ws::gateway::GatewayState>,
    pub terms: TermList,
}
