use std::env;
use url::Url;

use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    pub gateway_url: Url,
    pub session_token: String,
}

impl ClientConfig {
    /// Gateway URL is derived from the API URL: `ws(s)://host/gateway`.
    pub fn new(api_url: &str, session_token: impl Into<String>) -> SyncResult<Self> {
        let api_url = parse_url(api_url)?;
        let gateway_url = gateway_url_for(&api_url)?;
        Ok(Self {
            api_url,
            gateway_url,
            session_token: session_token.into(),
        })
    }

    pub fn from_env() -> SyncResult<Self> {
        dotenvy::dotenv().ok();

        let api_url =
            env::var("ROOMCHAT_API_URL").unwrap_or_else(|_| "http://localhost:3001".into());
        let token = env::var("ROOMCHAT_SESSION_TOKEN").unwrap_or_default();
        let mut config = Self::new(&api_url, token)?;

        if let Ok(gateway) = env::var("ROOMCHAT_GATEWAY_URL") {
            if !gateway.is_empty() {
                config.gateway_url = parse_url(&gateway)?;
            }
        }
        Ok(config)
    }

    /// Gateway URL with the session token attached as `?token=`.
    pub fn authenticated_gateway_url(&self) -> Url {
        let mut url = self.gateway_url.clone();
        url.query_pairs_mut()
            .append_pair("token", &self.session_token);
        url
    }
}

fn parse_url(raw: &str) -> SyncResult<Url> {
    Url::parse(raw).map_err(|e| SyncError::ValidationFailed(format!("Invalid URL {}: {}", raw, e)))
}

fn gateway_url_for(api_url: &Url) -> SyncResult<Url> {
    let mut url = api_url.join("/gateway").map_err(|e| {
        SyncError::ValidationFailed(format!("Invalid API URL {}: {}", api_url, e))
    })?;
    let scheme = match api_url.scheme() {
        "https" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| SyncError::ValidationFailed(format!("Cannot derive gateway URL from {}", api_url)))?;
    Ok(url)
}
