//! Client configuration.

use buddy_core::chat::UserIdentity;
use serde::Deserialize;
use url::Url;

use crate::error::ClientError;
use crate::reconnect::{Backoff, DEFAULT_RECONNECT_THRESHOLD};

/// Default matchmaking endpoint.
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8080/ws";

/// Everything needed to run a session against one server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket endpoint (`ws://` or `wss://`).
    pub server_url: String,
    pub identity: UserIdentity,
    /// Failed automatic reconnection attempts before showing the
    /// manual-reconnect view.
    pub reconnect_threshold: u32,
    pub backoff: Backoff,
    /// Automatic reconnection attempts made by the transport. `None` retries
    /// until the controller gives up or the user leaves.
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            identity: UserIdentity::default(),
            reconnect_threshold: DEFAULT_RECONNECT_THRESHOLD,
            backoff: Backoff::default(),
            max_reconnect_attempts: None,
        }
    }
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>, identity: UserIdentity) -> Self {
        Self {
            server_url: server_url.into(),
            identity,
            ..Self::default()
        }
    }

    /// Connection URL, resuming `chat_id` when given.
    pub fn endpoint(&self, chat_id: Option<&str>) -> Result<Url, ClientError> {
        Ok(endpoint_url(&self.server_url, chat_id)?)
    }

    /// Reject settings the session cannot run with.
    pub fn validate(&self) -> Result<(), ClientError> {
        let url = Url::parse(&self.server_url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ClientError::InvalidConfig(format!(
                "server URL must use ws:// or wss://, got {}://",
                url.scheme()
            )));
        }
        if self.identity.login_id.is_empty() {
            return Err(ClientError::InvalidConfig("login id is required".to_string()));
        }
        if self.reconnect_threshold == 0 {
            return Err(ClientError::InvalidConfig(
                "reconnect threshold must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.backoff.jitter) {
            return Err(ClientError::InvalidConfig(
                "backoff jitter must be in [0, 1)".to_string(),
            ));
        }
        Ok(())
    }
}

/// `server_url` with the resumed chat carried as the `chatId` query parameter.
pub(crate) fn endpoint_url(server_url: &str, chat_id: Option<&str>) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(server_url)?;
    if let Some(id) = chat_id.filter(|id| !id.is_empty()) {
        url.query_pairs_mut().append_pair("chatId", id);
    }
    Ok(url)
}
