//! Configuration for the session engine.

use std::env;
use std::time::Duration;

/// Default voice manager host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default voice manager port.
pub const DEFAULT_PORT: u16 = 8070;

/// Default user identity.
pub const DEFAULT_USER_ID: &str = "test_user";

/// Bound on opening the websocket connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns the voice manager host from `VOICE_MANAGER_IP` env var or default.
#[must_use]
pub fn manager_host() -> String {
    env::var("VOICE_MANAGER_IP").unwrap_or_else(|_| DEFAULT_HOST.to_string())
}

/// Returns the voice manager port from `VOICE_MANAGER_PORT` env var or default.
#[must_use]
pub fn manager_port() -> u16 {
    env::var("VOICE_MANAGER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Returns the user identity from `USER_ID` env var or default.
#[must_use]
pub fn default_user_id() -> String {
    env::var("USER_ID").unwrap_or_else(|_| DEFAULT_USER_ID.to_string())
}

/// Where and as whom a session connects.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub user_id: String,
}

impl SessionConfig {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, user_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user_id: user_id.into(),
        }
    }

    /// Builds a config from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            host: manager_host(),
            port: manager_port(),
            user_id: default_user_id(),
        }
    }

    /// Websocket endpoint for this config.
    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://{}:{}/ws", self.host, self.port)
    }
}

/// Bounds on the engine's receive loops.
///
/// The defaults mirror observed behavior of real deployments rather than
/// protocol guarantees, so they stay adjustable per session.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Quiet window that ends the registration probe.
    pub probe_window: Duration,
    /// Receive attempts per command before giving up.
    pub receive_ceiling: usize,
    /// Bound on each live receive while waiting for a reply.
    pub response_window: Duration,
    /// Listens performed by the post-reply drain.
    pub drain_listens: usize,
    /// Bound on each drain listen.
    pub drain_window: Duration,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            probe_window: Duration::from_millis(300),
            receive_ceiling: 5,
            response_window: Duration::from_secs(5),
            drain_listens: 3,
            drain_window: Duration::from_millis(100),
        }
    }
}
