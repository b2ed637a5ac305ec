//! Configuration constants for the mock voice manager.

use std::env;
use std::time::Duration;

/// Default port the mock listens on.
pub const DEFAULT_PORT: u16 = 8070;

/// Grace period for the initial UID registration.
pub const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Size of the fake binary audio block sent after replies.
pub const MOCK_AUDIO_BLOCK_SIZE: usize = 640;

/// Interval between status reports in the server binary.
pub const STATUS_INTERVAL: Duration = Duration::from_secs(30);

/// Returns the listen port from `VOICE_MANAGER_PORT` env var or default.
#[must_use]
pub fn listen_port() -> u16 {
    env::var("VOICE_MANAGER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}
