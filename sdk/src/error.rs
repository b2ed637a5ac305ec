//! Error types for the session engine.

use thiserror::Error;

/// Errors surfaced by [`crate::Session`] operations.
///
/// Nothing here is fatal to the process; the scenario runner decides whether
/// to retry, reconnect, skip or abort.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("not connected to voice manager")]
    NotConnected,

    #[error("connection closed by voice manager")]
    Disconnected,

    #[error("no response after {0} receive attempts")]
    NoResponse(usize),

    #[error("transport error: {0}")]
    Transport(String),
}
