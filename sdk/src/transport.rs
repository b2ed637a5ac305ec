//! Websocket transport wrapper.

use std::time::Duration;

use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::ProtocolError as WsProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::config::CONNECT_TIMEOUT;
use crate::error::SessionError;

/// A discrete message read from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Text(String),
    Binary(Vec<u8>),
}

/// Wrapper around one websocket connection.
///
/// Owned exclusively by a session. Tracks the last observed open/closed state
/// so liveness can be answered without a send attempt.
pub struct Transport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    open: bool,
}

impl Transport {
    /// Opens a websocket connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, SessionError> {
        let (stream, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url))
            .await
            .map_err(|_| SessionError::ConnectionFailed("operation timed out".to_string()))?
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;

        debug!("websocket connected to {}", url);
        Ok(Self { stream, open: true })
    }

    /// Sends one text frame.
    pub async fn send_text(&mut self, payload: String) -> Result<(), SessionError> {
        if !self.open {
            return Err(SessionError::Disconnected);
        }
        let result = self.stream.send(Message::Text(payload)).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.note_error(e)),
        }
    }

    /// Receives the next data frame. Control frames never surface.
    pub async fn recv(&mut self) -> Result<Incoming, SessionError> {
        if !self.open {
            return Err(SessionError::Disconnected);
        }
        loop {
            match self.stream.next().await {
                Some(Ok(message)) => {
                    if let Some(frame) = self.to_incoming(message) {
                        return Ok(frame);
                    }
                    if !self.open {
                        return Err(SessionError::Disconnected);
                    }
                }
                Some(Err(e)) => return Err(self.note_error(e)),
                None => {
                    self.open = false;
                    return Err(SessionError::Disconnected);
                }
            }
        }
    }

    /// Receives with a bound. `Ok(None)` means the window elapsed quietly,
    /// which is an expected outcome rather than an error.
    pub async fn recv_timeout(
        &mut self,
        window: Duration,
    ) -> Result<Option<Incoming>, SessionError> {
        match tokio::time::timeout(window, self.recv()).await {
            Ok(Ok(frame)) => Ok(Some(frame)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    /// Polls once without blocking.
    ///
    /// `Some(Some(frame))` is a data frame that had already arrived,
    /// `Some(None)` means the stream is finished, `None` means nothing is
    /// pending right now.
    pub fn poll_frame(&mut self) -> Option<Option<Incoming>> {
        if !self.open {
            return Some(None);
        }
        loop {
            match self.stream.next().now_or_never() {
                Some(Some(Ok(message))) => {
                    if let Some(frame) = self.to_incoming(message) {
                        return Some(Some(frame));
                    }
                    if !self.open {
                        return Some(None);
                    }
                }
                Some(Some(Err(_))) | Some(None) => {
                    self.open = false;
                    return Some(None);
                }
                None => return None,
            }
        }
    }

    /// Best-effort close; errors are ignored.
    pub async fn close(&mut self) {
        self.open = false;
        let _ = self.stream.close(None).await;
    }

    /// Whether the last observed state of the connection was open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn to_incoming(&mut self, message: Message) -> Option<Incoming> {
        match message {
            Message::Text(text) => Some(Incoming::Text(text)),
            Message::Binary(data) => Some(Incoming::Binary(data)),
            Message::Close(_) => {
                debug!("received close frame");
                self.open = false;
                None
            }
            // ping/pong are answered inside tungstenite
            _ => None,
        }
    }

    fn note_error(&mut self, error: WsError) -> SessionError {
        match error {
            WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Protocol(WsProtocolError::ResetWithoutClosingHandshake) => {
                self.open = false;
                SessionError::Disconnected
            }
            WsError::Io(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::ConnectionAborted
                        | std::io::ErrorKind::BrokenPipe
                        | std::io::ErrorKind::UnexpectedEof
                ) =>
            {
                self.open = false;
                SessionError::Disconnected
            }
            other => SessionError::Transport(other.to_string()),
        }
    }
}
