//! Session lifecycle and the command/reply protocol.

use std::collections::VecDeque;

use tracing::{debug, info, warn};
use vmtester_protocol::{
    classify, encode_registration, encode_user_prompt, Frame, Reply, WireFormat,
};

use crate::config::{SessionConfig, Tuning};
use crate::error::SessionError;
use crate::transport::{Incoming, Transport};

/// Outcome of the registration probe.
enum Probe {
    Accepted,
    /// Rejected with the connection still open (explicit `ERROR` frame).
    Rejected,
    /// Rejected by the remote dropping the connection.
    Closed,
}

/// One logical connection to the voice manager.
///
/// Owns the transport exclusively and drives it from a single control flow:
/// at most one receive is in flight at any instant and only one `USER`
/// command may be outstanding, so no synchronization is needed. Callers
/// serialize [`Session::send_command`] themselves.
///
/// The instance is reusable: after [`Session::disconnect`] (or a remote
/// close) a new [`Session::connect`] starts a fresh connection with the same
/// identity.
pub struct Session {
    config: SessionConfig,
    tuning: Tuning,
    transport: Option<Transport>,
    connected: bool,
    wire_format: WireFormat,
    last_response: Option<Reply>,
    /// Frames read ahead of need during the registration probe or a liveness
    /// check, consumed before any live receive.
    readahead: VecDeque<Incoming>,
}

impl Session {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_tuning(config, Tuning::default())
    }

    #[must_use]
    pub fn with_tuning(config: SessionConfig, tuning: Tuning) -> Self {
        Self {
            config,
            tuning,
            transport: None,
            connected: false,
            wire_format: WireFormat::Current,
            last_response: None,
            readahead: VecDeque::new(),
        }
    }

    /// The identity this session registers as. Immutable for the session's
    /// lifetime.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.config.user_id
    }

    /// Wire format resolved during the last successful connect.
    #[must_use]
    pub fn wire_format(&self) -> WireFormat {
        self.wire_format
    }

    /// Reply returned by the most recent successful [`Session::send_command`].
    #[must_use]
    pub fn last_response(&self) -> Option<&Reply> {
        self.last_response.as_ref()
    }

    /// Connects to the voice manager and registers the user identity.
    ///
    /// Registration is sent in the current wire format first. Because the
    /// remote's handshake behavior is not known in advance, the engine then
    /// listens briefly for an immediate rejection: an `ERROR` frame naming
    /// `UID`, or the remote dropping the connection, triggers a fallback to
    /// the legacy format (re-opening the connection if needed). A quiet
    /// window means accepted; the protocol defines no positive
    /// acknowledgment.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        // fresh connect: drop any stale handle and probe leftovers
        self.disconnect().await;
        self.readahead.clear();
        self.last_response = None;
        self.wire_format = WireFormat::Current;

        let url = self.config.url();
        info!("connecting to voice manager at {}", url);

        let mut transport = Transport::connect(&url).await?;
        transport
            .send_text(encode_registration(&self.config.user_id, WireFormat::Current))
            .await?;
        debug!("sent registration for '{}'", self.config.user_id);

        match self.probe_registration(&mut transport).await? {
            Probe::Accepted => {}
            Probe::Rejected => {
                info!("registration rejected, falling back to legacy format");
                transport
                    .send_text(encode_registration(&self.config.user_id, WireFormat::Legacy))
                    .await?;
                self.wire_format = WireFormat::Legacy;
            }
            Probe::Closed => {
                info!("connection dropped after registration, retrying with legacy format");
                transport = Transport::connect(&url).await?;
                transport
                    .send_text(encode_registration(&self.config.user_id, WireFormat::Legacy))
                    .await?;
                self.wire_format = WireFormat::Legacy;
            }
        }

        self.transport = Some(transport);
        self.connected = true;
        info!("session registered as '{}'", self.config.user_id);
        Ok(())
    }

    /// Sends one user turn and waits for the service's reply.
    ///
    /// Buffered frames are consumed before the live transport. Auxiliary
    /// frames (binary blocks, acknowledgments, audio headers, malformed
    /// JSON, service errors) are discarded, each counting toward the receive
    /// ceiling. The first `LLM`/`SPEAK`/`WRONG` frame wins and its message
    /// payload is returned.
    pub async fn send_command(&mut self, prompt: &str) -> Result<String, SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }

        {
            let transport = self.transport.as_mut().ok_or(SessionError::NotConnected)?;
            if let Err(e) = transport.send_text(encode_user_prompt(prompt)).await {
                return Err(self.note_failure(e));
            }
        }
        debug!("sent USER command: {}", prompt);

        let ceiling = self.tuning.receive_ceiling;
        for attempt in 1..=ceiling {
            let frame = if let Some(frame) = self.readahead.pop_front() {
                frame
            } else {
                let window = self.tuning.response_window;
                let transport = self.transport.as_mut().ok_or(SessionError::NotConnected)?;
                match transport.recv_timeout(window).await {
                    Ok(Some(frame)) => frame,
                    Ok(None) => return Err(SessionError::NoResponse(attempt)),
                    Err(e) => return Err(self.note_failure(e)),
                }
            };

            match frame {
                Incoming::Text(payload) => match classify(&payload) {
                    Frame::Reply(reply) => {
                        debug!("received {:?} reply", reply.command);
                        let text = reply.text.clone();
                        self.last_response = Some(reply);
                        self.drain_auxiliary().await;
                        return Ok(text);
                    }
                    Frame::ServiceError(reason) => {
                        warn!("service error ({}/{}): {}", attempt, ceiling, reason);
                    }
                    Frame::Ignorable => {
                        debug!("discarding auxiliary frame ({}/{})", attempt, ceiling);
                    }
                    Frame::Malformed => {
                        warn!("discarding malformed frame ({}/{})", attempt, ceiling);
                    }
                },
                Incoming::Binary(data) => {
                    debug!(
                        "discarding {} byte binary frame ({}/{})",
                        data.len(),
                        attempt,
                        ceiling
                    );
                }
            }
        }

        Err(SessionError::NoResponse(ceiling))
    }

    /// Whether the session is usable right now.
    ///
    /// Checked live against the transport rather than cached: the remote can
    /// close at any time without the caller's knowledge. Data frames that
    /// surface during the check are buffered, not dropped.
    #[must_use]
    pub fn is_connected(&mut self) -> bool {
        if !self.connected {
            return false;
        }
        let Some(transport) = self.transport.as_mut() else {
            return false;
        };
        while let Some(polled) = transport.poll_frame() {
            match polled {
                Some(frame) => self.readahead.push_back(frame),
                None => break,
            }
        }
        transport.is_open()
    }

    /// Tears down any existing connection (close errors ignored) and connects
    /// again with the same identity.
    pub async fn reconnect(&mut self) -> Result<(), SessionError> {
        info!("reconnecting session '{}'", self.config.user_id);
        self.connect().await
    }

    /// Disconnects. Idempotent: the connected flag drops first so no further
    /// sends are attempted even if the close itself fails.
    pub async fn disconnect(&mut self) {
        self.connected = false;
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
            debug!("disconnected from voice manager");
        }
    }

    /// Listens briefly after registration for an immediate rejection.
    ///
    /// Anything that is not a rejection is buffered for later consumption:
    /// the remote may already be replying. Each received frame re-arms the
    /// window; the quiet gap is the "no rejection is coming" signal.
    async fn probe_registration(
        &mut self,
        transport: &mut Transport,
    ) -> Result<Probe, SessionError> {
        loop {
            match transport.recv_timeout(self.tuning.probe_window).await {
                Ok(None) => return Ok(Probe::Accepted),
                Ok(Some(Incoming::Text(payload))) => {
                    if let Frame::ServiceError(reason) = classify(&payload) {
                        if reason.contains("UID") {
                            warn!("registration rejected: {}", reason);
                            return Ok(Probe::Rejected);
                        }
                    }
                    debug!("buffering frame received during registration probe");
                    self.readahead.push_back(Incoming::Text(payload));
                }
                Ok(Some(frame)) => {
                    debug!("buffering frame received during registration probe");
                    self.readahead.push_back(frame);
                }
                Err(SessionError::Disconnected) => return Ok(Probe::Closed),
                Err(e) => return Err(e),
            }
        }
    }

    /// Discards trailing auxiliary frames after a reply so they do not
    /// pollute the next command's read sequence. Failures are swallowed.
    async fn drain_auxiliary(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        for _ in 0..self.tuning.drain_listens {
            match transport.recv_timeout(self.tuning.drain_window).await {
                Ok(Some(_)) => debug!("drained trailing auxiliary frame"),
                Ok(None) | Err(_) => break,
            }
        }
    }

    /// A remote close makes the connected flag false; other transport errors
    /// are potentially transient and leave it alone.
    fn note_failure(&mut self, error: SessionError) -> SessionError {
        if error == SessionError::Disconnected {
            self.connected = false;
        }
        error
    }
}
