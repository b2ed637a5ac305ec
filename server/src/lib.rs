//! Mock voice manager: a websocket service that emulates the real backend
//! for local end-to-end testing. It performs the registration handshake,
//! answers each `USER` command with a canned reply and can optionally mimic
//! legacy-only deployments or the audio side-channel.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info};
use vmtester_protocol::{
    decode_request, encode_error, encode_reply, Command, ProtocolError, Request, WireFormat,
};

pub mod config;
pub mod error;
pub mod responder;

pub use error::ServerError;

type Ws = WebSocketStream<TcpStream>;

/// How the mock answers a registration attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegistrationPolicy {
    /// Accept either wire format.
    #[default]
    Any,
    /// Emulate a legacy deployment: reject the command format with an
    /// `ERROR` frame and keep the connection open for a retry.
    LegacyWithError,
    /// Emulate a legacy deployment that drops the connection instead.
    LegacyWithClose,
}

/// A registered client.
#[derive(Debug, Clone)]
struct ClientInfo {
    address: SocketAddr,
    message_count: u64,
}

type Registry = Arc<RwLock<HashMap<String, ClientInfo>>>;

/// The mock voice manager server.
#[derive(Clone)]
pub struct Server {
    registration_policy: RegistrationPolicy,
    audio_frames: bool,
    clients: Registry,
    total_messages: Arc<AtomicU64>,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    #[must_use]
    pub fn new() -> Self {
        Server {
            registration_policy: RegistrationPolicy::Any,
            audio_frames: false,
            clients: Arc::new(RwLock::new(HashMap::new())),
            total_messages: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Sets how registration attempts are answered.
    #[must_use]
    pub fn with_registration_policy(mut self, policy: RegistrationPolicy) -> Self {
        self.registration_policy = policy;
        self
    }

    /// Follow every reply with a mock audio header and a binary audio block.
    #[must_use]
    pub fn with_audio_frames(mut self) -> Self {
        self.audio_frames = true;
        self
    }

    /// Number of currently registered clients.
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Runs the accept loop on `addr` until the process stops.
    pub async fn run(&self, addr: &str) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("mock voice manager listening on {}", local_addr);

        accept_loop(listener, self.clone()).await;
        Ok(())
    }

    /// Binds `addr` and accepts in the background; returns the bound address.
    pub async fn bind(&self, addr: &str) -> Result<SocketAddr, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("mock voice manager listening on {}", local_addr);

        let server = self.clone();
        tokio::spawn(async move {
            accept_loop(listener, server).await;
        });

        Ok(local_addr)
    }

    /// Prints a status report of connected clients.
    pub async fn print_status(&self) {
        let clients = self.clients.read().await;
        println!("{}", "=".repeat(50));
        println!("Mock Voice Manager Status");
        println!("{}", "=".repeat(50));
        println!("Connected clients: {}", clients.len());
        println!(
            "Total messages processed: {}",
            self.total_messages.load(Ordering::Relaxed)
        );
        for (uid, info) in clients.iter() {
            println!(
                "  - {}: {} ({} messages)",
                uid, info.address, info.message_count
            );
        }
        println!("{}", "=".repeat(50));
    }
}

async fn accept_loop(listener: TcpListener, server: Server) {
    loop {
        match listener.accept().await {
            Ok((socket, peer_addr)) => {
                info!("[{}] new connection", peer_addr);
                let server = server.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(socket, peer_addr, server).await {
                        error!("[{}] error: {}", peer_addr, e);
                    }
                });
            }
            Err(e) => {
                error!("accept error: {}", e);
                break;
            }
        }
    }
}

async fn handle_client(
    socket: TcpStream,
    peer_addr: SocketAddr,
    server: Server,
) -> Result<(), ServerError> {
    let mut ws = tokio_tungstenite::accept_async(socket).await?;

    // === REGISTRATION PHASE ===
    let Some(user_id) =
        wait_for_registration(&mut ws, peer_addr, server.registration_policy).await?
    else {
        return Ok(());
    };

    {
        let mut lock = server.clients.write().await;
        lock.insert(
            user_id.clone(),
            ClientInfo {
                address: peer_addr,
                message_count: 0,
            },
        );
    }
    info!("[{}] {} registered", peer_addr, user_id);

    let result = message_loop(&mut ws, peer_addr, &user_id, &server).await;

    let mut lock = server.clients.write().await;
    lock.remove(&user_id);
    drop(lock);
    info!("[{}] {} removed from registry", peer_addr, user_id);

    result
}

/// Waits for the first frame, which must register a user id in either wire
/// shape. Returns `None` when the attempt was answered terminally (timeout,
/// rejection under a legacy-only policy, or the peer leaving early).
async fn wait_for_registration(
    ws: &mut Ws,
    peer_addr: SocketAddr,
    policy: RegistrationPolicy,
) -> Result<Option<String>, ServerError> {
    loop {
        let message = match tokio::time::timeout(config::REGISTRATION_TIMEOUT, ws.next()).await {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(e))) => {
                debug!("[{}] receive error before registration: {}", peer_addr, e);
                return Ok(None);
            }
            Ok(None) => {
                debug!("[{}] disconnected before registering", peer_addr);
                return Ok(None);
            }
            Err(_) => {
                send_error(ws, "Timeout waiting for UID").await?;
                return Ok(None);
            }
        };

        let payload = match message {
            Message::Text(payload) => payload,
            Message::Close(_) => {
                debug!("[{}] closed before registering", peer_addr);
                return Ok(None);
            }
            _ => continue,
        };

        match decode_request(&payload) {
            Ok(Request::Register { user_id, format }) => {
                if format == WireFormat::Current {
                    match policy {
                        RegistrationPolicy::Any => {}
                        RegistrationPolicy::LegacyWithError => {
                            info!("[{}] rejecting command-format registration", peer_addr);
                            send_error(ws, "First message must contain UID").await?;
                            // the client may retry in the legacy shape
                            continue;
                        }
                        RegistrationPolicy::LegacyWithClose => {
                            info!("[{}] closing on command-format registration", peer_addr);
                            let _ = ws.close(None).await;
                            return Ok(None);
                        }
                    }
                }
                // Real deployments send no confirmation for a registration;
                // neither does the mock.
                debug!(
                    "[{}] UID {} registered ({:?} format, no confirmation sent)",
                    peer_addr, user_id, format
                );
                return Ok(Some(user_id));
            }
            Ok(Request::UserPrompt(_)) => {
                send_error(ws, "First message must contain UID").await?;
                return Ok(None);
            }
            Err(ProtocolError::InvalidJson(_)) => {
                send_error(ws, "Invalid JSON format").await?;
                return Ok(None);
            }
            Err(ProtocolError::EmptyUserId) => {
                send_error(ws, "UID must be a non-empty string").await?;
                return Ok(None);
            }
            Err(_) => {
                send_error(ws, "First message must contain UID").await?;
                return Ok(None);
            }
        }
    }
}

async fn message_loop(
    ws: &mut Ws,
    peer_addr: SocketAddr,
    user_id: &str,
    server: &Server,
) -> Result<(), ServerError> {
    while let Some(message) = ws.next().await {
        let message = match message {
            Ok(m) => m,
            Err(e) => {
                debug!("[{}] receive error: {}", peer_addr, e);
                break;
            }
        };

        let payload = match message {
            Message::Text(payload) => payload,
            Message::Close(_) => {
                info!("[{}] {} disconnected", peer_addr, user_id);
                break;
            }
            _ => continue,
        };

        server.total_messages.fetch_add(1, Ordering::Relaxed);
        {
            let mut lock = server.clients.write().await;
            if let Some(info) = lock.get_mut(user_id) {
                info.message_count += 1;
            }
        }
        debug!("[{}] received from {}: {}", peer_addr, user_id, payload);

        match decode_request(&payload) {
            Ok(Request::UserPrompt(prompt)) => {
                let reply = responder::canned_reply(&prompt);
                ws.send(Message::Text(encode_reply(Command::Llm, &reply)))
                    .await?;
                info!("[{}] answered {}: '{}'", peer_addr, user_id, reply);

                if server.audio_frames {
                    send_audio_frames(ws, &reply).await?;
                }
            }
            Ok(Request::Register { format, .. }) => {
                let text = match format {
                    WireFormat::Current => "Unknown command: UID. Expected 'USER'.".to_string(),
                    WireFormat::Legacy => invalid_format_message(),
                };
                send_error(ws, &text).await?;
            }
            Err(ProtocolError::InvalidJson(_)) => {
                send_error(ws, "Invalid JSON format").await?;
            }
            Err(ProtocolError::UnknownCommand(name)) => {
                send_error(ws, &format!("Unknown command: {name}. Expected 'USER'.")).await?;
            }
            Err(_) => {
                send_error(ws, &invalid_format_message()).await?;
            }
        }
    }
    Ok(())
}

fn invalid_format_message() -> String {
    "Invalid message format. Expected: {'command': 'USER', 'message': 'content'}".to_string()
}

/// Mimics the real backend's audio side-channel: a JSON header frame
/// followed by a raw payload block. Clients are expected to discard both.
async fn send_audio_frames(ws: &mut Ws, reply: &str) -> Result<(), ServerError> {
    let header = serde_json::json!({
        "AUDIO": {
            "format": "pcm16",
            "sample_rate": 16_000,
            "utterance_len": reply.len(),
        }
    });
    ws.send(Message::Text(header.to_string())).await?;
    ws.send(Message::Binary(vec![0u8; config::MOCK_AUDIO_BLOCK_SIZE]))
        .await?;
    Ok(())
}

async fn send_error(ws: &mut Ws, text: &str) -> Result<(), ServerError> {
    ws.send(Message::Text(encode_error(text))).await?;
    Ok(())
}
