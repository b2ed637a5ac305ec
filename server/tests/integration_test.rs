use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use vmtester_server::{RegistrationPolicy, Server};

/// Test client wrapper that handles websocket frame I/O
struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("Failed to connect");
        TestClient { ws }
    }

    async fn send_text(&mut self, payload: &str) {
        self.ws
            .send(Message::Text(payload.to_string()))
            .await
            .expect("Failed to send");
    }

    async fn recv(&mut self) -> Message {
        self.ws
            .next()
            .await
            .expect("Connection closed")
            .expect("Failed to receive")
    }

    async fn recv_json(&mut self) -> Value {
        let text = self.recv().await.into_text().expect("Expected text frame");
        serde_json::from_str(&text).expect("Expected JSON")
    }

    async fn register(&mut self, user_id: &str) {
        self.send_text(&format!(r#"{{"command":"UID","message":"{user_id}"}}"#))
            .await;
    }
}

/// Start a test server on a random port and return its address
async fn start_test_server(server: &Server) -> SocketAddr {
    server
        .bind("127.0.0.1:0")
        .await
        .expect("Failed to start server")
}

#[tokio::test]
async fn test_register_and_ask() {
    let server = Server::new();
    let addr = start_test_server(&server).await;

    let mut client = TestClient::connect(addr).await;
    client.register("alice").await;
    client
        .send_text(r#"{"command":"USER","message":"hello"}"#)
        .await;

    let reply = client.recv_json().await;
    assert_eq!(reply["command"], "LLM");
    assert_eq!(reply["message"], "Hello! How can I assist you today?");
}

#[tokio::test]
async fn test_legacy_registration_accepted() {
    let server = Server::new();
    let addr = start_test_server(&server).await;

    let mut client = TestClient::connect(addr).await;
    client.send_text(r#"{"UID":"bob"}"#).await;
    client
        .send_text(r#"{"command":"USER","message":"test"}"#)
        .await;

    let reply = client.recv_json().await;
    assert_eq!(reply["command"], "LLM");
    assert!(reply["message"]
        .as_str()
        .expect("message should be a string")
        .contains("test response"));
}

#[tokio::test]
async fn test_user_before_registration_is_rejected() {
    let server = Server::new();
    let addr = start_test_server(&server).await;

    let mut client = TestClient::connect(addr).await;
    client
        .send_text(r#"{"command":"USER","message":"hello"}"#)
        .await;

    let reply = client.recv_json().await;
    assert_eq!(reply["ERROR"], "First message must contain UID");
}

#[tokio::test]
async fn test_empty_user_id_is_rejected() {
    let server = Server::new();
    let addr = start_test_server(&server).await;

    let mut client = TestClient::connect(addr).await;
    client.send_text(r#"{"UID":""}"#).await;

    let reply = client.recv_json().await;
    assert_eq!(reply["ERROR"], "UID must be a non-empty string");
}

#[tokio::test]
async fn test_unknown_command_is_rejected() {
    let server = Server::new();
    let addr = start_test_server(&server).await;

    let mut client = TestClient::connect(addr).await;
    client.register("alice").await;
    client
        .send_text(r#"{"command":"SING","message":"la la"}"#)
        .await;

    let reply = client.recv_json().await;
    assert_eq!(reply["ERROR"], "Unknown command: SING. Expected 'USER'.");
}

#[tokio::test]
async fn test_invalid_json_is_rejected() {
    let server = Server::new();
    let addr = start_test_server(&server).await;

    let mut client = TestClient::connect(addr).await;
    client.register("alice").await;
    client.send_text("definitely not json").await;

    let reply = client.recv_json().await;
    assert_eq!(reply["ERROR"], "Invalid JSON format");
}

#[tokio::test]
async fn test_legacy_with_error_policy_rejects_then_accepts() {
    let server = Server::new().with_registration_policy(RegistrationPolicy::LegacyWithError);
    let addr = start_test_server(&server).await;

    let mut client = TestClient::connect(addr).await;
    client.register("alice").await;

    let rejection = client.recv_json().await;
    assert_eq!(rejection["ERROR"], "First message must contain UID");

    // retry in the legacy shape on the same connection
    client.send_text(r#"{"UID":"alice"}"#).await;
    client
        .send_text(r#"{"command":"USER","message":"hello"}"#)
        .await;

    let reply = client.recv_json().await;
    assert_eq!(reply["command"], "LLM");
}

#[tokio::test]
async fn test_legacy_with_close_policy_drops_the_connection() {
    let server = Server::new().with_registration_policy(RegistrationPolicy::LegacyWithClose);
    let addr = start_test_server(&server).await;

    let mut client = TestClient::connect(addr).await;
    client.register("alice").await;

    // the next frame must be a close (or the stream just ending)
    match client.ws.next().await {
        None | Some(Ok(Message::Close(_))) | Some(Err(_)) => {}
        Some(Ok(other)) => panic!("expected the connection to drop, got {other:?}"),
    }
}

#[tokio::test]
async fn test_audio_frames_follow_the_reply() {
    let server = Server::new().with_audio_frames();
    let addr = start_test_server(&server).await;

    let mut client = TestClient::connect(addr).await;
    client.register("alice").await;
    client
        .send_text(r#"{"command":"USER","message":"hello"}"#)
        .await;

    let reply = client.recv_json().await;
    assert_eq!(reply["command"], "LLM");

    let header = client.recv_json().await;
    assert!(header.get("AUDIO").is_some());

    let block = client.recv().await;
    assert!(matches!(block, Message::Binary(data) if !data.is_empty()));
}

#[tokio::test]
async fn test_registry_tracks_clients() {
    let server = Server::new();
    let addr = start_test_server(&server).await;
    assert_eq!(server.client_count().await, 0);

    let mut client = TestClient::connect(addr).await;
    client.register("alice").await;

    // registration happens asynchronously on the server side
    let mut registered = false;
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if server.client_count().await == 1 {
            registered = true;
            break;
        }
    }
    assert!(registered, "client never appeared in the registry");

    client.ws.close(None).await.expect("Failed to close");
    drop(client);

    let mut removed = false;
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if server.client_count().await == 0 {
            removed = true;
            break;
        }
    }
    assert!(removed, "client was never removed from the registry");
}
