//! Shared helpers for the live client integration tests: a local WebSocket
//! server that records each handshake URI, and a credential provider that
//! counts its calls.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use live_ws::auth::{Credential, CredentialProvider};
use live_ws::error::{LiveError, Result};
use live_ws::types::ConnectionState;
use live_ws::{LiveClient, LiveClientBuilder};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};

pub const WAIT: Duration = Duration::from_secs(5);

/// Route client logs to the test output. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("live_ws=debug")),
        )
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Mock server
// ---------------------------------------------------------------------------

pub struct MockServer {
    pub base_url: String,
    connections: mpsc::UnboundedReceiver<MockConnection>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener
            .local_addr()
            .expect("listener should expose address");
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let (uri_tx, uri_rx) = oneshot::channel();
                    let callback = move |req: &Request,
                                         resp: Response|
                          -> std::result::Result<Response, ErrorResponse> {
                        let _ = uri_tx.send(req.uri().to_string());
                        Ok(resp)
                    };
                    let Ok(ws) = accept_hdr_async(stream, callback).await else {
                        return;
                    };
                    let uri = uri_rx.await.unwrap_or_default();
                    let _ = tx.send(MockConnection { uri, ws });
                });
            }
        });

        Self {
            base_url: format!("ws://{addr}"),
            connections: rx,
        }
    }

    /// Wait for the next client connection.
    pub async fn accept(&mut self) -> MockConnection {
        timeout(WAIT, self.connections.recv())
            .await
            .expect("client should connect")
            .expect("server task should be running")
    }

    /// Assert that no client connects within `window`.
    pub async fn expect_no_connection(&mut self, window: Duration) {
        if let Ok(Some(conn)) = timeout(window, self.connections.recv()).await {
            panic!("unexpected connection: {}", conn.uri);
        }
    }
}

pub struct MockConnection {
    pub uri: String,
    ws: WebSocketStream<TcpStream>,
}

impl MockConnection {
    /// A query parameter from the handshake URI.
    pub fn query(&self, key: &str) -> Option<String> {
        let url = url::Url::parse(&format!("ws://localhost{}", self.uri)).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    pub fn token(&self) -> Option<String> {
        self.query("token")
    }

    pub async fn send_text(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_owned().into()))
            .await
            .expect("server send should succeed");
    }

    /// Send without asserting success; the peer may already be gone.
    pub async fn try_send_json(&mut self, value: Value) -> bool {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .is_ok()
    }

    pub async fn send_json(&mut self, value: Value) {
        self.send_text(&value.to_string()).await;
    }

    pub async fn send_system(&mut self, event: &str, data: Value) {
        self.send_json(envelope("system", event, data)).await;
    }

    pub async fn send_event(&mut self, event: &str, data: Value) {
        self.send_json(envelope("event", event, data)).await;
    }

    /// Next text frame from the client, parsed as JSON.
    pub async fn recv_json(&mut self) -> Value {
        loop {
            let msg = timeout(WAIT, self.ws.next())
                .await
                .expect("client should send a frame")
                .expect("socket should be open")
                .expect("socket should not error");
            match msg {
                Message::Text(text) => {
                    return serde_json::from_str(&text).expect("client frames are JSON");
                }
                Message::Close(frame) => panic!("client closed: {frame:?}"),
                _ => continue,
            }
        }
    }

    /// Next client frame that is not a `pong`.
    pub async fn recv_control(&mut self) -> Value {
        loop {
            let frame = self.recv_json().await;
            if frame["type"] != "pong" {
                return frame;
            }
        }
    }

    /// Assert that the client sends no text frame within `window`.
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Ok(Some(Ok(Message::Text(text)))) = timeout(window, self.ws.next()).await {
            panic!("unexpected frame: {text}");
        }
    }

    /// Wait until the client closes the socket (or it drops).
    pub async fn expect_closed(&mut self) {
        loop {
            match timeout(WAIT, self.ws.next())
                .await
                .expect("client should close")
            {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Close the socket with an application close code.
    pub async fn close(mut self, code: u16, reason: &'static str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Utf8Bytes::from_static(reason),
        };
        let _ = self.ws.close(Some(frame)).await;
        // Drain until the client echoes the close.
        let _ = timeout(Duration::from_secs(1), async {
            while let Some(Ok(_)) = self.ws.next().await {}
        })
        .await;
    }
}

pub fn envelope(frame_type: &str, event: &str, data: Value) -> Value {
    json!({
        "id": format!("evt-{event}"),
        "type": frame_type,
        "event": event,
        "timestamp": "2024-05-01T14:30:00.123456",
        "data": data,
    })
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Issues `fresh-1`, `fresh-2`, … and counts how often it was asked.
#[derive(Clone, Default)]
pub struct CountingProvider {
    calls: Arc<AtomicUsize>,
    delay: Duration,
    fail: bool,
}

impl CountingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for CountingProvider {
    async fn refresh_credential(&self) -> Result<Credential> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(LiveError::Credential("provider offline".into()));
        }
        Ok(Credential::new(
            format!("fresh-{n}"),
            Utc::now() + chrono::Duration::hours(1),
        ))
    }
}

pub fn initial_credential() -> Credential {
    Credential::new("tok-initial", Utc::now() + chrono::Duration::hours(1))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A builder pointed at `server` with short retry delays, no jitter, and a
/// seeded credential.
pub fn client_builder(server: &MockServer, provider: CountingProvider) -> LiveClientBuilder {
    LiveClient::builder(provider)
        .base_url(&server.base_url)
        .credential(initial_credential())
        .heartbeat_interval(Duration::from_secs(10))
        .heartbeat_grace(Duration::from_secs(5))
        .reconnect_delays(Duration::from_millis(50), Duration::from_millis(200))
        .rate_limited_delay(Duration::from_millis(100))
        .reconnect_jitter(0.0)
}

pub async fn wait_for_state(client: &LiveClient, target: ConnectionState) {
    let mut rx = client.connection_state();
    timeout(WAIT, rx.wait_for(|s| *s == target))
        .await
        .unwrap_or_else(|_| panic!("client should reach {target}"))
        .expect("client task should be running");
}
