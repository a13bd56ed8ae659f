//! A single physical WebSocket connection.
//!
//! A [`Connection`] owns one socket. After [`open`](Connection::open) the
//! caller installs it and starts its receive loop with
//! [`start_reader`](Connection::start_reader); the loop decodes text frames
//! through the codec and forwards them, tagged with the connection's
//! generation, until the socket closes. The close code (if any) is reported
//! as the final [`Inbound::Closed`].
//!
//! Frames from a superseded connection carry a stale generation and are
//! discarded by the receiver.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Utf8Bytes;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::error::{LiveError, Result};
use crate::ws::codec::{Envelope, OutboundFrame, decode_frame};

/// Upper bound on the close handshake with an unresponsive peer.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WriterHalf = SplitSink<WsStream, Message>;
type ReaderHalf = SplitStream<WsStream>;

// ---------------------------------------------------------------------------
// Reader events
// ---------------------------------------------------------------------------

/// What the receive loop observed.
#[derive(Debug)]
pub enum Inbound {
    /// A decoded frame.
    Frame(Envelope),
    /// The socket closed. `code` is the close code when the peer sent one.
    Closed { code: Option<u16>, reason: String },
}

/// An [`Inbound`] tagged with the generation of the connection it came from.
#[derive(Debug)]
pub struct ReaderEvent {
    pub generation: u64,
    pub inbound: Inbound,
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// One open socket, or the remains of one.
pub struct Connection {
    generation: u64,
    writer: WriterHalf,
    reader: Option<ReaderHalf>,
    task: Option<JoinHandle<()>>,
}

impl Connection {
    /// Open a socket to `url`, bounded by `timeout`.
    ///
    /// Does not retry; a failure is returned to the caller as-is.
    pub async fn open(url: &Url, generation: u64, timeout: Duration) -> Result<Self> {
        let (ws, _resp) = tokio::time::timeout(timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| LiveError::ConnectTimeout(timeout))??;
        let (writer, reader) = ws.split();

        tracing::info!(
            generation,
            host = url.host_str().unwrap_or_default(),
            "Connected to live WebSocket"
        );

        Ok(Self {
            generation,
            writer,
            reader: Some(reader),
            task: None,
        })
    }

    /// Spawn the receive loop. Has no effect if it is already running.
    pub fn start_reader(&mut self, events: mpsc::Sender<ReaderEvent>) {
        if let Some(read) = self.reader.take() {
            self.task = Some(tokio::spawn(read_loop(self.generation, read, events)));
        }
    }

    /// Encode and write one control frame.
    pub async fn send(&mut self, frame: &OutboundFrame) -> Result<()> {
        let json = frame.encode()?;
        self.writer.send(Message::Text(json.into())).await?;
        tracing::debug!(generation = self.generation, frame = frame.label(), "Sent frame");
        Ok(())
    }

    /// Send a close frame and stop the receive loop.
    ///
    /// The loop is aborted rather than drained, so no `Closed` event is
    /// reported for a locally initiated close.
    pub async fn close(mut self, code: u16, reason: &'static str) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Utf8Bytes::from_static(reason),
        };
        let writer = &mut self.writer;
        let handshake = async move {
            writer.send(Message::Close(Some(frame))).await?;
            writer.close().await
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, handshake).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(generation = self.generation, error = %e, "Close frame not delivered");
            }
            Err(_) => {
                tracing::debug!(generation = self.generation, "Close handshake timed out");
            }
        }
        tracing::info!(generation = self.generation, code, reason, "Closed live WebSocket");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Read frames until the socket closes, forwarding decoded envelopes.
///
/// A frame that fails to decode is logged and skipped; it never ends the loop.
async fn read_loop(generation: u64, mut read: ReaderHalf, events: mpsc::Sender<ReaderEvent>) {
    let (code, reason) = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => match decode_frame(&text) {
                Ok(envelope) => {
                    let event = ReaderEvent {
                        generation,
                        inbound: Inbound::Frame(envelope),
                    };
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(generation, error = %e, "Dropping undecodable frame");
                }
            },
            Some(Ok(Message::Close(frame))) => {
                break match frame {
                    Some(f) => (Some(u16::from(f.code)), f.reason.to_string()),
                    None => (None, String::new()),
                };
            }
            // Ping/pong handled automatically by tungstenite
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(_)) => {
                tracing::debug!(generation, "Ignoring non-text frame");
            }
            Some(Err(e)) => {
                tracing::warn!(generation, error = %e, "WebSocket error");
                break (None, e.to_string());
            }
            None => break (None, "stream ended".to_owned()),
        }
    };

    tracing::info!(generation, ?code, %reason, "Live WebSocket closed");
    let _ = events
        .send(ReaderEvent {
            generation,
            inbound: Inbound::Closed { code, reason },
        })
        .await;
}
