//! Fan-out of decoded frames to independent consumer streams.
//!
//! Each topic has its own `broadcast` channel, so every consumer reads at its
//! own pace: a slow reader lags (and skips) only on its own receiver and never
//! holds up another. Streams are handed out as boxed [`Stream`]s that live as
//! long as the client.
//!
//! | Stream              | Contents                                        |
//! |---------------------|-------------------------------------------------|
//! | `event_updates()`   | every `event` and `error` envelope              |
//! | `quote_updates()`   | `quote_updated` payloads decoded to [`QuoteUpdate`] |
//! | `ack_updates()`     | `ack` envelopes                                 |
//! | `alerts()`          | [`ClientAlert`]s meant for the UI layer         |
//!
//! [`Stream`]: futures_util::Stream

use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::constants::events;
use crate::types::enums::FrameType;
use crate::types::events::QuoteUpdate;
use crate::ws::codec::Envelope;

/// A lazy, non-restartable sequence of items from one topic.
pub type EventStream<T> = BoxStream<'static, T>;

/// Conditions surfaced to the consumer outside the normal event flow.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAlert {
    /// The server closed with 4003/4004. The client will not reconnect
    /// until [`connect`](crate::ws::client::LiveClient::connect) is called again.
    Fatal { code: u16, reason: String },
    /// The server closed with 4005; the next attempt waits `delay`.
    RateLimited { delay: Duration },
    /// The credential-refresh capability failed.
    CredentialRefreshFailed { message: String },
    /// The server answered a `refresh_token` frame with an error. The
    /// current session stays up until the server closes it.
    RefreshRejected(Envelope),
}

/// Per-topic broadcast senders.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    events: broadcast::Sender<Envelope>,
    acks: broadcast::Sender<Envelope>,
    quotes: broadcast::Sender<QuoteUpdate>,
    alerts: broadcast::Sender<ClientAlert>,
}

impl EventDispatcher {
    /// Create a dispatcher whose channels each buffer `capacity` items.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: broadcast::channel(capacity).0,
            acks: broadcast::channel(capacity).0,
            quotes: broadcast::channel(capacity).0,
            alerts: broadcast::channel(capacity).0,
        }
    }

    /// Route one envelope to the streams it belongs on.
    ///
    /// A `quote_updated` payload that fails to decode is logged and left off
    /// the quote stream; the envelope itself still reaches the event stream.
    pub fn dispatch(&self, envelope: Envelope) {
        match envelope.frame_type {
            FrameType::Ack => {
                let _ = self.acks.send(envelope);
            }
            FrameType::Event | FrameType::Error => {
                if envelope.is(events::QUOTE_UPDATED) {
                    match envelope.decode::<QuoteUpdate>() {
                        Ok(quote) => {
                            let _ = self.quotes.send(quote);
                        }
                        Err(e) => {
                            tracing::warn!(id = %envelope.id, error = %e, "Dropping undecodable quote");
                        }
                    }
                }
                let _ = self.events.send(envelope);
            }
            FrameType::System => {
                tracing::debug!(event = ?envelope.event, "System frame not dispatched");
            }
        }
    }

    /// Publish an alert.
    pub fn alert(&self, alert: ClientAlert) {
        let _ = self.alerts.send(alert);
    }

    /// Stream of `event` and `error` envelopes.
    pub fn event_updates(&self) -> EventStream<Envelope> {
        into_stream(self.events.subscribe(), "events")
    }

    /// Stream of `ack` envelopes.
    pub fn ack_updates(&self) -> EventStream<Envelope> {
        into_stream(self.acks.subscribe(), "acks")
    }

    /// Stream of decoded quotes.
    pub fn quote_updates(&self) -> EventStream<QuoteUpdate> {
        into_stream(self.quotes.subscribe(), "quotes")
    }

    /// Stream of alerts.
    pub fn alerts(&self) -> EventStream<ClientAlert> {
        into_stream(self.alerts.subscribe(), "alerts")
    }
}

fn into_stream<T>(rx: broadcast::Receiver<T>, topic: &'static str) -> EventStream<T>
where
    T: Clone + Send + 'static,
{
    stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(item) => return Some((item, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic, skipped, "Consumer lagged; items skipped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}
