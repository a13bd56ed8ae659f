#![allow(missing_docs)]
//! Typed payloads for domain events.
//!
//! The client core forwards [`Envelope`]s untouched; consumers that recognise
//! an event name decode its `data` into one of these shapes. Every monetary or
//! decimal field is a [`Decimal`] and accepts both JSON strings and numbers,
//! so `"170.12"` decodes to exactly `170.12`.
//!
//! Field sets are deliberately loose: anything the server may omit is an
//! `Option`, and unknown fields are ignored.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{LiveError, Result};
use crate::types::enums::EventKind;
use crate::ws::codec::Envelope;

// ---------------------------------------------------------------------------
// Quotes and FX
// ---------------------------------------------------------------------------

/// Payload of `quote_updated`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuoteUpdate {
    /// Ticker symbol, uppercase.
    pub symbol: String,
    /// Last price in USD.
    pub price_usd: Decimal,
    #[serde(default)]
    pub price_local: Option<Decimal>,
    #[serde(default)]
    pub change_usd: Option<Decimal>,
    #[serde(default)]
    pub change_percent: Option<Decimal>,
    #[serde(default)]
    pub bid_usd: Option<Decimal>,
    #[serde(default)]
    pub ask_usd: Option<Decimal>,
    #[serde(default)]
    pub volume: Option<Decimal>,
    #[serde(default)]
    pub market_status: Option<String>,
}

/// Payload of `fx_rate_updated`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FxRateEvent {
    pub base: String,
    pub quote: String,
    pub rate: Decimal,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Payload of `order_created`, `order_status`, `order_fill` and `order_cancelled`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderEvent {
    pub order_id: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub filled_quantity: Option<Decimal>,
    #[serde(default)]
    pub fill_price_usd: Option<Decimal>,
    #[serde(default)]
    pub amount_usd: Option<Decimal>,
    #[serde(default)]
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Positions and account
// ---------------------------------------------------------------------------

/// Payload of `position_created`, `position_updated` and `position_closed`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PositionEvent {
    pub symbol: String,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub avg_cost_usd: Option<Decimal>,
    #[serde(default)]
    pub market_value_usd: Option<Decimal>,
    #[serde(default)]
    pub unrealized_pnl_usd: Option<Decimal>,
}

/// Payload of `cash_changed`, `buying_power_changed` and `account_status_changed`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountEvent {
    #[serde(default)]
    pub cash_usd: Option<Decimal>,
    #[serde(default)]
    pub buying_power_usd: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// Transfers, DCA, baskets
// ---------------------------------------------------------------------------

/// Payload of `transfer_complete` and `transfer_failed`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransferEvent {
    pub transfer_id: String,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Payload of `dca_executed`, `dca_failed` and `dca_status_changed`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DcaEvent {
    pub plan_id: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub amount_usd: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Payload of `basket_value_changed`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BasketEvent {
    pub basket_id: String,
    pub value_usd: Decimal,
    #[serde(default)]
    pub change_percent: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Dispatch by event name
// ---------------------------------------------------------------------------

/// A decoded domain event, tagged with the kind it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Quote(QuoteUpdate),
    Order(EventKind, OrderEvent),
    Position(EventKind, PositionEvent),
    Account(EventKind, AccountEvent),
    Transfer(EventKind, TransferEvent),
    Dca(EventKind, DcaEvent),
    Fx(FxRateEvent),
    Basket(BasketEvent),
}

impl DomainEvent {
    /// Decode the envelope's payload according to its event name.
    ///
    /// Returns `None` when the envelope carries no event name or a name that
    /// is not a domain event, and `Some(Err(_))` when the name is recognised
    /// but the payload does not match.
    pub fn from_envelope(envelope: &Envelope) -> Option<Result<Self>> {
        let kind = envelope.kind()?;
        let decoded = match kind {
            EventKind::QuoteUpdated => envelope.decode().map(Self::Quote),
            EventKind::OrderCreated
            | EventKind::OrderStatus
            | EventKind::OrderFill
            | EventKind::OrderCancelled => envelope.decode().map(|e| Self::Order(kind, e)),
            EventKind::PositionCreated
            | EventKind::PositionUpdated
            | EventKind::PositionClosed => envelope.decode().map(|e| Self::Position(kind, e)),
            EventKind::CashChanged
            | EventKind::BuyingPowerChanged
            | EventKind::AccountStatusChanged => envelope.decode().map(|e| Self::Account(kind, e)),
            EventKind::TransferComplete | EventKind::TransferFailed => {
                envelope.decode().map(|e| Self::Transfer(kind, e))
            }
            EventKind::DcaExecuted | EventKind::DcaFailed | EventKind::DcaStatusChanged => {
                envelope.decode().map(|e| Self::Dca(kind, e))
            }
            EventKind::FxRateUpdated => envelope.decode().map(Self::Fx),
            EventKind::BasketValueChanged => envelope.decode().map(Self::Basket),
            _ => return None,
        };
        if let Err(LiveError::Decode { event, source }) = &decoded {
            tracing::warn!(%event, id = %envelope.id, error = %source, "Dropping undecodable event");
        }
        Some(decoded)
    }
}
