//! Order-related types and identifiers.
//!
//! Provides sides, signals routed through a line, asynchronous order events
//! delivered back through the result callback, and probe responses.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::decimal::{Price, Size};
use crate::line::{ActionType, Transport};

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Limit,
    Market,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "limit"),
            Self::Market => write!(f, "market"),
        }
    }
}

/// Client order ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create a new unique client order ID.
    ///
    /// Format: `xl_{timestamp_ms}_{uuid_short}`
    pub fn generate() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().simple().to_string()[..8];
        Self(format!("xl_{ts}_{uuid_short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientOrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ClientOrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ClientOrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Signal
// ============================================================================

/// Channel requested by the signal author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalChannel {
    /// Route over whatever line is currently selected.
    #[default]
    Auto,
    /// Pin to the request-response transport.
    Rest,
}

/// One order instruction handed to a venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub client_id: ClientOrderId,
    /// Venue order id, required for amend/cancel by oid.
    #[serde(default)]
    pub order_id: Option<String>,
    pub price: Price,
    pub amount: Size,
    pub side: OrderSide,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub channel: SignalChannel,
}

impl Signal {
    pub fn limit(
        symbol: impl Into<String>,
        client_id: ClientOrderId,
        side: OrderSide,
        price: Price,
        amount: Size,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            client_id,
            order_id: None,
            price,
            amount,
            side,
            order_type: OrderType::Limit,
            channel: SignalChannel::Auto,
        }
    }

    #[must_use]
    pub fn pinned_to_rest(mut self) -> Self {
        self.channel = SignalChannel::Rest;
        self
    }

    #[must_use]
    pub fn is_pinned_to_rest(&self) -> bool {
        self.channel == SignalChannel::Rest
    }
}

// ============================================================================
// OrderEvent
// ============================================================================

/// Kind of order event synthesized or relayed to the result callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventKind {
    Error,
    AmendFail,
    CancelFail,
}

/// Order outcome delivered through [`crate::venue::OrderCallback`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub client_id: ClientOrderId,
    pub kind: OrderEventKind,
    pub reason: String,
}

impl OrderEvent {
    pub fn new(client_id: ClientOrderId, kind: OrderEventKind, reason: impl Into<String>) -> Self {
        Self {
            client_id,
            kind,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// ProbeResponse
// ============================================================================

/// Venue acknowledgement of a latency-probe order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResponse {
    pub transport: Transport,
    pub action: ActionType,
    pub client_id: String,
    /// Venue order id. Mandatory on place acknowledgements.
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub amend_ok: bool,
    /// Venue-side round trip in microseconds.
    pub duration_us: i64,
}
