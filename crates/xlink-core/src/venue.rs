//! Venue adapter contract.
//!
//! A venue adapter supplies the wire protocol, signing, and parsing for one
//! exchange behind this fixed interface. Everything in the routing, probing,
//! and unwind layers talks to a venue only through [`VenueAdapter`].
//!
//! Methods return [`BoxFuture`] so the trait stays dyn-compatible and can be
//! shared as `Arc<dyn VenueAdapter>` across spawned tasks.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::ability::AbilityProvider;
use crate::account::{
    AccountSnapshot, InstrumentInfo, PendingOrder, PosMode, PositionSnapshot, Ticker, VenueKind,
};
use crate::decimal::Size;
use crate::feature::{RouteFeature, RouteFeatures};
use crate::line::{MarginMode, PathType};
use crate::order::{OrderEvent, OrderSide, ProbeResponse, Signal};

/// Boxed future for dyn-compatible async trait methods.
pub use futures_util::future::BoxFuture;

// ============================================================================
// Errors
// ============================================================================

/// Error reported by a venue call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VenueError {
    #[error("not supported")]
    NotSupported,

    #[error("order not found")]
    OrderNotFound,

    #[error("no order to cancel")]
    NoOrderToCancel,

    #[error("instrument delisted")]
    Delisted,

    #[error("rate limited")]
    RateLimited,

    #[error("timeout")]
    Timeout,

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl VenueError {
    /// Recoverable outcomes that are treated as success or only logged.
    #[must_use]
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::OrderNotFound | Self::NoOrderToCancel | Self::NotSupported
        )
    }

    /// Outcomes worth a bounded retry with fixed backoff.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout | Self::Transport(_))
    }
}

/// Result type for venue calls.
pub type VenueResult<T> = std::result::Result<T, VenueError>;

// ============================================================================
// Quirks
// ============================================================================

/// Venue-specific behavior switches consulted by probing and unwinding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueQuirks {
    /// Treat sub-minimum swap positions as pieces (spot always does).
    #[serde(default)]
    pub piece_on_swap: bool,
    /// Skip the `avail < amount` frozen-position check.
    #[serde(default)]
    pub skip_frozen_check: bool,
    /// Compare only total amounts during the balance-stability check.
    #[serde(default)]
    pub ignore_avail_on_balance_check: bool,
    /// Step and minimum amount are quoted already multiplied by the contract size.
    #[serde(default)]
    pub step_includes_multiplier: bool,
    /// Delay between the two probe amends, for amend-rate-limited venues.
    #[serde(default)]
    pub amend_delay_ms: u64,
    /// Literal lead-in the venue forces onto every client order id.
    #[serde(default)]
    pub cid_lead_in: Option<String>,
    /// Venue offers a one-click full close of a position.
    #[serde(default)]
    pub one_click_close: bool,
    /// Notional multiple of the minimum order value used when topping up a spot piece.
    #[serde(default = "default_piece_value_times")]
    pub piece_value_times: Decimal,
}

fn default_piece_value_times() -> Decimal {
    dec!(1.1)
}

impl Default for VenueQuirks {
    fn default() -> Self {
        Self {
            piece_on_swap: false,
            skip_frozen_check: false,
            ignore_avail_on_balance_check: false,
            step_includes_multiplier: false,
            amend_delay_ms: 0,
            cid_lead_in: None,
            one_click_close: false,
            piece_value_times: default_piece_value_times(),
        }
    }
}

// ============================================================================
// Close order
// ============================================================================

/// Reduce-only order used to unwind a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub amount: Size,
    pub pos_mode: PosMode,
    pub margin_mode: MarginMode,
    pub ticker: Ticker,
}

// ============================================================================
// Traits
// ============================================================================

/// Receives asynchronous order outcomes.
pub trait OrderCallback: Send + Sync {
    fn on_order(&self, event: OrderEvent);
}

/// Receives acknowledgements for latency-probe orders.
///
/// Returns `true` when the response belonged to a probe order.
pub trait ProbeListener: Send + Sync {
    fn on_probe_response(&self, response: ProbeResponse) -> bool;
}

/// One exchange connection.
pub trait VenueAdapter: AbilityProvider + Send + Sync {
    // --- identity and capabilities ---

    fn name(&self) -> &str;

    fn kind(&self) -> VenueKind;

    /// Concrete dispatch routes implemented by this adapter.
    fn features(&self) -> RouteFeatures;

    fn quirks(&self) -> &VenueQuirks;

    // --- dispatch ---

    /// Send `signal` over the given route. Outcomes arrive through the
    /// order callback, never through the return value.
    fn dispatch(&self, feature: RouteFeature, signal: Signal) -> BoxFuture<'_, ()>;

    /// Send `signals` as one batch over the given route. Venues without a
    /// batch endpoint send them one at a time.
    fn dispatch_batch(&self, feature: RouteFeature, signals: Vec<Signal>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            for signal in signals {
                self.dispatch(feature, signal).await;
            }
        })
    }

    /// Whether the request stream on `path` is authenticated.
    fn stream_logged_in(&self, path: PathType) -> bool;

    /// Open (and start authenticating) the request stream on `path`.
    fn create_stream(&self, path: PathType) -> BoxFuture<'_, VenueResult<()>>;

    fn set_margin_mode(&self, mode: MarginMode) -> BoxFuture<'_, VenueResult<()>>;

    // --- reads ---

    fn account_snapshot(&self) -> BoxFuture<'_, VenueResult<AccountSnapshot>>;

    fn positions(&self) -> BoxFuture<'_, VenueResult<Vec<PositionSnapshot>>>;

    fn all_pending_orders(&self) -> BoxFuture<'_, VenueResult<Vec<PendingOrder>>>;

    fn pending_orders<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, VenueResult<Vec<PendingOrder>>>;

    fn ticker<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, VenueResult<Ticker>>;

    /// All tickers keyed by symbol. Venues without a bulk endpoint return
    /// `NotSupported` and callers fall back to [`VenueAdapter::ticker`].
    fn all_tickers(&self) -> BoxFuture<'_, VenueResult<HashMap<String, Ticker>>>;

    /// Instrument rules keyed by symbol.
    fn instruments(&self) -> BoxFuture<'_, VenueResult<HashMap<String, InstrumentInfo>>>;

    // --- order and position actions ---

    fn cancel_pending_orders<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, VenueResult<()>>;

    /// Cancel every resting order (restricted to `only` when given).
    /// Returns `true` if any order was still present.
    fn cancel_orders_if_present<'a>(&'a self, only: Option<&'a str>) -> BoxFuture<'a, bool>;

    /// Place a reduce order. Returns whether the venue accepted it.
    fn place_close_order(&self, order: CloseOrder) -> BoxFuture<'_, bool>;

    /// Place an opening order (used to top up piece positions).
    fn open_order(&self, signal: Signal) -> BoxFuture<'_, VenueResult<()>>;

    /// Close a whole position in one call.
    fn close_position_one_click<'a>(
        &'a self,
        symbol: &'a str,
        position_id: Option<&'a str>,
    ) -> BoxFuture<'a, VenueResult<()>> {
        let _ = (symbol, position_id);
        Box::pin(async { Err(VenueError::NotSupported) })
    }
}

/// Arc wrapper for venue adapter trait objects.
pub type DynVenue = Arc<dyn VenueAdapter>;

/// Arc wrapper for order callback trait objects.
pub type DynOrderCallback = Arc<dyn OrderCallback>;
