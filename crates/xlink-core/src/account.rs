//! Account, position, and market snapshots read from a venue.
//!
//! Snapshots are owned by the venue adapter and never cached across unwind
//! rounds; every consumer re-fetches before acting.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::{Price, Size};
use crate::line::MarginMode;
use crate::order::OrderSide;

/// Market type a venue adapter trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueKind {
    Spot,
    #[default]
    Swap,
}

impl VenueKind {
    #[must_use]
    pub fn is_spot(&self) -> bool {
        matches!(self, Self::Spot)
    }
}

impl fmt::Display for VenueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spot => write!(f, "spot"),
            Self::Swap => write!(f, "swap"),
        }
    }
}

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PosSide {
    Long,
    Short,
}

impl PosSide {
    /// Side of the order that reduces this position.
    #[must_use]
    pub fn close_side(&self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Sell,
            Self::Short => OrderSide::Buy,
        }
    }

    /// Side of the order that adds to this position.
    #[must_use]
    pub fn open_side(&self) -> OrderSide {
        self.close_side().opposite()
    }
}

/// Position mode of the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PosMode {
    #[default]
    OneWay,
    Hedge,
}

/// Unit in which a venue quotes order amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountUnit {
    /// Amount is in base-asset units (contracts or coins).
    #[default]
    Base,
    /// Amount is in quote currency.
    Quote,
}

// ============================================================================
// Positions and balances
// ============================================================================

/// One open position as reported by the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    /// Signed amount; negative for shorts on venues that sign positions.
    pub amount: Size,
    /// Amount not locked by pending orders or venue holds.
    pub avail_amount: Size,
    pub avg_price: Price,
    pub side: PosSide,
    #[serde(default)]
    pub pos_mode: PosMode,
    #[serde(default)]
    pub margin_mode: MarginMode,
    #[serde(default)]
    pub position_id: Option<String>,
}

impl PositionSnapshot {
    /// Convenience constructor for a fully-available position.
    pub fn new(symbol: impl Into<String>, side: PosSide, amount: Size, avg_price: Price) -> Self {
        Self {
            symbol: symbol.into(),
            amount,
            avail_amount: amount,
            avg_price,
            side,
            pos_mode: PosMode::OneWay,
            margin_mode: MarginMode::None,
            position_id: None,
        }
    }

    #[must_use]
    pub fn with_avail(mut self, avail: Size) -> Self {
        self.avail_amount = avail;
        self
    }

    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.amount.is_zero()
    }

    /// `|amount| * avg_price`.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.amount.abs().notional(self.avg_price)
    }
}

/// One asset balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub name: String,
    pub amount: Decimal,
    pub avail: Decimal,
}

impl BalanceSnapshot {
    pub fn new(name: impl Into<String>, amount: Decimal, avail: Decimal) -> Self {
        Self {
            name: name.into(),
            amount,
            avail,
        }
    }
}

/// Account summary: balances plus positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balances: Vec<BalanceSnapshot>,
    pub positions: Vec<PositionSnapshot>,
}

impl AccountSnapshot {
    #[must_use]
    pub fn balance(&self, name: &str) -> Option<&BalanceSnapshot> {
        self.balances.iter().find(|b| b.name == name)
    }
}

/// Resting order on the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub symbol: String,
    pub order_id: String,
    #[serde(default)]
    pub client_id: Option<String>,
    pub side: OrderSide,
    pub price: Price,
    pub amount: Size,
}

// ============================================================================
// Market data
// ============================================================================

/// Top of book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub bid_price: Price,
    pub bid_qty: Size,
    pub ask_price: Price,
    pub ask_qty: Size,
}

impl Ticker {
    pub fn new(
        symbol: impl Into<String>,
        bid_price: Price,
        bid_qty: Size,
        ask_price: Price,
        ask_qty: Size,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            bid_price,
            bid_qty,
            ask_price,
            ask_qty,
        }
    }

    /// Mid price; zero if either side is missing.
    #[must_use]
    pub fn mid(&self) -> Price {
        if self.bid_price.is_zero() || self.ask_price.is_zero() {
            return Price::ZERO;
        }
        Price::new((self.bid_price.inner() + self.ask_price.inner()) / Decimal::TWO)
    }
}

/// Trading rules for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub symbol: String,
    #[serde(default = "default_tradable")]
    pub tradable: bool,
    pub tick_size: Price,
    pub step_size: Size,
    /// Contract multiplier; 1 for spot.
    #[serde(default = "default_multiplier")]
    pub multiplier: Decimal,
    pub min_order_amount: Size,
    pub max_order_amount: Size,
    pub min_order_value: Decimal,
    pub max_order_value: Decimal,
    #[serde(default)]
    pub amount_unit: AmountUnit,
}

fn default_tradable() -> bool {
    true
}

fn default_multiplier() -> Decimal {
    Decimal::ONE
}
