//! Venue price and amount newtypes.
//!
//! Probe orders and unwind chunks are floored onto the instrument grid before
//! they reach a venue; a value off the grid is rejected by most exchanges.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// Order or quote price in quote currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Strictly above zero. A venue quoting zero has no book.
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Largest multiple of `tick` not above this price. A zero tick leaves
    /// the price as is.
    pub fn floor_to_tick(&self, tick: Price) -> Self {
        if tick.is_zero() {
            return *self;
        }
        Self((self.0 / tick.0).floor() * tick.0)
    }

    /// Move by `ticks` grid steps; negative moves down.
    pub fn offset_ticks(&self, tick: Price, ticks: i64) -> Self {
        Self(self.0 + tick.0 * Decimal::from(ticks))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Scale by a factor, e.g. bid x 0.96 for a passive probe.
impl Mul<Decimal> for Price {
    type Output = Self;

    fn mul(self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }
}

/// Order or position amount in the instrument's amount unit.
///
/// Position amounts arrive signed from some venues; take [`Size::abs`]
/// before sizing a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Size(Decimal);

impl Size {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[inline]
    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Largest multiple of `step` not above this amount. A zero step leaves
    /// the amount as is.
    pub fn floor_to_step(&self, step: Size) -> Self {
        if step.is_zero() {
            return *self;
        }
        Self((self.0 / step.0).floor() * step.0)
    }

    /// Quote value of this amount at `price`.
    #[inline]
    pub fn notional(&self, price: Price) -> Decimal {
        self.0 * price.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Add for Size {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Size {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Size {
    type Output = Self;

    fn mul(self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }
}

/// Convert between contract and base units.
impl Div<Decimal> for Size {
    type Output = Self;

    fn div(self, divisor: Decimal) -> Self {
        Self(self.0 / divisor)
    }
}
