//! Core domain types for the xlink connector.
//!
//! This crate provides the types shared by routing, probing, and unwinding:
//! - `AbilitySet`: venue capability bitmask with category collapse
//! - `Line`, `SelectedLine`: transport x path combinations
//! - `RouteFeature`: explicit per-(action, transport, path) dispatch table
//! - `Price`, `Size`: precision-safe numeric types
//! - `VenueAdapter`: the contract every exchange connection implements
//! - `MockVenue`: scriptable in-memory venue

pub mod ability;
pub mod account;
pub mod decimal;
pub mod error;
pub mod feature;
pub mod line;
pub mod mock;
pub mod order;
pub mod venue;

pub use ability::{check_abilities, has_abilities, Ability, AbilityProvider, AbilitySet};
pub use account::{
    AccountSnapshot, AmountUnit, BalanceSnapshot, InstrumentInfo, PendingOrder, PosMode, PosSide,
    PositionSnapshot, Ticker, VenueKind,
};
pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use feature::{RouteFeature, RouteFeatures};
pub use line::{ActionType, Line, MarginMode, PathType, SelectedLine, Transport};
pub use mock::{MockVenue, RecordingCallback, VenueCall};
pub use order::{
    ClientOrderId, OrderEvent, OrderEventKind, OrderSide, OrderType, ProbeResponse, Signal,
    SignalChannel,
};
pub use venue::{
    BoxFuture, CloseOrder, DynOrderCallback, DynVenue, OrderCallback, ProbeListener, VenueAdapter,
    VenueError, VenueQuirks, VenueResult,
};
