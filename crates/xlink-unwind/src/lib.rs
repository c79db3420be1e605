//! Emergency unwinding of every position and resting order on an account.
//!
//! Used on shutdown and on hard-stop. A run loops over clean rounds until the
//! account reads flat twice in a row, then verifies balances settled.
//!
//! # Key Components
//!
//! - [`UnwindEngine`]: Serialized unwind runs against one venue
//! - [`ChunkSizer`]: Sizes reduce orders by value cap, venue maximum and book depth
//! - [`classify`]: Splits positions into dust, pieces and closable
//! - [`Watchdog`]: Alerts while a run is taking too long
//! - [`check_balance_is_stable`] / [`check_positions_and_orders_closed`]: Post-run verification

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod flatten;
pub mod verify;
pub mod watchdog;

pub use config::UnwindConfig;
pub use context::UnwindContext;
pub use engine::{RoundOutcome, RunState, UnwindEngine, UnwindReport};
pub use error::{UnwindError, UnwindResult};
pub use flatten::{
    classify, piece_client_id, piece_order, piece_top_up_amount, position_value, AdjustedLimits,
    ChunkPlan, ChunkSizer, ChunkStep, PositionClass,
};
pub use verify::{balances_agree, check_balance_is_stable, check_positions_and_orders_closed};
pub use watchdog::Watchdog;
