//! Fatal-tier escalation for xlink.
//!
//! - HardStopLatch: emergency stop that stays tripped until manually reset
//! - Escalator: alert routing plus latch and exit hook for the named fatal cases

pub mod error;
pub mod escalation;
pub mod hard_stop;

pub use error::{RiskError, RiskResult};
pub use escalation::{Escalator, ExitHook, FnExitHook};
pub use hard_stop::{HardStopLatch, HardStopReason};
