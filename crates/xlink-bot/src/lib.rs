//! xlink connector application.
//!
//! Wires one venue to:
//! - LineRouter dispatch over the selected line per action
//! - DelayMonitor probing and failover
//! - UnwindEngine on shutdown and hard stop
//! - Escalation of fatal cases into a process shutdown

pub mod config;
pub mod connector;
pub mod error;
pub mod simulate;

pub use config::{AppConfig, LogConfig, SinkKind};
pub use connector::{Connector, LogOrderCallback};
pub use error::{AppError, AppResult};
pub use simulate::{build_venue, run_simulation, simulated_venue, SimulationSummary};
