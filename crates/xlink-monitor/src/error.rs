//! DelayMonitor error types.

use thiserror::Error;

use xlink_core::{ActionType, Line, VenueError};
use xlink_router::RouterError;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Duplicate line: {0}")]
    DuplicateLine(Line),

    #[error("Venue error: {0}")]
    Venue(#[from] VenueError),

    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    #[error("No instrument info for {0}")]
    UnknownInstrument(String),

    #[error("No usable bid for {0}")]
    NoBid(String),

    #[error("Could not size a probe order above {0}")]
    Sizing(String),

    #[error("Timeout when waiting: line {line}, action {action}, cid {cid}")]
    WaitTimeout {
        line: Line,
        action: ActionType,
        cid: String,
    },

    #[error("Response queue closed")]
    QueueClosed,
}

impl MonitorError {
    /// Short label for failure metrics.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::DuplicateLine(_) => "duplicate_line",
            Self::Venue(_) => "venue",
            Self::Router(_) => "router",
            Self::UnknownInstrument(_) => "unknown_instrument",
            Self::NoBid(_) => "no_bid",
            Self::Sizing(_) => "sizing",
            Self::WaitTimeout { .. } => "timeout",
            Self::QueueClosed => "queue_closed",
        }
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;
