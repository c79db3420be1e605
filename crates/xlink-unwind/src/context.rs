//! Per-run unwind context.
//!
//! Threaded explicitly through every unwind call so code can tell it is
//! running inside an unwind without consulting process-wide state.

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::Instant;
use uuid::Uuid;

/// Identity and limits of one `clean_pos_in_father` run.
#[derive(Debug, Clone)]
pub struct UnwindContext {
    run_id: Uuid,
    venue: String,
    only: Option<String>,
    max_value_per_chunk: Decimal,
    started: Instant,
}

impl UnwindContext {
    pub fn new(venue: impl Into<String>, only: Option<&str>, max_value_per_chunk: Decimal) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            venue: venue.into(),
            only: only.map(str::to_string),
            max_value_per_chunk,
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    #[must_use]
    pub fn venue(&self) -> &str {
        &self.venue
    }

    /// Instrument the run is restricted to, if any.
    #[must_use]
    pub fn only(&self) -> Option<&str> {
        self.only.as_deref()
    }

    #[must_use]
    pub fn max_value_per_chunk(&self) -> Decimal {
        self.max_value_per_chunk
    }

    /// Whether `symbol` is in scope for this run.
    #[must_use]
    pub fn covers(&self, symbol: &str) -> bool {
        self.only.as_deref().map_or(true, |only| only == symbol)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scope() {
        let all = UnwindContext::new("mock_spot", None, dec!(500));
        assert!(all.covers("BTCUSDT"));
        assert!(all.only().is_none());

        let only = UnwindContext::new("mock_spot", Some("ETHUSDT"), dec!(200));
        assert!(only.covers("ETHUSDT"));
        assert!(!only.covers("BTCUSDT"));
        assert_eq!(only.max_value_per_chunk(), dec!(200));
        assert_ne!(all.run_id(), only.run_id());
    }
}
