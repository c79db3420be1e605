//! HardStopLatch: process-wide emergency stop for the fatal tier.
//!
//! Once triggered, the latch stays triggered until manually reset. Probing
//! and unwinding check it before starting new cycles.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use xlink_telemetry::Metrics;

// ============================================================================
// HardStopReason
// ============================================================================

/// Reason for HardStop trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum HardStopReason {
    /// Line switch kept failing while configured to halt.
    SwitchLineFailed {
        /// Line that could not be selected.
        line: String,
    },
    /// Position still open after unwind retries were exhausted.
    ResidualPosition {
        /// Instrument holding the residual.
        symbol: String,
        /// Residual notional in quote currency.
        notional: Decimal,
    },
    /// Balances kept moving after every stability poll.
    BalanceUnstable,
    /// A probe cycle was triggered while another was in flight.
    MonitorDoubleTrigger,
    /// Manual trigger by operator.
    Manual {
        /// Human-readable message.
        message: String,
    },
}

impl std::fmt::Display for HardStopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SwitchLineFailed { line } => write!(f, "Switch line failed: {line}"),
            Self::ResidualPosition { symbol, notional } => {
                write!(f, "Residual position: {symbol} ${notional}")
            }
            Self::BalanceUnstable => write!(f, "Balance unstable"),
            Self::MonitorDoubleTrigger => write!(f, "Monitor double trigger"),
            Self::Manual { message } => write!(f, "Manual: {message}"),
        }
    }
}

// ============================================================================
// HardStopLatch
// ============================================================================

/// Emergency stop latch.
///
/// Thread-safe: Can be safely shared across threads via `Arc<HardStopLatch>`.
pub struct HardStopLatch {
    /// Triggered flag (true = emergency stop active).
    triggered: AtomicBool,
    /// Timestamp when triggered (Unix milliseconds, 0 if not triggered).
    triggered_at: AtomicI64,
    /// Reason for trigger.
    reason: RwLock<Option<HardStopReason>>,
}

impl Default for HardStopLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl HardStopLatch {
    /// Create a new HardStopLatch in non-triggered state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            triggered: AtomicBool::new(false),
            triggered_at: AtomicI64::new(0),
            reason: RwLock::new(None),
        }
    }

    /// Check if HardStop is currently triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Trigger the HardStop with a reason.
    ///
    /// Returns `true` on the first trigger. Later triggers keep the original
    /// reason and return `false`.
    pub fn trigger(&self, reason: HardStopReason) -> bool {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.triggered_at
                .store(chrono::Utc::now().timestamp_millis(), Ordering::SeqCst);
            *self.reason.write() = Some(reason.clone());
            Metrics::hard_stop(true);
            error!(reason = %reason, "HARD STOP TRIGGERED");
            true
        } else {
            warn!(new_reason = %reason, "HardStop already triggered, ignoring new trigger");
            false
        }
    }

    /// Unix milliseconds of the trigger, `None` if not triggered.
    #[must_use]
    pub fn triggered_at(&self) -> Option<i64> {
        if self.is_triggered() {
            let ts = self.triggered_at.load(Ordering::SeqCst);
            if ts > 0 {
                return Some(ts);
            }
        }
        None
    }

    /// Reason for the trigger, `None` if not triggered.
    #[must_use]
    pub fn reason(&self) -> Option<HardStopReason> {
        if self.is_triggered() {
            self.reason.read().clone()
        } else {
            None
        }
    }

    /// Reset the latch. Operator action only; nothing resets it automatically.
    pub fn reset(&self) {
        if self.is_triggered() {
            let reason = self.reason.read().clone();
            info!(previous_reason = ?reason, "HardStop manually reset");

            self.triggered.store(false, Ordering::SeqCst);
            self.triggered_at.store(0, Ordering::SeqCst);
            *self.reason.write() = None;
            Metrics::hard_stop(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_hard_stop_initially_not_triggered() {
        let latch = HardStopLatch::new();
        assert!(!latch.is_triggered());
        assert!(latch.triggered_at().is_none());
        assert!(latch.reason().is_none());
    }

    #[test]
    fn test_hard_stop_trigger() {
        let latch = HardStopLatch::new();
        assert!(latch.trigger(HardStopReason::BalanceUnstable));

        assert!(latch.is_triggered());
        assert!(latch.triggered_at().is_some());
        assert_eq!(latch.reason(), Some(HardStopReason::BalanceUnstable));
    }

    #[test]
    fn test_hard_stop_reset() {
        let latch = HardStopLatch::new();
        latch.trigger(HardStopReason::MonitorDoubleTrigger);
        latch.reset();

        assert!(!latch.is_triggered());
        assert!(latch.triggered_at().is_none());
        assert!(latch.reason().is_none());
    }

    #[test]
    fn test_hard_stop_second_trigger_ignored() {
        let latch = HardStopLatch::new();
        latch.trigger(HardStopReason::ResidualPosition {
            symbol: "BTCUSDT".to_string(),
            notional: dec!(750),
        });
        assert!(!latch.trigger(HardStopReason::Manual {
            message: "second".to_string(),
        }));

        match latch.reason() {
            Some(HardStopReason::ResidualPosition { symbol, notional }) => {
                assert_eq!(symbol, "BTCUSDT");
                assert_eq!(notional, dec!(750));
            }
            other => panic!("Wrong reason: {other:?}"),
        }
    }

    #[test]
    fn test_hard_stop_reason_display() {
        let reasons = [
            (
                HardStopReason::SwitchLineFailed {
                    line: "ws-colo-".to_string(),
                },
                "Switch line failed: ws-colo-",
            ),
            (HardStopReason::BalanceUnstable, "Balance unstable"),
            (HardStopReason::MonitorDoubleTrigger, "Monitor double trigger"),
            (
                HardStopReason::Manual {
                    message: "test".to_string(),
                },
                "Manual: test",
            ),
        ];

        for (reason, expected) in reasons {
            assert_eq!(reason.to_string(), expected);
        }
    }
}
