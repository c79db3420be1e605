//! Escalation of the named fatal cases.
//!
//! Recoverable and degraded outcomes only alert. The fatal cases trip the
//! [`HardStopLatch`] and, when an [`ExitHook`] is installed, hand control to it
//! so the process can shut down.

use std::sync::Arc;

use tracing::error;

use xlink_telemetry::{AlertLevel, DynAlerter};

use crate::error::{RiskError, RiskResult};
use crate::hard_stop::{HardStopLatch, HardStopReason};

/// Invoked once when a fatal case trips the latch.
#[cfg_attr(test, mockall::automock)]
pub trait ExitHook: Send + Sync {
    fn on_fatal(&self, reason: &HardStopReason);
}

/// Exit hook backed by a closure.
pub struct FnExitHook<F>(pub F);

impl<F> ExitHook for FnExitHook<F>
where
    F: Fn(&HardStopReason) + Send + Sync,
{
    fn on_fatal(&self, reason: &HardStopReason) {
        (self.0)(reason)
    }
}

/// Routes alerts and fatal escalations for one account.
#[derive(Clone)]
pub struct Escalator {
    latch: Arc<HardStopLatch>,
    alerter: DynAlerter,
    exit_hook: Option<Arc<dyn ExitHook>>,
}

impl Escalator {
    #[must_use]
    pub fn new(latch: Arc<HardStopLatch>, alerter: DynAlerter) -> Self {
        Self {
            latch,
            alerter,
            exit_hook: None,
        }
    }

    #[must_use]
    pub fn with_exit_hook(mut self, hook: Arc<dyn ExitHook>) -> Self {
        self.exit_hook = Some(hook);
        self
    }

    /// Forward a non-fatal alert.
    pub fn alert(&self, level: AlertLevel, message: &str) {
        self.alerter.alert(level, message);
    }

    /// Critical alert, trip the latch, run the exit hook on the first trip.
    pub fn fatal(&self, reason: HardStopReason, message: &str) {
        self.alerter.alert(AlertLevel::Critical, message);
        if self.latch.trigger(reason.clone()) {
            if let Some(hook) = &self.exit_hook {
                error!(reason = %reason, "invoking exit hook");
                hook.on_fatal(&reason);
            }
        }
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.latch.is_triggered()
    }

    /// Error if the latch is tripped.
    pub fn ensure_running(&self) -> RiskResult<()> {
        match self.latch.reason() {
            Some(reason) => Err(RiskError::HardStopActive(reason.to_string())),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn latch(&self) -> &Arc<HardStopLatch> {
        &self.latch
    }

    #[must_use]
    pub fn alerter(&self) -> &DynAlerter {
        &self.alerter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use xlink_telemetry::RecordingAlerter;

    #[test]
    fn test_fatal_trips_latch_and_runs_hook_once() {
        let alerter = Arc::new(RecordingAlerter::new());
        let mut hook = MockExitHook::new();
        hook.expect_on_fatal()
            .withf(|reason| *reason == HardStopReason::BalanceUnstable)
            .times(1)
            .return_const(());

        let escalator = Escalator::new(Arc::new(HardStopLatch::new()), alerter.clone())
            .with_exit_hook(Arc::new(hook));

        escalator.fatal(HardStopReason::BalanceUnstable, "balance not stable");
        escalator.fatal(HardStopReason::MonitorDoubleTrigger, "double trigger");

        assert!(escalator.is_halted());
        assert!(escalator.ensure_running().is_err());
        assert_eq!(alerter.count(AlertLevel::Critical), 2);
        assert_eq!(
            escalator.latch().reason(),
            Some(HardStopReason::BalanceUnstable)
        );
    }

    #[test]
    fn test_alert_does_not_halt() {
        let alerter = Arc::new(RecordingAlerter::new());
        let escalator = Escalator::new(Arc::new(HardStopLatch::new()), alerter.clone());

        escalator.alert(AlertLevel::Serious, "possible leak");

        assert!(!escalator.is_halted());
        assert!(escalator.ensure_running().is_ok());
        assert_eq!(alerter.count(AlertLevel::Serious), 1);
    }

    #[test]
    fn test_fn_exit_hook() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let hook = FnExitHook(move |_: &HardStopReason| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let escalator = Escalator::new(
            Arc::new(HardStopLatch::new()),
            Arc::new(RecordingAlerter::new()),
        )
        .with_exit_hook(Arc::new(hook));

        escalator.fatal(HardStopReason::MonitorDoubleTrigger, "double trigger");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
