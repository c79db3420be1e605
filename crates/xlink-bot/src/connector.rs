//! Per-venue wiring of router, monitor and unwind engine.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use xlink_core::{DynOrderCallback, DynVenue, OrderCallback, OrderEvent};
use xlink_monitor::DelayMonitor;
use xlink_risk::{Escalator, FnExitHook, HardStopLatch, HardStopReason};
use xlink_router::LineRouter;
use xlink_telemetry::{DynAlerter, DynMetricsSink};
use xlink_unwind::{UnwindEngine, UnwindReport};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Logs order failures reported by the router.
#[derive(Debug, Default)]
pub struct LogOrderCallback;

impl OrderCallback for LogOrderCallback {
    fn on_order(&self, event: OrderEvent) {
        warn!(
            client_id = %event.client_id,
            kind = ?event.kind,
            reason = %event.reason,
            "order event"
        );
    }
}

/// One venue connection with its probing and unwinding.
pub struct Connector {
    venue: DynVenue,
    router: Arc<LineRouter>,
    monitor: Arc<DelayMonitor>,
    unwind: Arc<UnwindEngine>,
    escalator: Escalator,
    shutdown: CancellationToken,
}

impl Connector {
    pub fn new(
        venue: DynVenue,
        config: &AppConfig,
        alerter: DynAlerter,
        sink: Option<DynMetricsSink>,
    ) -> AppResult<Self> {
        Self::with_callback(venue, config, alerter, sink, Arc::new(LogOrderCallback))
    }

    /// Like [`Connector::new`] with a custom order callback.
    pub fn with_callback(
        venue: DynVenue,
        config: &AppConfig,
        alerter: DynAlerter,
        sink: Option<DynMetricsSink>,
        callback: DynOrderCallback,
    ) -> AppResult<Self> {
        let shutdown = CancellationToken::new();
        let hook_token = shutdown.clone();
        let escalator = Escalator::new(Arc::new(HardStopLatch::new()), alerter).with_exit_hook(
            Arc::new(FnExitHook(move |reason: &HardStopReason| {
                error!(%reason, "hard stop, shutting down");
                hook_token.cancel();
            })),
        );

        let router = Arc::new(LineRouter::new(venue.clone(), callback, config.router.clone())?);
        let mut monitor = DelayMonitor::new(
            router.clone(),
            escalator.clone(),
            config.monitor.clone(),
            config.venue.clone(),
        )?;
        if let Some(sink) = sink {
            monitor = monitor.with_sink(sink);
        }
        let unwind = Arc::new(UnwindEngine::new(
            venue.clone(),
            escalator.clone(),
            config.unwind.clone(),
        ));

        info!(venue = venue.name(), pair = %config.venue.pair, "connector ready");
        Ok(Self {
            venue,
            router,
            monitor: Arc::new(monitor),
            unwind,
            escalator,
            shutdown,
        })
    }

    #[must_use]
    pub fn venue(&self) -> &DynVenue {
        &self.venue
    }

    #[must_use]
    pub fn router(&self) -> &Arc<LineRouter> {
        &self.router
    }

    /// Register this with the venue adapter so probe acknowledgements reach it.
    #[must_use]
    pub fn monitor(&self) -> &Arc<DelayMonitor> {
        &self.monitor
    }

    #[must_use]
    pub fn escalator(&self) -> &Escalator {
        &self.escalator
    }

    /// Run the delay monitor until [`Connector::shutdown`] or a hard stop.
    pub fn spawn_monitor(&self) -> JoinHandle<()> {
        let monitor = self.monitor.clone();
        let cancel = self.shutdown.clone();
        tokio::spawn(async move { monitor.run(cancel).await })
    }

    /// Unwind every position (or only `only`) with the configured chunk cap.
    pub async fn unwind(&self, only: Option<&str>) -> UnwindReport {
        self.unwind.clean_pos_in_father(Decimal::ZERO, only).await
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Resolves once shutdown was requested or a hard stop tripped.
    pub async fn stopped(&self) {
        self.shutdown.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use xlink_core::{MockVenue, VenueKind};
    use xlink_telemetry::RecordingAlerter;

    fn connector() -> (Connector, Arc<RecordingAlerter>) {
        let alerter = Arc::new(RecordingAlerter::new());
        let venue = Arc::new(MockVenue::new("mock_usdt_swap", VenueKind::Swap));
        let connector =
            Connector::new(venue, &AppConfig::simulation(), alerter.clone(), None).unwrap();
        (connector, alerter)
    }

    #[tokio::test]
    async fn test_fatal_requests_shutdown() {
        let (connector, alerter) = connector();
        connector.escalator().fatal(
            HardStopReason::Manual {
                message: "operator".to_string(),
            },
            "manual stop",
        );

        tokio::time::timeout(Duration::from_secs(1), connector.stopped())
            .await
            .unwrap();
        assert!(connector.escalator().is_halted());
        assert!(alerter.contains("manual stop"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_task_stops_on_shutdown() {
        let (connector, _) = connector();
        let handle = connector.spawn_monitor();
        tokio::time::sleep(Duration::from_secs(1)).await;
        connector.shutdown();
        handle.await.unwrap();
    }
}
