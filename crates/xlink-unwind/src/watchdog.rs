//! Unwind watchdog.
//!
//! Alerts once per interval while an unwind is still running, and once more
//! on completion if it ever alerted.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use xlink_risk::Escalator;
use xlink_telemetry::AlertLevel;

/// Handle to a running watchdog task.
pub struct Watchdog {
    done_tx: oneshot::Sender<()>,
    handle: JoinHandle<u32>,
}

impl Watchdog {
    /// Start alerting every `every` on behalf of `venue`.
    pub fn spawn(escalator: Escalator, venue: String, every: Duration) -> Self {
        let (done_tx, done_rx) = oneshot::channel();
        let handle = tokio::spawn(watch(escalator, venue, every, done_rx));
        Self { done_tx, handle }
    }

    /// Stop the watchdog. Returns how many "not done" alerts it raised.
    pub async fn finish(self) -> u32 {
        let _ = self.done_tx.send(());
        match self.handle.await {
            Ok(alerts) => alerts,
            Err(e) => {
                warn!(error = %e, "unwind watchdog task failed");
                0
            }
        }
    }
}

async fn watch(
    escalator: Escalator,
    venue: String,
    every: Duration,
    mut done_rx: oneshot::Receiver<()>,
) -> u32 {
    let started = Instant::now();
    let mut ticker = tokio::time::interval_at(started + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut alerts = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                alerts += 1;
                let waited = every.as_secs() * u64::from(alerts);
                escalator.alert(
                    AlertLevel::Serious,
                    &format!("unwind not done after {waited} sec. {venue}"),
                );
            }
            _ = &mut done_rx => {
                if alerts > 0 {
                    escalator.alert(
                        AlertLevel::Serious,
                        &format!("unwind done after {} sec. {venue}", started.elapsed().as_secs()),
                    );
                }
                debug!(venue = %venue, alerts, "unwind watchdog stopped");
                return alerts;
            }
        }
    }
}
