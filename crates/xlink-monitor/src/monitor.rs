//! Latency probing across lines with fastest-line failover.
//!
//! One probe cycle walks the configured lines strictly in order: switch the
//! place line, activate REST links, then place, amend twice and cancel a
//! passive limit order, timing each acknowledgement. At most one cycle runs
//! at a time.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use xlink_core::{
    ActionType, ClientOrderId, DynVenue, InstrumentInfo, Line, OrderSide, Price, ProbeListener,
    ProbeResponse, RouteFeature, SelectedLine, Signal, Size, Transport,
};
use xlink_risk::{Escalator, HardStopReason};
use xlink_router::{ensure_stream_logged_in, LineRouter};
use xlink_telemetry::{AlertLevel, DynMetricsSink, Metrics};

use crate::cid::{CidCodec, ACTIVATION_ORDER_ID};
use crate::config::{MonitorConfig, VenueProfile};
use crate::endpoint::{Endpoint, EndpointKey, LineAction};
use crate::error::{MonitorError, MonitorResult};

/// Measurement name of flushed endpoint stats.
pub const DELAY_MEASUREMENT: &str = "delay";
const MAX_SIZING_ATTEMPTS: u32 = 1_000;
const AMEND_TICKS: i64 = 2;

/// How a call to [`DelayMonitor::trigger`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every reachable line was probed.
    Completed,
    /// Another cycle was already in flight.
    Skipped,
    /// Every configured line is disabled; nothing was probed.
    Disabled,
    /// A probe step failed; resting orders were flattened.
    Failed,
}

enum SwitchAttempt {
    Switched,
    Exhausted,
    Unsupported,
}

/// Clears the in-flight flag even if the cycle future is dropped.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    venue: &'a str,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        Metrics::monitoring_in_flight(self.venue, false);
    }
}

/// Probes every configured line of one venue and keeps per-endpoint latency.
pub struct DelayMonitor {
    monitor_id: String,
    venue: DynVenue,
    router: Arc<LineRouter>,
    escalator: Escalator,
    sink: Option<DynMetricsSink>,
    config: MonitorConfig,
    profile: VenueProfile,
    codec: CidCodec,
    activation_cid: String,
    lines: RwLock<Vec<Line>>,
    entries: DashMap<LineAction, Arc<Endpoint>>,
    monitoring: AtomicBool,
    disabled_lines: RwLock<Vec<Line>>,
    responses_tx: mpsc::Sender<ProbeResponse>,
    responses_rx: Mutex<mpsc::Receiver<ProbeResponse>>,
}

impl DelayMonitor {
    /// Create a monitor probing `config.lines` in order.
    pub fn new(
        router: Arc<LineRouter>,
        escalator: Escalator,
        config: MonitorConfig,
        profile: VenueProfile,
    ) -> MonitorResult<Self> {
        let venue = router.venue().clone();
        let codec = CidCodec::for_venue(venue.name(), venue.quirks());
        let activation_cid = codec.activation_cid();
        let (responses_tx, responses_rx) = mpsc::channel(config.response_queue.max(1));
        let monitor_id = format!("{}_{}", venue.name(), Utc::now().timestamp_micros());

        let monitor = Self {
            monitor_id,
            venue,
            router,
            escalator,
            sink: None,
            lines: RwLock::new(Vec::with_capacity(config.lines.len())),
            config,
            profile,
            codec,
            activation_cid,
            entries: DashMap::new(),
            monitoring: AtomicBool::new(false),
            disabled_lines: RwLock::new(Vec::new()),
            responses_tx,
            responses_rx: Mutex::new(responses_rx),
        };
        for line in monitor.config.lines.clone() {
            monitor.add_line(line)?;
        }
        info!(monitor_id = %monitor.monitor_id, prefix = monitor.codec.prefix(), "delay monitor created");
        Ok(monitor)
    }

    #[must_use]
    pub fn with_sink(mut self, sink: DynMetricsSink) -> Self {
        self.sink = Some(sink);
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn monitor_id(&self) -> &str {
        &self.monitor_id
    }

    #[must_use]
    pub fn codec(&self) -> &CidCodec {
        &self.codec
    }

    #[must_use]
    pub fn activation_cid(&self) -> &str {
        &self.activation_cid
    }

    #[must_use]
    pub fn lines(&self) -> Vec<Line> {
        self.lines.read().clone()
    }

    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::Acquire)
    }

    /// Set for a line once the venue reports it cannot serve it. Disabled
    /// lines are never probed again.
    #[must_use]
    pub fn is_line_disabled(&self, line: &Line) -> bool {
        self.disabled_lines
            .read()
            .iter()
            .any(|l| l == line && l.margin_mode == line.margin_mode)
    }

    #[must_use]
    pub fn disabled_lines(&self) -> Vec<Line> {
        self.disabled_lines.read().clone()
    }

    fn disable_line(&self, line: Line) {
        if !self.is_line_disabled(&line) {
            self.disabled_lines.write().push(line);
        }
    }

    #[must_use]
    pub fn endpoint(&self, line_action: &LineAction) -> Option<Arc<Endpoint>> {
        self.entries.get(line_action).map(|e| e.value().clone())
    }

    #[must_use]
    pub fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    /// Mean of the per-variant averages recorded for `action` on `line`.
    #[must_use]
    pub fn average_latency(&self, line: Line, action: ActionType) -> Option<i64> {
        let averages: Vec<i64> = self
            .entries
            .iter()
            .filter(|e| e.key().line == line && e.key().is_action(action))
            .map(|e| e.value().delay().stats())
            .filter(|stats| !stats.is_empty())
            .map(|stats| stats.avg)
            .collect();
        if averages.is_empty() {
            return None;
        }
        Some(averages.iter().sum::<i64>() / averages.len() as i64)
    }

    /// Append a line to the probe order. Lines equal in transport, path and
    /// margin mode are rejected.
    pub fn add_line(&self, line: Line) -> MonitorResult<()> {
        let mut lines = self.lines.write();
        if lines
            .iter()
            .any(|l| *l == line && l.margin_mode == line.margin_mode)
        {
            return Err(MonitorError::DuplicateLine(line));
        }
        debug!(%line, "add line");
        lines.push(line);
        Ok(())
    }

    // ========================================================================
    // Response intake
    // ========================================================================

    /// Offer a venue acknowledgement. Returns `true` when it belonged to a
    /// probe order, whether or not it was queued.
    pub fn try_next(&self, response: ProbeResponse) -> bool {
        if !self.codec.is_monitor_order(&response.client_id) {
            if response.client_id.is_empty() {
                error!(?response, "probe response without client id");
                return true;
            }
            return false;
        }

        match response.action {
            ActionType::Place if response.order_id.as_deref().map_or(true, str::is_empty) => {
                error!(cid = %response.client_id, "place response must carry an order id");
                return true;
            }
            ActionType::Amend if !response.amend_ok => {
                error!(cid = %response.client_id, "probe amend failed");
                return true;
            }
            _ => {}
        }

        match self.responses_tx.try_send(response) {
            Ok(()) => {}
            Err(TrySendError::Full(response)) => {
                warn!(cid = %response.client_id, "probe response queue full, dropping");
                Metrics::probe_failed(self.venue.name(), "queue_full");
            }
            Err(TrySendError::Closed(response)) => {
                warn!(cid = %response.client_id, "probe response queue closed");
            }
        }
        true
    }

    /// Wait for the acknowledgement of `action` on `cid` over `line`.
    ///
    /// Waits while a cycle is running, since the cycle owns the response queue.
    pub async fn wait_want(
        &self,
        line: Line,
        cid: &str,
        action: ActionType,
        ext: &str,
    ) -> MonitorResult<Option<String>> {
        let mut rx = self.responses_rx.lock().await;
        self.wait_want_on(&mut rx, line, cid, action, ext).await
    }

    /// Returns the venue order id on place acknowledgements. The activation
    /// cancel ack ends any wait with `None`.
    async fn wait_want_on(
        &self,
        rx: &mut mpsc::Receiver<ProbeResponse>,
        line: Line,
        cid: &str,
        action: ActionType,
        ext: &str,
    ) -> MonitorResult<Option<String>> {
        debug!(%line, cid, %action, ext, "waiting");
        let deadline = tokio::time::sleep(self.config.wait_timeout());
        tokio::pin!(deadline);

        loop {
            let response = tokio::select! {
                _ = &mut deadline => {
                    return Err(MonitorError::WaitTimeout {
                        line,
                        action,
                        cid: cid.to_string(),
                    });
                }
                response = rx.recv() => response.ok_or(MonitorError::QueueClosed)?,
            };

            if response.action == ActionType::Cancel && response.client_id == self.activation_cid {
                debug!(?response, "activation cancel acknowledged");
                return Ok(None);
            }
            if response.transport != line.transport
                || response.client_id != cid
                || response.action != action
            {
                error!(%line, %action, cid, ?response, "wrong response while waiting");
                continue;
            }
            if action == ActionType::Amend && !response.amend_ok {
                error!(cid, "probe amend failed");
                continue;
            }
            let order_id = if action == ActionType::Place {
                match response.order_id.filter(|oid| !oid.is_empty()) {
                    Some(oid) => Some(oid),
                    None => {
                        error!(cid, "place response must carry an order id");
                        continue;
                    }
                }
            } else {
                None
            };

            self.record(line, action, ext, response.duration_us);
            return Ok(order_id);
        }
    }

    fn record(&self, line: Line, action: ActionType, ext: &str, micros: i64) {
        let line_action = LineAction::new(line, action, ext);
        let endpoint = self
            .entries
            .entry(line_action.clone())
            .or_insert_with(|| Arc::new(Endpoint::new(line_action, self.config.ring_capacity)))
            .value()
            .clone();
        endpoint.record(micros, Utc::now().timestamp_micros());
        Metrics::probe_latency(
            self.venue.name(),
            &line.to_string(),
            &endpoint.line_action().action_with_ext,
            micros,
        );
        debug!(endpoint = %endpoint.line_action(), stats = %endpoint.delay().stats(), "update delay");
    }

    // ========================================================================
    // Probe cycle
    // ========================================================================

    /// Run one probe cycle unless one is already in flight.
    pub async fn trigger(&self) -> CycleOutcome {
        let venue_name = self.venue.name();
        if self
            .monitoring
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let msg = format!("should not monitoring. {venue_name}");
            error!(venue = venue_name, "probe cycle already in flight");
            if self.config.halt_on_double_trigger {
                self.escalator.fatal(HardStopReason::MonitorDoubleTrigger, &msg);
            } else {
                self.escalator.alert(AlertLevel::Serious, &msg);
            }
            return CycleOutcome::Skipped;
        }
        let _in_flight = InFlight {
            flag: &self.monitoring,
            venue: venue_name,
        };
        Metrics::monitoring_in_flight(venue_name, true);

        let outcome = match self.run_cycle().await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.on_cycle_failure(&e).await;
                CycleOutcome::Failed
            }
        };

        if outcome == CycleOutcome::Completed && self.config.failover {
            self.failover().await;
        }
        info!(venue = venue_name, ?outcome, "probe cycle finished");
        outcome
    }

    async fn run_cycle(&self) -> MonitorResult<CycleOutcome> {
        let lines: Vec<Line> = self
            .lines()
            .into_iter()
            .filter(|line| !self.is_line_disabled(line))
            .collect();
        if lines.is_empty() {
            return Ok(CycleOutcome::Disabled);
        }

        let instrument = self.instrument().await?;
        let mut rx = self.responses_rx.lock().await;
        while let Ok(stale) = rx.try_recv() {
            debug!(?stale, "discarding stale probe response");
        }

        for line in lines {
            match self.switch_for_probe(line).await {
                SwitchAttempt::Switched => {}
                SwitchAttempt::Exhausted | SwitchAttempt::Unsupported => continue,
            }
            self.probe_line(&mut rx, line, &instrument).await?;
            tokio::time::sleep(Duration::from_millis(self.config.line_settle_ms)).await;
        }
        Ok(CycleOutcome::Completed)
    }

    async fn instrument(&self) -> MonitorResult<InstrumentInfo> {
        let pair = &self.profile.pair;
        self.venue
            .instruments()
            .await?
            .remove(pair)
            .ok_or_else(|| MonitorError::UnknownInstrument(pair.clone()))
    }

    async fn switch_for_probe(&self, line: Line) -> SwitchAttempt {
        let venue_name = self.venue.name();
        let retries = self.config.switch_retries.max(1);
        for attempt in 1..=retries {
            match self
                .router
                .switch_line(ActionType::Place, SelectedLine::new(line))
                .await
            {
                Ok(_) => return SwitchAttempt::Switched,
                Err(e) if e.is_not_supported() => {
                    warn!(venue = venue_name, %line, error = %e, "not support switch line, disabling it");
                    self.disable_line(line);
                    if self.config.halt_on_unsupported_line {
                        self.escalator.fatal(
                            HardStopReason::SwitchLineFailed {
                                line: line.to_string(),
                            },
                            &format!("{venue_name} cannot switch to line {line}: {e}"),
                        );
                    }
                    return SwitchAttempt::Unsupported;
                }
                Err(e) => {
                    warn!(venue = venue_name, %line, attempt, error = %e, "failed to switch line, trying again");
                    if attempt < retries {
                        tokio::time::sleep(Duration::from_millis(self.config.switch_backoff_ms))
                            .await;
                    }
                }
            }
        }

        let msg = format!("failed to switch line final. action: place, line: {line}");
        error!(venue = venue_name, %line, "failed to switch line final");
        if self.config.exit_on_switch_failure {
            self.escalator.fatal(
                HardStopReason::SwitchLineFailed {
                    line: line.to_string(),
                },
                &msg,
            );
        } else {
            self.escalator.alert(AlertLevel::Serious, &msg);
        }
        SwitchAttempt::Exhausted
    }

    async fn probe_line(
        &self,
        rx: &mut mpsc::Receiver<ProbeResponse>,
        line: Line,
        instrument: &InstrumentInfo,
    ) -> MonitorResult<()> {
        if line.transport == Transport::Streaming {
            ensure_stream_logged_in(&self.venue, line.path, self.router.config()).await?;
        } else {
            self.activate_link(rx, line).await;
        }

        let bid = self.venue.ticker(&self.profile.pair).await?.bid_price;
        let price = Price::new(bid.inner() * self.config.place_price_factor)
            .floor_to_tick(instrument.tick_size);
        if !price.is_positive() {
            return Err(MonitorError::NoBid(self.profile.pair.clone()));
        }
        let amount = probe_size(
            price,
            instrument,
            self.config.min_value_factor,
            self.config.value_step,
        )
        .ok_or_else(|| MonitorError::Sizing(instrument.min_order_value.to_string()))?;

        let key = EndpointKey::for_feature(RouteFeature::for_line(ActionType::Place, &line));
        let cid = self.codec.encode(key, false);
        let mut order = Signal::limit(
            self.profile.pair.clone(),
            ClientOrderId::from(cid.clone()),
            OrderSide::Buy,
            price,
            amount,
        );

        self.send(line, ActionType::Place, order.clone()).await;
        // a late activation ack can end the first wait without an order id
        let order_id = loop {
            if let Some(oid) = self
                .wait_want_on(rx, line, &cid, ActionType::Place, "")
                .await?
            {
                break oid;
            }
        };
        order.order_id = Some(order_id);

        self.probe_amends(rx, line, &order, bid, instrument).await?;

        self.send(line, ActionType::Cancel, order.clone()).await;
        self.wait_want_on(rx, line, &cid, ActionType::Cancel, "")
            .await?;
        Ok(())
    }

    /// Cancel a non-existent order so the REST link is warm before timing.
    async fn activate_link(&self, rx: &mut mpsc::Receiver<ProbeResponse>, line: Line) {
        let mut sentinel = Signal::limit(
            self.profile.pair.clone(),
            ClientOrderId::from(self.activation_cid.clone()),
            OrderSide::Buy,
            Price::ZERO,
            Size::ZERO,
        );
        sentinel.order_id = Some(ACTIVATION_ORDER_ID.to_string());
        self.send(line, ActionType::Cancel, sentinel).await;
        if let Err(e) = self
            .wait_want_on(rx, line, &self.activation_cid, ActionType::Cancel, "")
            .await
        {
            warn!(%line, error = %e, "link activation not acknowledged");
        }
    }

    async fn probe_amends(
        &self,
        rx: &mut mpsc::Receiver<ProbeResponse>,
        line: Line,
        order: &Signal,
        bid: Price,
        instrument: &InstrumentInfo,
    ) -> MonitorResult<()> {
        let amend = RouteFeature::for_line(ActionType::Amend, &line);
        let supported = self.venue.features().supports(amend);
        let cid = order.client_id.as_str();

        if supported {
            let mut down = order.clone();
            down.price = if order.price.is_zero() {
                Price::new(bid.inner() * self.config.amend_down_factor)
                    .floor_to_tick(instrument.tick_size)
            } else {
                order.price.offset_ticks(instrument.tick_size, -AMEND_TICKS)
            };
            self.send(line, ActionType::Amend, down).await;
            self.wait_want_on(rx, line, cid, ActionType::Amend, "_pd")
                .await?;
        }

        let amend_delay = self.venue.quirks().amend_delay_ms;
        if amend_delay > 0 {
            tokio::time::sleep(Duration::from_millis(amend_delay)).await;
        }

        if supported {
            let mut up = order.clone();
            up.price = if order.price.is_zero() {
                Price::new(bid.inner() * self.config.amend_up_factor)
                    .floor_to_tick(instrument.tick_size)
            } else {
                order.price.offset_ticks(instrument.tick_size, AMEND_TICKS)
            };
            up.amount = order.amount + instrument.step_size * Decimal::TWO;
            self.send(line, ActionType::Amend, up).await;
            self.wait_want_on(rx, line, cid, ActionType::Amend, "_puau")
                .await?;
        }
        Ok(())
    }

    async fn send(&self, line: Line, action: ActionType, signal: Signal) {
        self.venue
            .dispatch(RouteFeature::for_line(action, &line), signal)
            .await;
    }

    async fn on_cycle_failure(&self, err: &MonitorError) {
        let venue_name = self.venue.name();
        let msg = format!("monitor failed {venue_name}: {err}");
        error!(venue = venue_name, error = %err, "probe cycle failed");
        Metrics::probe_failed(venue_name, err.reason());
        self.escalator.alert(AlertLevel::Serious, &msg);

        let retries = self.config.cleanup_retries.max(1);
        let mut orders_left = false;
        for attempt in 1..=retries {
            orders_left = self
                .venue
                .cancel_orders_if_present(Some(self.profile.pair.as_str()))
                .await;
            if !orders_left {
                break;
            }
            if attempt < retries {
                tokio::time::sleep(Duration::from_millis(self.config.cleanup_backoff_ms)).await;
            }
        }
        if orders_left {
            let msg = format!("failed to cancel orders {venue_name}");
            error!(venue = venue_name, "probe orders still resting after cleanup");
            self.escalator.alert(AlertLevel::Serious, &msg);
        }
    }

    /// Select the line with the lowest average latency for each action.
    async fn failover(&self) {
        let features = self.venue.features();
        let lines = self.lines();
        for action in ActionType::ALL {
            let fastest = lines
                .iter()
                .filter(|line| !self.is_line_disabled(line))
                .filter(|line| features.supports(RouteFeature::for_line(action, line)))
                .filter_map(|line| self.average_latency(*line, action).map(|avg| (*line, avg)))
                .min_by_key(|(_, avg)| *avg);
            let Some((line, avg)) = fastest else {
                continue;
            };
            match self
                .router
                .switch_line(action, SelectedLine::with_weight(line, avg))
                .await
            {
                Ok(true) => info!(%action, %line, avg_us = avg, "failover to fastest line"),
                Ok(false) => debug!(%action, %line, avg_us = avg, "fastest line already selected"),
                Err(e) => warn!(%action, %line, error = %e, "failover switch failed"),
            }
        }
    }

    // ========================================================================
    // Flush and run loop
    // ========================================================================

    /// Write every endpoint with samples to the sink and reset it. Returns
    /// the number of endpoints flushed.
    pub fn flush(&self) -> usize {
        let mut flushed = 0;
        for entry in self.entries.iter() {
            let endpoint = entry.value();
            let stats = endpoint.delay().stats();
            if stats.is_empty() {
                continue;
            }
            if let Some(sink) = &self.sink {
                sink.write(DELAY_MEASUREMENT, endpoint.tags(&self.profile), &stats.fields());
            }
            endpoint.delay().reset();
            flushed += 1;
        }
        if flushed > 0 {
            debug!(monitor_id = %self.monitor_id, flushed, "flushed endpoint stats");
        }
        flushed
    }

    /// One line per endpoint with its current stats.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = self.monitor_id.clone();
        for entry in self.entries.iter() {
            let _ = write!(
                out,
                "\nEndpoint: {}, delay:{}",
                entry.key(),
                entry.value().delay().stats()
            );
        }
        out
    }

    /// Trigger and flush on their own ticks until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let trigger_every = self.config.trigger_interval();
        let flush_every = self.config.flush_interval();
        let start = Instant::now();
        let mut trigger_tick = tokio::time::interval_at(start + trigger_every, trigger_every);
        let mut flush_tick = tokio::time::interval_at(
            start + Duration::from_millis(self.config.start_delay_ms) + flush_every,
            flush_every,
        );
        trigger_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        flush_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(monitor_id = %self.monitor_id, ?trigger_every, ?flush_every, "delay monitor running");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(monitor_id = %self.monitor_id, stats = %self.summary(), "delay monitor exiting");
                    break;
                }
                _ = trigger_tick.tick() => {
                    self.trigger().await;
                }
                _ = flush_tick.tick() => {
                    self.flush();
                }
            }
        }
    }
}

impl ProbeListener for DelayMonitor {
    fn on_probe_response(&self, response: ProbeResponse) -> bool {
        self.try_next(response)
    }
}

/// Smallest step-floored amount whose notional clears
/// `min_order_value * factor`, growing the target by `value_step` per try.
pub fn probe_size(
    price: Price,
    instrument: &InstrumentInfo,
    factor: Decimal,
    value_step: Decimal,
) -> Option<Size> {
    if !price.is_positive() {
        return None;
    }
    let threshold = instrument.min_order_value * factor;
    for tried in 0..MAX_SIZING_ATTEMPTS {
        let target = threshold + value_step * Decimal::from(tried);
        let mut size = Size::new(target / price.inner()).floor_to_step(instrument.step_size);
        if size < instrument.min_order_amount {
            size = instrument.min_order_amount;
        }
        if size.notional(price) > threshold {
            return Some(size);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use xlink_core::AmountUnit;

    fn instrument(step: Decimal, min_amount: Decimal, min_value: Decimal) -> InstrumentInfo {
        InstrumentInfo {
            symbol: "BTCUSDT".to_string(),
            tradable: true,
            tick_size: Price::new(dec!(0.1)),
            step_size: Size::new(step),
            multiplier: Decimal::ONE,
            min_order_amount: Size::new(min_amount),
            max_order_amount: Size::new(dec!(1000)),
            min_order_value: min_value,
            max_order_value: dec!(1000000),
            amount_unit: AmountUnit::Base,
        }
    }

    #[test]
    fn test_probe_size_clears_threshold() {
        let info = instrument(dec!(0.001), dec!(0.001), dec!(5));
        let price = Price::new(dec!(96));
        let size = probe_size(price, &info, dec!(1.1), dec!(50)).unwrap();
        // 5.5 / 96 floors to 0.057 (5.472), so the second try at 55.5 wins
        assert_eq!(size.inner(), dec!(0.578));
        assert!(size.notional(price) > dec!(5.5));
    }

    #[test]
    fn test_probe_size_respects_min_amount() {
        let info = instrument(dec!(1), dec!(10), dec!(5));
        let size = probe_size(Price::new(dec!(1)), &info, dec!(1.1), dec!(50)).unwrap();
        assert_eq!(size.inner(), dec!(10));
    }

    #[test]
    fn test_probe_size_zero_price() {
        let info = instrument(dec!(1), dec!(1), dec!(5));
        assert!(probe_size(Price::ZERO, &info, dec!(1.1), dec!(50)).is_none());
    }
}
