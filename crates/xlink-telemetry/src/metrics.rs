//! Prometheus metrics for the xlink connector.
//!
//! Covers:
//! - Probe latency and probe failures per line
//! - Line switches and dispatch fallbacks
//! - Streaming login failures
//! - Unwind rounds and leaked positions
//! - Alerts raised, by level
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, register_int_gauge,
    register_int_gauge_vec, CounterVec, GaugeVec, HistogramVec, IntGauge, IntGaugeVec,
};

/// Probe round trip in microseconds.
/// Labels: venue, line, action
pub static PROBE_LATENCY_US: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "xlink_probe_latency_us",
        "Probe order round trip in microseconds",
        &["venue", "line", "action"],
        vec![
            100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0, 25_000.0, 50_000.0,
            100_000.0, 250_000.0
        ]
    )
    .unwrap()
});

/// Failed probe cycles.
/// Labels: venue, reason
pub static PROBE_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "xlink_probe_failures_total",
        "Probe cycles that ended in failure",
        &["venue", "reason"]
    )
    .unwrap()
});

/// Whether a probe cycle is in flight (1) or idle (0).
pub static MONITORING_IN_FLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "xlink_monitoring_in_flight",
        "Probe cycle in flight (1=probing)",
        &["venue"]
    )
    .unwrap()
});

/// Line switch attempts.
/// Labels: venue, action, outcome (changed/unchanged/rejected/failed)
pub static SWITCH_LINE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "xlink_switch_line_total",
        "Line switch attempts by outcome",
        &["venue", "action", "outcome"]
    )
    .unwrap()
});

/// Dispatches that fell back from colo to the normal path.
pub static DISPATCH_FALLBACK_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "xlink_dispatch_fallback_total",
        "Dispatches downgraded from colo to normal path",
        &["venue", "action"]
    )
    .unwrap()
});

/// Request-stream logins that did not complete.
pub static STREAM_LOGIN_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "xlink_stream_login_failures_total",
        "Request stream logins that did not complete in time",
        &["venue", "path"]
    )
    .unwrap()
});

/// Unwind rounds executed.
pub static UNWIND_ROUNDS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "xlink_unwind_rounds_total",
        "Unwind rounds executed",
        &["venue", "result"]
    )
    .unwrap()
});

/// Positions classified as leaked during unwind.
pub static UNWIND_LEAKED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "xlink_unwind_leaked_total",
        "Positions classified as leaked during unwind",
        &["venue", "symbol"]
    )
    .unwrap()
});

/// Alerts raised.
pub static ALERTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("xlink_alerts_total", "Alerts raised by level", &["level"]).unwrap()
});

/// Hard stop state (1 = tripped).
pub static HARD_STOP: Lazy<IntGauge> =
    Lazy::new(|| register_int_gauge!("xlink_hard_stop", "Hard stop tripped (1=tripped)").unwrap());

/// Flushed endpoint statistics.
/// Labels: measurement, ex, client, link, action, margin_mode, field
pub static ENDPOINT_STAT: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "xlink_endpoint_stat",
        "Flushed per-endpoint latency statistics in microseconds",
        &["measurement", "ex", "client", "link", "action", "margin_mode", "field"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record one matched probe response.
    pub fn probe_latency(venue: &str, line: &str, action: &str, micros: i64) {
        PROBE_LATENCY_US
            .with_label_values(&[venue, line, action])
            .observe(micros as f64);
    }

    /// Record a failed probe cycle.
    pub fn probe_failed(venue: &str, reason: &str) {
        PROBE_FAILURES_TOTAL
            .with_label_values(&[venue, reason])
            .inc();
    }

    /// Set whether a probe cycle is in flight.
    pub fn monitoring_in_flight(venue: &str, in_flight: bool) {
        MONITORING_IN_FLIGHT
            .with_label_values(&[venue])
            .set(i64::from(in_flight));
    }

    /// Record a line switch outcome.
    pub fn switch_line(venue: &str, action: &str, outcome: &str) {
        SWITCH_LINE_TOTAL
            .with_label_values(&[venue, action, outcome])
            .inc();
    }

    /// Record a colo-to-normal fallback.
    pub fn dispatch_fallback(venue: &str, action: &str) {
        DISPATCH_FALLBACK_TOTAL
            .with_label_values(&[venue, action])
            .inc();
    }

    /// Record a request-stream login failure.
    pub fn stream_login_failed(venue: &str, path: &str) {
        STREAM_LOGIN_FAILURES_TOTAL
            .with_label_values(&[venue, path])
            .inc();
    }

    /// Record one unwind round.
    pub fn unwind_round(venue: &str, left: bool) {
        let result = if left { "left" } else { "clean" };
        UNWIND_ROUNDS_TOTAL
            .with_label_values(&[venue, result])
            .inc();
    }

    /// Record a leaked position.
    pub fn unwind_leaked(venue: &str, symbol: &str) {
        UNWIND_LEAKED_TOTAL
            .with_label_values(&[venue, symbol])
            .inc();
    }

    /// Record an alert.
    pub fn alert_raised(level: &str) {
        ALERTS_TOTAL.with_label_values(&[level]).inc();
    }

    /// Set hard stop state.
    pub fn hard_stop(tripped: bool) {
        HARD_STOP.set(i64::from(tripped));
    }
}
