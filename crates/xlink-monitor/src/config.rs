//! Probe configuration and static venue tags.

use std::collections::BTreeMap;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use xlink_core::Line;

use crate::ring_buffer::DEFAULT_RING_CAPACITY;

/// Static description of the venue being probed, attached to every flushed
/// measurement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueProfile {
    /// Venue adapter name, e.g. `binance_usdt_swap`.
    pub name: String,
    /// Instrument used for probe orders.
    pub pair: String,
    #[serde(default)]
    pub ip: String,
    /// Region this process runs in.
    #[serde(default)]
    pub area: String,
    /// Region the venue's matching engine lives in.
    #[serde(default)]
    pub ex_area: String,
    #[serde(default)]
    pub zone: String,
}

impl VenueProfile {
    /// Process and venue share a region.
    #[must_use]
    pub fn cross_domain(&self) -> bool {
        !self.ex_area.is_empty() && self.ex_area == self.area
    }

    /// Tags shared by every endpoint of this venue.
    #[must_use]
    pub fn tags(&self) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::new();
        tags.insert("ip".to_string(), self.ip.clone());
        tags.insert("area".to_string(), self.area.clone());
        tags.insert("ex_area".to_string(), self.ex_area.clone());
        tags.insert("zone".to_string(), self.zone.clone());
        tags.insert("ex".to_string(), self.name.clone());
        tags.insert("pair".to_string(), self.pair.clone());
        tags.insert("cross_domain".to_string(), self.cross_domain().to_string());
        tags
    }
}

/// DelayMonitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Lines probed each cycle, in order. Default: all four.
    #[serde(default = "default_lines")]
    pub lines: Vec<Line>,
    /// Seconds between probe cycles. Default: 60.
    #[serde(default = "default_trigger_interval_secs")]
    pub trigger_interval_secs: u64,
    /// Seconds between stat flushes. Default: 60.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// Short intervals (5s trigger, 10s flush) for test environments.
    #[serde(default)]
    pub test_mode: bool,
    /// Delay before the first flush tick (ms). Default: 10,000.
    #[serde(default = "default_start_delay_ms")]
    pub start_delay_ms: u64,
    /// Samples kept per endpoint. Default: 64.
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,
    /// Probe responses buffered between the venue and the waiter. Default: 5.
    #[serde(default = "default_response_queue")]
    pub response_queue: usize,
    /// Timeout per awaited probe response (ms). Default: 5,000.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    /// Line switch attempts per line. Default: 3.
    #[serde(default = "default_switch_retries")]
    pub switch_retries: u32,
    /// Backoff between switch attempts (ms). Default: 5,000.
    #[serde(default = "default_switch_backoff_ms")]
    pub switch_backoff_ms: u64,
    /// Pause after each probed line (ms). Default: 2,000.
    #[serde(default = "default_line_settle_ms")]
    pub line_settle_ms: u64,
    /// Cancel-all attempts after a failed cycle. Default: 3.
    #[serde(default = "default_cleanup_retries")]
    pub cleanup_retries: u32,
    /// Pause between cancel-all attempts (ms). Default: 1,000.
    #[serde(default = "default_cleanup_backoff_ms")]
    pub cleanup_backoff_ms: u64,
    /// Probe price as a fraction of best bid. Default: 0.96.
    #[serde(default = "default_place_price_factor")]
    pub place_price_factor: Decimal,
    /// Probe notional as a multiple of the venue minimum. Default: 1.1.
    #[serde(default = "default_min_value_factor")]
    pub min_value_factor: Decimal,
    /// Notional added per sizing attempt. Default: 50.
    #[serde(default = "default_value_step")]
    pub value_step: Decimal,
    /// Fallback price-down amend as a fraction of bid. Default: 0.92.
    #[serde(default = "default_amend_down_factor")]
    pub amend_down_factor: Decimal,
    /// Fallback price-up amend as a fraction of bid. Default: 0.94.
    #[serde(default = "default_amend_up_factor")]
    pub amend_up_factor: Decimal,
    /// Select the fastest line per action after each successful cycle.
    #[serde(default = "default_true")]
    pub failover: bool,
    /// Trip the hard stop when a line cannot be switched to.
    #[serde(default)]
    pub exit_on_switch_failure: bool,
    /// Trip the hard stop when the venue cannot serve a line's margin mode.
    #[serde(default)]
    pub halt_on_unsupported_line: bool,
    /// Trip the hard stop when a cycle starts while another is in flight.
    #[serde(default)]
    pub halt_on_double_trigger: bool,
}

fn default_lines() -> Vec<Line> {
    Line::all().to_vec()
}

fn default_trigger_interval_secs() -> u64 {
    60
}

fn default_flush_interval_secs() -> u64 {
    60
}

fn default_start_delay_ms() -> u64 {
    10_000
}

fn default_ring_capacity() -> usize {
    DEFAULT_RING_CAPACITY
}

fn default_response_queue() -> usize {
    5
}

fn default_wait_timeout_ms() -> u64 {
    5_000
}

fn default_switch_retries() -> u32 {
    3
}

fn default_switch_backoff_ms() -> u64 {
    5_000
}

fn default_line_settle_ms() -> u64 {
    2_000
}

fn default_cleanup_retries() -> u32 {
    3
}

fn default_cleanup_backoff_ms() -> u64 {
    1_000
}

fn default_place_price_factor() -> Decimal {
    dec!(0.96)
}

fn default_min_value_factor() -> Decimal {
    dec!(1.1)
}

fn default_value_step() -> Decimal {
    dec!(50)
}

fn default_amend_down_factor() -> Decimal {
    dec!(0.92)
}

fn default_amend_up_factor() -> Decimal {
    dec!(0.94)
}

fn default_true() -> bool {
    true
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            lines: default_lines(),
            trigger_interval_secs: default_trigger_interval_secs(),
            flush_interval_secs: default_flush_interval_secs(),
            test_mode: false,
            start_delay_ms: default_start_delay_ms(),
            ring_capacity: default_ring_capacity(),
            response_queue: default_response_queue(),
            wait_timeout_ms: default_wait_timeout_ms(),
            switch_retries: default_switch_retries(),
            switch_backoff_ms: default_switch_backoff_ms(),
            line_settle_ms: default_line_settle_ms(),
            cleanup_retries: default_cleanup_retries(),
            cleanup_backoff_ms: default_cleanup_backoff_ms(),
            place_price_factor: default_place_price_factor(),
            min_value_factor: default_min_value_factor(),
            value_step: default_value_step(),
            amend_down_factor: default_amend_down_factor(),
            amend_up_factor: default_amend_up_factor(),
            failover: default_true(),
            exit_on_switch_failure: false,
            halt_on_unsupported_line: false,
            halt_on_double_trigger: false,
        }
    }
}

impl MonitorConfig {
    #[must_use]
    pub fn trigger_interval(&self) -> Duration {
        if self.test_mode {
            return Duration::from_secs(5);
        }
        Duration::from_secs(self.trigger_interval_secs)
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        if self.test_mode {
            return Duration::from_secs(10);
        }
        Duration::from_secs(self.flush_interval_secs)
    }

    #[must_use]
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.lines.len(), 4);
        assert_eq!(config.trigger_interval(), Duration::from_secs(60));
        assert_eq!(config.flush_interval(), Duration::from_secs(60));
        assert_eq!(config.response_queue, 5);
        assert_eq!(config.switch_retries, 3);
        assert!(config.failover);
        assert!(!config.exit_on_switch_failure);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: MonitorConfig = serde_json::from_str(
            r#"{"lines":[{"transport":"ws","path":"colo"}],"exit_on_switch_failure":true}"#,
        )
        .unwrap();
        assert_eq!(config.lines, vec![Line::STREAM_COLO]);
        assert_eq!(config.wait_timeout(), Duration::from_secs(5));
        assert_eq!(config.place_price_factor, dec!(0.96));
        assert!(config.exit_on_switch_failure);
    }

    #[test]
    fn test_test_mode_intervals() {
        let config = MonitorConfig {
            test_mode: true,
            ..MonitorConfig::default()
        };
        assert_eq!(config.trigger_interval(), Duration::from_secs(5));
        assert_eq!(config.flush_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_profile_cross_domain() {
        let mut profile = VenueProfile {
            area: "jp".to_string(),
            ex_area: "jp".to_string(),
            ..VenueProfile::default()
        };
        assert!(profile.cross_domain());
        assert_eq!(profile.tags()["cross_domain"], "true");

        profile.ex_area = "sg".to_string();
        assert!(!profile.cross_domain());
    }
}
