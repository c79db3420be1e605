//! Unwind configuration.
//!
//! Round counts and thresholds reflect observed venue behavior (balances and
//! positions settle late after a full close), so every one of them is
//! configurable rather than fixed.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// UnwindEngine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnwindConfig {
    /// Per-chunk notional cap used when the caller passes zero. Default: 500.
    #[serde(default = "default_max_value_per_chunk")]
    pub max_value_per_chunk: Decimal,
    /// Upper bound on clean rounds per unwind. Default: 10.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Consecutive clean rounds required before declaring success. Default: 2.
    #[serde(default = "default_clean_streak_required")]
    pub clean_streak_required: u32,
    /// Piece top-up attempts per symbol before it is treated as leaked. Default: 3.
    #[serde(default = "default_piece_retry_limit")]
    pub piece_retry_limit: u32,
    /// Pause after a round that left something open (ms). Default: 3,000.
    #[serde(default = "default_round_pause_ms")]
    pub round_pause_ms: u64,
    /// Pause before and after refreshing the ticker between chunks (ms). Default: 1,000.
    #[serde(default = "default_chunk_pause_ms")]
    pub chunk_pause_ms: u64,
    /// Pause after sending a piece top-up order (ms). Default: 1,000.
    #[serde(default = "default_piece_settle_ms")]
    pub piece_settle_ms: u64,
    /// Watchdog alert interval (secs). Default: 60.
    #[serde(default = "default_watchdog_interval_secs")]
    pub watchdog_interval_secs: u64,
    /// Share of visible book depth one chunk may take. Default: 0.8.
    #[serde(default = "default_depth_share")]
    pub depth_share: Decimal,
    /// Floor for the book-depth chunk value. Default: 50.
    #[serde(default = "default_min_depth_value")]
    pub min_depth_value: Decimal,
    /// Remaining notional below which one-click close is used. Default: 50.
    #[serde(default = "default_one_click_value")]
    pub one_click_value: Decimal,
    /// Margin over the venue minimum order value for spot sizing. Default: 1.1.
    #[serde(default = "default_min_value_margin")]
    pub min_value_margin: Decimal,
    /// Settle time before the first balance read (ms). Default: 2,000.
    #[serde(default = "default_verify_settle_ms")]
    pub verify_settle_ms: u64,
    /// Interval between verification polls (ms). Default: 2,000.
    #[serde(default = "default_verify_poll_ms")]
    pub verify_poll_ms: u64,
    /// Verification polls before giving up. Default: 5.
    #[serde(default = "default_verify_polls")]
    pub verify_polls: u32,
    /// Absolute balance difference treated as equal. Default: 1e-7.
    #[serde(default = "default_balance_epsilon")]
    pub balance_epsilon: Decimal,
    /// Relative balance difference treated as equal. Default: 0.002.
    #[serde(default = "default_balance_tolerance")]
    pub balance_tolerance: Decimal,
    /// Residual notional that raises a critical per-symbol alert. Default: 500.
    #[serde(default = "default_residual_alert_value")]
    pub residual_alert_value: Decimal,
    /// Trip the hard stop on a residual above `residual_alert_value`.
    #[serde(default)]
    pub halt_on_residual: bool,
    /// Trip the hard stop when balances never stabilize.
    #[serde(default)]
    pub halt_on_unstable_balance: bool,
}

fn default_max_value_per_chunk() -> Decimal {
    dec!(500)
}

fn default_max_rounds() -> u32 {
    10
}

fn default_clean_streak_required() -> u32 {
    2
}

fn default_piece_retry_limit() -> u32 {
    3
}

fn default_round_pause_ms() -> u64 {
    3_000
}

fn default_chunk_pause_ms() -> u64 {
    1_000
}

fn default_piece_settle_ms() -> u64 {
    1_000
}

fn default_watchdog_interval_secs() -> u64 {
    60
}

fn default_depth_share() -> Decimal {
    dec!(0.8)
}

fn default_min_depth_value() -> Decimal {
    dec!(50)
}

fn default_one_click_value() -> Decimal {
    dec!(50)
}

fn default_min_value_margin() -> Decimal {
    dec!(1.1)
}

fn default_verify_settle_ms() -> u64 {
    2_000
}

fn default_verify_poll_ms() -> u64 {
    2_000
}

fn default_verify_polls() -> u32 {
    5
}

fn default_balance_epsilon() -> Decimal {
    dec!(0.0000001)
}

fn default_balance_tolerance() -> Decimal {
    dec!(0.002)
}

fn default_residual_alert_value() -> Decimal {
    dec!(500)
}

impl Default for UnwindConfig {
    fn default() -> Self {
        Self {
            max_value_per_chunk: default_max_value_per_chunk(),
            max_rounds: default_max_rounds(),
            clean_streak_required: default_clean_streak_required(),
            piece_retry_limit: default_piece_retry_limit(),
            round_pause_ms: default_round_pause_ms(),
            chunk_pause_ms: default_chunk_pause_ms(),
            piece_settle_ms: default_piece_settle_ms(),
            watchdog_interval_secs: default_watchdog_interval_secs(),
            depth_share: default_depth_share(),
            min_depth_value: default_min_depth_value(),
            one_click_value: default_one_click_value(),
            min_value_margin: default_min_value_margin(),
            verify_settle_ms: default_verify_settle_ms(),
            verify_poll_ms: default_verify_poll_ms(),
            verify_polls: default_verify_polls(),
            balance_epsilon: default_balance_epsilon(),
            balance_tolerance: default_balance_tolerance(),
            residual_alert_value: default_residual_alert_value(),
            halt_on_residual: false,
            halt_on_unstable_balance: false,
        }
    }
}

impl UnwindConfig {
    #[must_use]
    pub fn round_pause(&self) -> Duration {
        Duration::from_millis(self.round_pause_ms)
    }

    #[must_use]
    pub fn chunk_pause(&self) -> Duration {
        Duration::from_millis(self.chunk_pause_ms)
    }

    #[must_use]
    pub fn piece_settle(&self) -> Duration {
        Duration::from_millis(self.piece_settle_ms)
    }

    #[must_use]
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs)
    }

    #[must_use]
    pub fn verify_settle(&self) -> Duration {
        Duration::from_millis(self.verify_settle_ms)
    }

    #[must_use]
    pub fn verify_poll(&self) -> Duration {
        Duration::from_millis(self.verify_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UnwindConfig::default();
        assert_eq!(config.max_rounds, 10);
        assert_eq!(config.clean_streak_required, 2);
        assert_eq!(config.piece_retry_limit, 3);
        assert_eq!(config.max_value_per_chunk, dec!(500));
        assert_eq!(config.round_pause(), Duration::from_secs(3));
        assert_eq!(config.verify_polls, 5);
        assert!(!config.halt_on_residual);
    }

    #[test]
    fn test_toml_overrides() {
        let config: UnwindConfig = toml::from_str(
            r#"
            max_rounds = 4
            piece_retry_limit = 1
            halt_on_residual = true
            "#,
        )
        .unwrap();
        assert_eq!(config.max_rounds, 4);
        assert_eq!(config.piece_retry_limit, 1);
        assert!(config.halt_on_residual);
        assert_eq!(config.clean_streak_required, 2);
        assert_eq!(config.depth_share, dec!(0.8));
    }
}
