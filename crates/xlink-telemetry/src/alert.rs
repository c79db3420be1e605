//! Alert channel for escalations.
//!
//! Every escalation point in probing and unwinding goes through an
//! [`Alerter`]. Delivery (chat webhook, pager) is left to the implementor.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::metrics::Metrics;

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Serious,
    Critical,
}

impl AlertLevel {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Serious => "serious",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives alerts.
pub trait Alerter: Send + Sync {
    fn alert(&self, level: AlertLevel, message: &str);
}

/// Arc wrapper for alerter trait objects.
pub type DynAlerter = Arc<dyn Alerter>;

/// Writes alerts to the log and counts them.
#[derive(Debug, Clone, Default)]
pub struct LogAlerter {
    account: String,
}

impl LogAlerter {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }
}

impl Alerter for LogAlerter {
    fn alert(&self, level: AlertLevel, message: &str) {
        Metrics::alert_raised(level.as_str());
        match level {
            AlertLevel::Warning => warn!(account = %self.account, %level, "{message}"),
            AlertLevel::Serious | AlertLevel::Critical => {
                error!(account = %self.account, %level, "{message}")
            }
        }
    }
}

/// Keeps every alert in memory.
#[derive(Debug, Default)]
pub struct RecordingAlerter {
    alerts: Mutex<Vec<(AlertLevel, String)>>,
}

impl RecordingAlerter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<(AlertLevel, String)> {
        self.alerts.lock().clone()
    }

    /// Number of alerts at exactly `level`.
    pub fn count(&self, level: AlertLevel) -> usize {
        self.alerts.lock().iter().filter(|(l, _)| *l == level).count()
    }

    /// Whether any alert message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.alerts.lock().iter().any(|(_, m)| m.contains(needle))
    }
}

impl Alerter for RecordingAlerter {
    fn alert(&self, level: AlertLevel, message: &str) {
        Metrics::alert_raised(level.as_str());
        self.alerts.lock().push((level, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(AlertLevel::Critical > AlertLevel::Serious);
        assert!(AlertLevel::Serious > AlertLevel::Warning);
        assert_eq!(AlertLevel::Serious.to_string(), "serious");
    }

    #[test]
    fn test_recording_alerter() {
        let alerter = RecordingAlerter::new();
        alerter.alert(AlertLevel::Serious, "unwind leak on BTCUSDT");
        alerter.alert(AlertLevel::Warning, "done after 61 sec");

        assert_eq!(alerter.count(AlertLevel::Serious), 1);
        assert!(alerter.contains("leak"));
        assert!(!alerter.contains("critical"));
    }
}
