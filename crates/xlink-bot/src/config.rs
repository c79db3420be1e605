//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use xlink_monitor::{MonitorConfig, VenueProfile};
use xlink_router::RouterConfig;
use xlink_telemetry::{DynMetricsSink, LogSink, PrometheusSink};
use xlink_unwind::UnwindConfig;

/// Environment variable prefix for overrides, e.g. `XLINK__UNWIND__MAX_ROUNDS`.
pub const ENV_PREFIX: &str = "XLINK";

/// Where flushed endpoint statistics go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Publish as Prometheus gauges.
    #[default]
    Prometheus,
    /// Write through tracing.
    Log,
    /// Drop them.
    None,
}

impl SinkKind {
    #[must_use]
    pub fn build(self) -> Option<DynMetricsSink> {
        match self {
            Self::Prometheus => Some(std::sync::Arc::new(PrometheusSink)),
            Self::Log => Some(std::sync::Arc::new(LogSink)),
            Self::None => None,
        }
    }
}

/// Logging and telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub sink: SinkKind,
    /// Account name attached to alerts.
    #[serde(default)]
    pub account: String,
}

fn default_log_filter() -> String {
    "info,xlink=debug".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            sink: SinkKind::default(),
            account: String::new(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Unwind all positions when the process stops.
    #[serde(default = "default_unwind_on_exit")]
    pub unwind_on_exit: bool,
    /// Venue this process connects to.
    pub venue: VenueProfile,
    #[serde(default = "MonitorConfig::default")]
    pub monitor: MonitorConfig,
    #[serde(default = "RouterConfig::default")]
    pub router: RouterConfig,
    #[serde(default = "UnwindConfig::default")]
    pub unwind: UnwindConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_unwind_on_exit() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file overlaid with `XLINK__`-prefixed environment
    /// variables.
    pub fn load(path: &str) -> AppResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no venue could run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.venue.name.is_empty() {
            return Err(AppError::Config("venue.name is empty".to_string()));
        }
        if self.venue.pair.is_empty() {
            return Err(AppError::Config("venue.pair is empty".to_string()));
        }
        if self.monitor.lines.is_empty() {
            return Err(AppError::Config("monitor.lines is empty".to_string()));
        }
        if self.unwind.max_rounds == 0 {
            return Err(AppError::Config("unwind.max_rounds must be positive".to_string()));
        }
        Ok(())
    }

    /// Default simulation setup.
    #[must_use]
    pub fn simulation() -> Self {
        Self {
            unwind_on_exit: true,
            venue: VenueProfile {
                name: "mock_usdt_swap".to_string(),
                pair: "BTCUSDT".to_string(),
                area: "jp".to_string(),
                ex_area: "jp".to_string(),
                ..VenueProfile::default()
            },
            monitor: MonitorConfig::default(),
            router: RouterConfig::default(),
            unwind: UnwindConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const MINIMAL: &str = r#"
        [venue]
        name = "binance_usdt_swap"
        pair = "BTCUSDT"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: AppConfig = toml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.monitor.lines.len(), 8);
        assert_eq!(config.unwind.max_rounds, 10);
        assert_eq!(config.log.filter, "info,xlink=debug");
        assert_eq!(config.log.sink, SinkKind::Prometheus);
        assert!(config.unwind_on_exit);
    }

    #[test]
    fn test_sections_override() {
        let text = format!(
            "{MINIMAL}
            [unwind]
            max_value_per_chunk = \"200\"
            halt_on_residual = true

            [log]
            sink = \"none\"
            "
        );
        let config: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(config.unwind.max_value_per_chunk, dec!(200));
        assert!(config.unwind.halt_on_residual);
        assert_eq!(config.unwind.clean_streak_required, 2);
        assert!(config.log.sink.build().is_none());
    }

    #[test]
    fn test_validate_rejects_missing_pair() {
        let mut config = AppConfig::simulation();
        config.venue.pair.clear();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::simulation();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[venue]"));
        assert!(toml_str.contains("[unwind]"));
    }

    #[test]
    fn test_load_reads_file() {
        let path = std::env::temp_dir().join(format!("xlink-config-{}.toml", std::process::id()));
        std::fs::write(&path, MINIMAL).unwrap();
        let config = AppConfig::load(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.venue.name, "binance_usdt_swap");
    }
}
