//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("No venue adapter for {0}")]
    UnknownVenue(String),

    #[error("Router error: {0}")]
    Router(#[from] xlink_router::RouterError),

    #[error("Monitor error: {0}")]
    Monitor(#[from] xlink_monitor::MonitorError),

    #[error("Unwind error: {0}")]
    Unwind(#[from] xlink_unwind::UnwindError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] xlink_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
