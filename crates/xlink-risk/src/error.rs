//! Risk error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Hard stop active: {0}")]
    HardStopActive(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type RiskResult<T> = Result<T, RiskError>;
