//! Router error types.

use thiserror::Error;

use xlink_core::{CoreError, PathType, VenueError};

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Feature not supported: {0}")]
    FeatureUnsupported(String),

    #[error("Failed to set margin mode: {0}")]
    MarginMode(#[source] VenueError),

    #[error("Invalid line: {0}")]
    InvalidLine(#[from] CoreError),

    #[error("Request stream on {0} path not logged in")]
    LoginFailed(PathType),

    #[error("Dispatch did not finish before the deadline")]
    DeadlineExceeded,

    #[error("Dispatch task aborted")]
    Aborted,
}

impl RouterError {
    /// The venue cannot serve the line's margin mode. A missing route
    /// feature is not included; it is retried like any other failure.
    #[must_use]
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::MarginMode(VenueError::NotSupported))
    }
}

pub type RouterResult<T> = Result<T, RouterError>;
