//! Unwind error types.

use thiserror::Error;

use xlink_core::VenueError;

#[derive(Debug, Error)]
pub enum UnwindError {
    #[error("Venue error: {0}")]
    Venue(#[from] VenueError),

    #[error("Unwind already in progress for {0}")]
    InProgress(String),
}

pub type UnwindResult<T> = Result<T, UnwindError>;
