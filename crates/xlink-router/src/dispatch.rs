//! Handle to a spawned dispatch task.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use xlink_core::{PathType, RouteFeature};

use crate::error::{RouterError, RouterResult};

/// What a dispatch task ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Signal handed to the venue over `feature`.
    Sent(RouteFeature),
    /// Request stream never authenticated; a failure event was emitted.
    LoginFailed(PathType),
    /// Empty batch; nothing was sent.
    Empty,
}

/// Fire-and-forget dispatch that the caller may still observe.
///
/// Dropping the handle detaches the task.
#[derive(Debug)]
pub struct DispatchHandle {
    inner: JoinHandle<DispatchOutcome>,
}

impl DispatchHandle {
    pub(crate) fn new(inner: JoinHandle<DispatchOutcome>) -> Self {
        Self { inner }
    }

    /// Wait for the dispatch to finish.
    pub async fn wait(self) -> RouterResult<DispatchOutcome> {
        self.inner.await.map_err(|_| RouterError::Aborted)
    }

    /// Wait at most `deadline`; the task is aborted if it is still running.
    pub async fn wait_with_deadline(self, deadline: Duration) -> RouterResult<DispatchOutcome> {
        let abort = self.inner.abort_handle();
        match tokio::time::timeout(deadline, self.inner).await {
            Ok(joined) => joined.map_err(|_| RouterError::Aborted),
            Err(_) => {
                warn!(?deadline, "dispatch deadline exceeded, aborting");
                abort.abort();
                Err(RouterError::DeadlineExceeded)
            }
        }
    }

    pub fn abort(&self) {
        self.inner.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xlink_core::{ActionType, Line};

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_slow_dispatch() {
        let handle = DispatchHandle::new(tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            DispatchOutcome::LoginFailed(PathType::Normal)
        }));

        let result = handle.wait_with_deadline(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(RouterError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_wait_returns_outcome() {
        let feature = RouteFeature::for_line(ActionType::Cancel, &Line::REST_NORMAL);
        let handle = DispatchHandle::new(tokio::spawn(async move { DispatchOutcome::Sent(feature) }));

        assert_eq!(handle.wait().await.unwrap(), DispatchOutcome::Sent(feature));
    }

    #[tokio::test]
    async fn test_abort() {
        let handle = DispatchHandle::new(tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            DispatchOutcome::LoginFailed(PathType::Colo)
        }));
        handle.abort();

        assert!(matches!(handle.wait().await, Err(RouterError::Aborted)));
    }
}
