//! Streaming-session login helper.
//!
//! Runs inside the dispatch task, never in the caller's task.

use std::time::Duration;

use tracing::{debug, warn};

use xlink_core::{DynVenue, PathType};
use xlink_telemetry::Metrics;

use crate::config::RouterConfig;
use crate::error::{RouterError, RouterResult};

/// Make sure the request stream on `path` is authenticated.
///
/// Creates the stream when it is not logged in, then polls the login flag up
/// to `login_retries` times at `login_poll_ms`.
pub async fn ensure_stream_logged_in(
    venue: &DynVenue,
    path: PathType,
    config: &RouterConfig,
) -> RouterResult<()> {
    if venue.stream_logged_in(path) {
        return Ok(());
    }

    debug!(venue = venue.name(), %path, "request stream not logged in, creating");
    if let Err(e) = venue.create_stream(path).await {
        warn!(venue = venue.name(), %path, error = %e, "failed to create request stream");
    }

    let poll = Duration::from_millis(config.login_poll_ms);
    for attempt in 1..=config.login_retries {
        if venue.stream_logged_in(path) {
            debug!(venue = venue.name(), %path, attempt, "request stream logged in");
            return Ok(());
        }
        tokio::time::sleep(poll).await;
    }
    if venue.stream_logged_in(path) {
        return Ok(());
    }

    Metrics::stream_login_failed(venue.name(), path.as_str());
    warn!(venue = venue.name(), %path, "request stream login timed out");
    Err(RouterError::LoginFailed(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use xlink_core::{MockVenue, VenueCall, VenueKind};

    #[tokio::test]
    async fn test_already_logged_in_skips_create() {
        let mock = Arc::new(MockVenue::new("mock_usdt_swap", VenueKind::Swap));
        mock.set_logged_in(PathType::Colo, true);
        let venue: DynVenue = mock.clone();

        ensure_stream_logged_in(&venue, PathType::Colo, &RouterConfig::default())
            .await
            .unwrap();
        assert!(mock.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_gives_up_after_polls() {
        let mock = Arc::new(MockVenue::new("mock_usdt_swap", VenueKind::Swap));
        let venue: DynVenue = mock.clone();

        let started = tokio::time::Instant::now();
        let result =
            ensure_stream_logged_in(&venue, PathType::Normal, &RouterConfig::default()).await;

        assert!(matches!(result, Err(RouterError::LoginFailed(PathType::Normal))));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert_eq!(mock.calls(), vec![VenueCall::CreateStream(PathType::Normal)]);
    }
}
