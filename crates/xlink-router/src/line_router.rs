//! Selected-line state and signal routing.
//!
//! Holds one [`SelectedLine`] per [`ActionType`]. Signals and signal batches
//! are routed through the selected line with a colo-to-normal fallback, and
//! every dispatch runs in its own task so a slow streaming login never
//! blocks the caller.

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use xlink_core::{
    ActionType, DynOrderCallback, DynVenue, OrderEvent, OrderEventKind, PathType, RouteFeature,
    SelectedLine, Signal, Transport,
};
use xlink_telemetry::Metrics;

use crate::config::RouterConfig;
use crate::dispatch::{DispatchHandle, DispatchOutcome};
use crate::error::{RouterError, RouterResult};
use crate::login::ensure_stream_logged_in;

/// Reason carried by the failure event when the request stream never logs in.
pub const LOGIN_FAILED_REASON: &str = "failed to login req ws";

#[derive(Debug, Clone, Copy, Default)]
struct SelectedLines {
    place: SelectedLine,
    amend: SelectedLine,
    cancel: SelectedLine,
}

impl SelectedLines {
    fn uniform(line: SelectedLine) -> Self {
        Self {
            place: line,
            amend: line,
            cancel: line,
        }
    }

    fn get(&self, action: ActionType) -> &SelectedLine {
        match action {
            ActionType::Place => &self.place,
            ActionType::Amend => &self.amend,
            ActionType::Cancel => &self.cancel,
        }
    }

    fn get_mut(&mut self, action: ActionType) -> &mut SelectedLine {
        match action {
            ActionType::Place => &mut self.place,
            ActionType::Amend => &mut self.amend,
            ActionType::Cancel => &mut self.cancel,
        }
    }
}

/// What one dispatch task hands to the venue.
enum Payload {
    Single(Signal),
    Batch(Vec<Signal>),
}

impl Payload {
    /// The signal that decides REST pinning and receives failure events.
    fn lead(&self) -> Option<&Signal> {
        match self {
            Self::Single(signal) => Some(signal),
            Self::Batch(signals) => signals.first(),
        }
    }
}

/// Routes live signals to one venue over the selected lines.
pub struct LineRouter {
    venue: DynVenue,
    callback: DynOrderCallback,
    config: RouterConfig,
    selected: RwLock<SelectedLines>,
}

impl LineRouter {
    /// Create a router. Every action starts on `config.initial_line`, or
    /// REST over the normal path when unset.
    pub fn new(
        venue: DynVenue,
        callback: DynOrderCallback,
        config: RouterConfig,
    ) -> RouterResult<Self> {
        let initial = match &config.initial_line {
            Some(s) => s.parse::<SelectedLine>()?,
            None => SelectedLine::default(),
        };
        Ok(Self {
            venue,
            callback,
            config,
            selected: RwLock::new(SelectedLines::uniform(initial)),
        })
    }

    #[must_use]
    pub fn venue(&self) -> &DynVenue {
        &self.venue
    }

    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Currently selected line for `action`.
    #[must_use]
    pub fn selected(&self, action: ActionType) -> SelectedLine {
        *self.selected.read().get(action)
    }

    // ========================================================================
    // Switching
    // ========================================================================

    /// Select `line` for `action`. Returns whether the stored line changed.
    ///
    /// The venue must implement the concrete route. On derivative venues a
    /// requested margin mode is applied first; if that fails the stored line
    /// is left untouched.
    pub async fn switch_line(&self, action: ActionType, line: SelectedLine) -> RouterResult<bool> {
        let venue_name = self.venue.name();
        let feature = RouteFeature::for_line(action, &line.line);
        if !self.venue.features().supports(feature) {
            Metrics::switch_line(venue_name, action.as_str(), "rejected");
            return Err(RouterError::FeatureUnsupported(format!("no feature {feature}")));
        }

        let margin_mode = line.line.margin_mode;
        if margin_mode.is_set() && !self.venue.kind().is_spot() {
            if let Err(e) = self.venue.set_margin_mode(margin_mode).await {
                Metrics::switch_line(venue_name, action.as_str(), "failed");
                error!(venue = venue_name, %action, %line, error = %e, "failed to set margin mode");
                return Err(RouterError::MarginMode(e));
            }
        }

        let (previous, changed) = {
            let mut selected = self.selected.write();
            let slot = selected.get_mut(action);
            let previous = *slot;
            (previous, slot.compare_and_store(&line))
        };

        if changed {
            Metrics::switch_line(venue_name, action.as_str(), "changed");
            info!(venue = venue_name, %action, from = %previous, to = %line, "line switched");
        } else {
            Metrics::switch_line(venue_name, action.as_str(), "unchanged");
            debug!(venue = venue_name, %action, %line, "line unchanged");
        }
        Ok(changed)
    }

    /// Select `line` for every action.
    pub async fn set_all(&self, line: SelectedLine) -> RouterResult<()> {
        for action in ActionType::ALL {
            self.switch_line(action, line).await?;
        }
        Ok(())
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    pub fn place_order_select(&self, signal: Signal) -> DispatchHandle {
        self.select(ActionType::Place, Payload::Single(signal))
    }

    pub fn amend_order_select(&self, signal: Signal) -> DispatchHandle {
        self.select(ActionType::Amend, Payload::Single(signal))
    }

    pub fn cancel_order_select(&self, signal: Signal) -> DispatchHandle {
        self.select(ActionType::Cancel, Payload::Single(signal))
    }

    /// Route a batch like a single signal. The first signal decides REST
    /// pinning and carries the failure event if the stream never logs in.
    pub fn place_batch_select(&self, signals: Vec<Signal>) -> DispatchHandle {
        self.select(ActionType::Place, Payload::Batch(signals))
    }

    pub fn amend_batch_select(&self, signals: Vec<Signal>) -> DispatchHandle {
        self.select(ActionType::Amend, Payload::Batch(signals))
    }

    pub fn cancel_batch_select(&self, signals: Vec<Signal>) -> DispatchHandle {
        self.select(ActionType::Cancel, Payload::Batch(signals))
    }

    /// Concrete route a signal for `action` would take right now.
    #[must_use]
    pub fn resolve(&self, action: ActionType, signal: &Signal) -> RouteFeature {
        let selected = self.selected(action).line;
        if signal.is_pinned_to_rest() {
            return RouteFeature::new(action, Transport::Rest, selected.path);
        }

        let feature = RouteFeature::for_line(action, &selected);
        if feature.path == PathType::Colo && !self.venue.features().supports(feature) {
            warn!(
                venue = self.venue.name(),
                %feature,
                "colo route not supported, falling back to normal path"
            );
            Metrics::dispatch_fallback(self.venue.name(), action.as_str());
            return feature.on_normal();
        }
        feature
    }

    fn select(&self, action: ActionType, payload: Payload) -> DispatchHandle {
        let Some(lead) = payload.lead() else {
            warn!(venue = self.venue.name(), %action, "empty batch, nothing sent");
            return DispatchHandle::new(tokio::spawn(async { DispatchOutcome::Empty }));
        };
        let feature = self.resolve(action, lead);
        let venue = self.venue.clone();
        let callback = self.callback.clone();
        let config = self.config.clone();

        DispatchHandle::new(tokio::spawn(async move {
            if feature.transport == Transport::Streaming {
                if let Err(e) = ensure_stream_logged_in(&venue, feature.path, &config).await {
                    if let Some(lead) = payload.lead() {
                        report_login_failure(&callback, action, lead, &e);
                    }
                    return DispatchOutcome::LoginFailed(feature.path);
                }
            }
            match payload {
                Payload::Single(signal) => venue.dispatch(feature, signal).await,
                Payload::Batch(signals) => venue.dispatch_batch(feature, signals).await,
            }
            DispatchOutcome::Sent(feature)
        }))
    }
}

fn report_login_failure(
    callback: &DynOrderCallback,
    action: ActionType,
    signal: &Signal,
    error: &RouterError,
) {
    let kind = match action {
        ActionType::Place => OrderEventKind::Error,
        ActionType::Amend => OrderEventKind::AmendFail,
        ActionType::Cancel => {
            error!(client_id = %signal.client_id, error = %error, "cancel not sent: {LOGIN_FAILED_REASON}");
            return;
        }
    };
    warn!(client_id = %signal.client_id, %action, error = %error, "{LOGIN_FAILED_REASON}");
    callback.on_order(OrderEvent::new(
        signal.client_id.clone(),
        kind,
        LOGIN_FAILED_REASON,
    ));
}
