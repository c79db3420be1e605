//! Scriptable in-memory venue for tests and simulation runs.
//!
//! Every call is recorded. Position and balance reads follow a script: each
//! read pops the next entry, and the last entry repeats forever.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};

use crate::ability::{AbilityProvider, AbilitySet};
use crate::account::{
    AccountSnapshot, BalanceSnapshot, InstrumentInfo, PendingOrder, PositionSnapshot, Ticker,
    VenueKind,
};
use crate::feature::{RouteFeature, RouteFeatures};
use crate::line::{ActionType, Line, MarginMode, PathType};
use crate::order::{OrderEvent, ProbeResponse, Signal};
use crate::venue::{
    BoxFuture, CloseOrder, OrderCallback, ProbeListener, VenueAdapter, VenueError, VenueQuirks,
    VenueResult,
};

/// Default simulated round trip per probe order.
pub const DEFAULT_MOCK_LATENCY_US: i64 = 1_000;

/// One recorded call on [`MockVenue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VenueCall {
    Dispatch { feature: RouteFeature, signal: Signal },
    DispatchBatch { feature: RouteFeature, signals: Vec<Signal> },
    CreateStream(PathType),
    SetMarginMode(MarginMode),
    CancelPendingOrders(String),
    CancelOrdersIfPresent(Option<String>),
    PlaceClose(CloseOrder),
    OpenOrder(Signal),
    OneClickClose(String),
}

/// Pops the front entry unless it is the last one.
#[derive(Debug, Default)]
struct Script<T: Clone> {
    steps: VecDeque<T>,
}

impl<T: Clone> Script<T> {
    fn set(&mut self, steps: Vec<T>) {
        self.steps = steps.into();
    }

    fn next(&mut self) -> Option<T> {
        if self.steps.len() > 1 {
            self.steps.pop_front()
        } else {
            self.steps.front().cloned()
        }
    }

    fn peek(&self) -> Option<T> {
        self.steps.front().cloned()
    }
}

#[derive(Debug, Default)]
struct MockState {
    positions: Script<Vec<PositionSnapshot>>,
    positions_error: Option<VenueError>,
    position_reads: usize,
    balances: Script<Vec<BalanceSnapshot>>,
    account_failures: u32,
    orders_present: Script<bool>,
    pending: Vec<PendingOrder>,
    tickers: HashMap<String, Ticker>,
    bulk_tickers: bool,
    instruments: HashMap<String, InstrumentInfo>,
    delisted: HashSet<String>,
    logged_in: HashSet<PathType>,
    login_on_create: bool,
    margin_mode_error: Option<VenueError>,
    place_close_result: bool,
    reject_amends: bool,
    drop_probe_responses: bool,
    latency_us: HashMap<Line, i64>,
    next_order_id: u64,
    calls: Vec<VenueCall>,
}

/// In-memory [`VenueAdapter`].
pub struct MockVenue {
    name: String,
    kind: VenueKind,
    include: AbilitySet,
    exclude: AbilitySet,
    features: RouteFeatures,
    quirks: VenueQuirks,
    state: Mutex<MockState>,
    probe_listener: RwLock<Option<Weak<dyn ProbeListener>>>,
}

impl std::fmt::Debug for MockVenue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockVenue")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

impl MockVenue {
    /// Create a mock supporting every route with the preset abilities for `kind`.
    pub fn new(name: impl Into<String>, kind: VenueKind) -> Self {
        let include = if kind.is_spot() {
            AbilitySet::DEFAULT_SPOT
        } else {
            AbilitySet::DEFAULT_SWAP
        };
        let state = MockState {
            place_close_result: true,
            bulk_tickers: true,
            ..MockState::default()
        };
        Self {
            name: name.into(),
            kind,
            include,
            exclude: AbilitySet::EMPTY,
            features: RouteFeatures::ALL,
            quirks: VenueQuirks::default(),
            state: Mutex::new(state),
            probe_listener: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn with_features(mut self, features: RouteFeatures) -> Self {
        self.features = features;
        self
    }

    #[must_use]
    pub fn with_abilities(mut self, include: AbilitySet, exclude: AbilitySet) -> Self {
        self.include = include;
        self.exclude = exclude;
        self
    }

    #[must_use]
    pub fn with_quirks(mut self, quirks: VenueQuirks) -> Self {
        self.quirks = quirks;
        self
    }

    // ------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------

    pub fn set_positions_script(&self, steps: Vec<Vec<PositionSnapshot>>) {
        self.state.lock().positions.set(steps);
    }

    pub fn set_positions_error(&self, error: Option<VenueError>) {
        self.state.lock().positions_error = error;
    }

    pub fn set_balances_script(&self, steps: Vec<Vec<BalanceSnapshot>>) {
        self.state.lock().balances.set(steps);
    }

    /// Fail the next `count` account reads with a timeout.
    pub fn set_account_failures(&self, count: u32) {
        self.state.lock().account_failures = count;
    }

    /// Results of successive `cancel_orders_if_present` calls.
    pub fn set_orders_present_script(&self, steps: Vec<bool>) {
        self.state.lock().orders_present.set(steps);
    }

    pub fn set_pending_orders(&self, orders: Vec<PendingOrder>) {
        self.state.lock().pending = orders;
    }

    pub fn set_ticker(&self, ticker: Ticker) {
        self.state.lock().tickers.insert(ticker.symbol.clone(), ticker);
    }

    /// Whether `all_tickers` is available.
    pub fn set_bulk_tickers(&self, enabled: bool) {
        self.state.lock().bulk_tickers = enabled;
    }

    pub fn set_instrument(&self, info: InstrumentInfo) {
        self.state.lock().instruments.insert(info.symbol.clone(), info);
    }

    pub fn set_delisted(&self, symbol: &str) {
        self.state.lock().delisted.insert(symbol.to_string());
    }

    pub fn set_logged_in(&self, path: PathType, logged_in: bool) {
        let mut state = self.state.lock();
        if logged_in {
            state.logged_in.insert(path);
        } else {
            state.logged_in.remove(&path);
        }
    }

    /// Whether `create_stream` authenticates the stream immediately.
    pub fn set_login_on_create(&self, enabled: bool) {
        self.state.lock().login_on_create = enabled;
    }

    pub fn set_margin_mode_error(&self, error: Option<VenueError>) {
        self.state.lock().margin_mode_error = error;
    }

    pub fn set_place_close_result(&self, accepted: bool) {
        self.state.lock().place_close_result = accepted;
    }

    pub fn set_reject_amends(&self, reject: bool) {
        self.state.lock().reject_amends = reject;
    }

    /// Swallow probe acknowledgements instead of forwarding them.
    pub fn set_drop_probe_responses(&self, drop: bool) {
        self.state.lock().drop_probe_responses = drop;
    }

    /// Simulated round trip reported for probe orders on `line`.
    pub fn set_latency(&self, line: Line, micros: i64) {
        self.state.lock().latency_us.insert(line, micros);
    }

    /// Forward probe acknowledgements to `listener`.
    pub fn set_probe_listener<L: ProbeListener + 'static>(&self, listener: &Arc<L>) {
        let listener: Arc<dyn ProbeListener> = listener.clone();
        *self.probe_listener.write() = Some(Arc::downgrade(&listener));
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn calls(&self) -> Vec<VenueCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn batches(&self) -> Vec<(RouteFeature, Vec<Signal>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                VenueCall::DispatchBatch { feature, signals } => Some((feature, signals)),
                _ => None,
            })
            .collect()
    }

    pub fn dispatched(&self) -> Vec<(RouteFeature, Signal)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                VenueCall::Dispatch { feature, signal } => Some((feature, signal)),
                _ => None,
            })
            .collect()
    }

    pub fn close_orders(&self) -> Vec<CloseOrder> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                VenueCall::PlaceClose(order) => Some(order),
                _ => None,
            })
            .collect()
    }

    pub fn opened_orders(&self) -> Vec<Signal> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                VenueCall::OpenOrder(signal) => Some(signal),
                _ => None,
            })
            .collect()
    }

    /// Number of `positions` reads served so far.
    pub fn position_reads(&self) -> usize {
        self.state.lock().position_reads
    }

    fn record(&self, call: VenueCall) {
        self.state.lock().calls.push(call);
    }

    fn acknowledge(&self, feature: RouteFeature, signal: &Signal) {
        let response = {
            let mut state = self.state.lock();
            if state.drop_probe_responses {
                return;
            }
            let order_id = match feature.action {
                ActionType::Place => {
                    state.next_order_id += 1;
                    Some(format!("mock-{}", state.next_order_id))
                }
                ActionType::Amend | ActionType::Cancel => signal.order_id.clone(),
            };
            ProbeResponse {
                transport: feature.transport,
                action: feature.action,
                client_id: signal.client_id.to_string(),
                order_id,
                amend_ok: feature.action == ActionType::Amend && !state.reject_amends,
                duration_us: state
                    .latency_us
                    .get(&feature.line())
                    .copied()
                    .unwrap_or(DEFAULT_MOCK_LATENCY_US),
            }
        };
        let listener = self.probe_listener.read().as_ref().and_then(Weak::upgrade);
        if let Some(listener) = listener {
            listener.on_probe_response(response);
        }
    }
}

impl AbilityProvider for MockVenue {
    fn include_abilities(&self) -> AbilitySet {
        self.include
    }

    fn exclude_abilities(&self) -> AbilitySet {
        self.exclude
    }
}

impl VenueAdapter for MockVenue {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> VenueKind {
        self.kind
    }

    fn features(&self) -> RouteFeatures {
        self.features
    }

    fn quirks(&self) -> &VenueQuirks {
        &self.quirks
    }

    fn dispatch(&self, feature: RouteFeature, signal: Signal) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.record(VenueCall::Dispatch {
                feature,
                signal: signal.clone(),
            });
            self.acknowledge(feature, &signal);
        })
    }

    fn dispatch_batch(&self, feature: RouteFeature, signals: Vec<Signal>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.record(VenueCall::DispatchBatch {
                feature,
                signals: signals.clone(),
            });
            for signal in &signals {
                self.acknowledge(feature, signal);
            }
        })
    }

    fn stream_logged_in(&self, path: PathType) -> bool {
        self.state.lock().logged_in.contains(&path)
    }

    fn create_stream(&self, path: PathType) -> BoxFuture<'_, VenueResult<()>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.calls.push(VenueCall::CreateStream(path));
            if state.login_on_create {
                state.logged_in.insert(path);
            }
            Ok(())
        })
    }

    fn set_margin_mode(&self, mode: MarginMode) -> BoxFuture<'_, VenueResult<()>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.calls.push(VenueCall::SetMarginMode(mode));
            match &state.margin_mode_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        })
    }

    fn account_snapshot(&self) -> BoxFuture<'_, VenueResult<AccountSnapshot>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            if state.account_failures > 0 {
                state.account_failures -= 1;
                return Err(VenueError::Timeout);
            }
            Ok(AccountSnapshot {
                balances: state.balances.next().unwrap_or_default(),
                positions: state.positions.peek().unwrap_or_default(),
            })
        })
    }

    fn positions(&self) -> BoxFuture<'_, VenueResult<Vec<PositionSnapshot>>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            if let Some(e) = &state.positions_error {
                return Err(e.clone());
            }
            state.position_reads += 1;
            Ok(state.positions.next().unwrap_or_default())
        })
    }

    fn all_pending_orders(&self) -> BoxFuture<'_, VenueResult<Vec<PendingOrder>>> {
        Box::pin(async move { Ok(self.state.lock().pending.clone()) })
    }

    fn pending_orders<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, VenueResult<Vec<PendingOrder>>> {
        Box::pin(async move {
            Ok(self
                .state
                .lock()
                .pending
                .iter()
                .filter(|o| o.symbol == symbol)
                .cloned()
                .collect())
        })
    }

    fn ticker<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, VenueResult<Ticker>> {
        Box::pin(async move {
            let state = self.state.lock();
            if state.delisted.contains(symbol) {
                return Err(VenueError::Delisted);
            }
            state
                .tickers
                .get(symbol)
                .cloned()
                .ok_or_else(|| VenueError::Rejected(format!("unknown symbol {symbol}")))
        })
    }

    fn all_tickers(&self) -> BoxFuture<'_, VenueResult<HashMap<String, Ticker>>> {
        Box::pin(async move {
            let state = self.state.lock();
            if !state.bulk_tickers {
                return Err(VenueError::NotSupported);
            }
            Ok(state
                .tickers
                .iter()
                .filter(|(symbol, _)| !state.delisted.contains(*symbol))
                .map(|(symbol, ticker)| (symbol.clone(), ticker.clone()))
                .collect())
        })
    }

    fn instruments(&self) -> BoxFuture<'_, VenueResult<HashMap<String, InstrumentInfo>>> {
        Box::pin(async move { Ok(self.state.lock().instruments.clone()) })
    }

    fn cancel_pending_orders<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, VenueResult<()>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.calls.push(VenueCall::CancelPendingOrders(symbol.to_string()));
            state.pending.retain(|o| o.symbol != symbol);
            Ok(())
        })
    }

    fn cancel_orders_if_present<'a>(&'a self, only: Option<&'a str>) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state
                .calls
                .push(VenueCall::CancelOrdersIfPresent(only.map(str::to_string)));
            state.orders_present.next().unwrap_or(false)
        })
    }

    fn place_close_order(&self, order: CloseOrder) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.calls.push(VenueCall::PlaceClose(order));
            state.place_close_result
        })
    }

    fn open_order(&self, signal: Signal) -> BoxFuture<'_, VenueResult<()>> {
        Box::pin(async move {
            self.record(VenueCall::OpenOrder(signal));
            Ok(())
        })
    }

    fn close_position_one_click<'a>(
        &'a self,
        symbol: &'a str,
        _position_id: Option<&'a str>,
    ) -> BoxFuture<'a, VenueResult<()>> {
        Box::pin(async move {
            if !self.quirks.one_click_close {
                return Err(VenueError::NotSupported);
            }
            self.record(VenueCall::OneClickClose(symbol.to_string()));
            Ok(())
        })
    }
}

// ============================================================================
// RecordingCallback
// ============================================================================

/// Order callback that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingCallback {
    events: Mutex<Vec<OrderEvent>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OrderEvent> {
        self.events.lock().clone()
    }
}

impl OrderCallback for RecordingCallback {
    fn on_order(&self, event: OrderEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::PosSide;
    use crate::decimal::{Price, Size};
    use crate::line::Transport;
    use crate::order::OrderSide;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn position(amount: rust_decimal::Decimal) -> PositionSnapshot {
        PositionSnapshot::new("BTCUSDT", PosSide::Long, Size::new(amount), Price::new(dec!(100)))
    }

    #[tokio::test]
    async fn test_position_script_sticks_on_last() {
        let venue = MockVenue::new("mock_usdt_swap", VenueKind::Swap);
        venue.set_positions_script(vec![vec![position(dec!(1))], vec![]]);

        assert_eq!(venue.positions().await.unwrap().len(), 1);
        assert!(venue.positions().await.unwrap().is_empty());
        assert!(venue.positions().await.unwrap().is_empty());
        assert_eq!(venue.position_reads(), 3);
    }

    #[derive(Default)]
    struct CountingListener {
        seen: AtomicUsize,
    }

    impl ProbeListener for CountingListener {
        fn on_probe_response(&self, response: ProbeResponse) -> bool {
            assert_eq!(response.transport, Transport::Streaming);
            assert!(response.order_id.is_some());
            self.seen.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[tokio::test]
    async fn test_dispatch_acknowledges_probe_listener() {
        let venue = MockVenue::new("mock_usdt_swap", VenueKind::Swap);
        let listener = Arc::new(CountingListener::default());
        venue.set_probe_listener(&listener);

        let signal = Signal::limit(
            "BTCUSDT",
            "M_a_01_1".into(),
            OrderSide::Buy,
            Price::new(dec!(96)),
            Size::new(dec!(1)),
        );
        let feature = RouteFeature::for_line(ActionType::Place, &Line::STREAM_NORMAL);
        venue.dispatch(feature, signal).await;

        assert_eq!(listener.seen.load(Ordering::SeqCst), 1);
        assert_eq!(venue.dispatched().len(), 1);
    }
}
