//! UnwindEngine: drive every position and resting order of an account to zero.
//!
//! A run repeats clean rounds until two consecutive rounds find nothing left
//! (a single empty read is not trusted, venues lag releasing positions), then
//! verifies balances and positions settled.
//!
//! Per round, for each position in scope:
//! 1. Cancel its resting orders
//! 2. Skip it if part of it is frozen
//! 3. Top up piece positions instead of closing them
//! 4. Close the rest in chunks capped by value, venue maximum and book depth

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use xlink_core::{
    has_abilities, Ability, AbilitySet, CloseOrder, DynVenue, InstrumentInfo, PendingOrder,
    PositionSnapshot, Size, Ticker, VenueError,
};
use xlink_risk::Escalator;
use xlink_telemetry::{AlertLevel, Metrics};

use crate::config::UnwindConfig;
use crate::context::UnwindContext;
use crate::error::{UnwindError, UnwindResult};
use crate::flatten::{
    classify, piece_client_id, piece_order, position_value, AdjustedLimits, ChunkSizer,
    ChunkStep, PositionClass,
};
use crate::verify::{check_balance_is_stable, check_positions_and_orders_closed};
use crate::watchdog::Watchdog;

// ============================================================================
// Run state and results
// ============================================================================

/// State carried across the rounds of one run.
#[derive(Debug, Default)]
pub struct RunState {
    piece_attempts: HashMap<String, u32>,
    leaked: BTreeSet<String>,
}

impl RunState {
    /// Piece top-ups sent for `symbol` so far.
    #[must_use]
    pub fn piece_attempts(&self, symbol: &str) -> u32 {
        self.piece_attempts.get(symbol).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn is_leaked(&self, symbol: &str) -> bool {
        self.leaked.contains(symbol)
    }

    fn reset(&mut self) {
        self.piece_attempts.clear();
        self.leaked.clear();
    }
}

/// Result of one clean round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Something in scope may still be open.
    pub is_left: bool,
    /// A serious alert was raised during the round.
    pub sent_serious: bool,
}

impl RoundOutcome {
    const LEFT: Self = Self {
        is_left: true,
        sent_serious: false,
    };
}

/// Summary of one `clean_pos_in_father` run.
#[derive(Debug, Clone)]
pub struct UnwindReport {
    pub run_id: Uuid,
    pub is_left: bool,
    pub rounds: u32,
    pub clean_streak: u32,
    /// Piece positions given up on after the retry limit.
    pub leaked_symbols: Vec<String>,
    /// `None` when verification did not run.
    pub balance_stable: Option<bool>,
    pub watchdog_alerts: u32,
    pub elapsed: Duration,
}

// ============================================================================
// UnwindEngine
// ============================================================================

/// Unwinds one account. Runs are serialized.
pub struct UnwindEngine {
    venue: DynVenue,
    escalator: Escalator,
    config: UnwindConfig,
    state: Mutex<RunState>,
}

impl UnwindEngine {
    pub fn new(venue: DynVenue, escalator: Escalator, config: UnwindConfig) -> Self {
        Self {
            venue,
            escalator,
            config,
            state: Mutex::new(RunState::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &UnwindConfig {
        &self.config
    }

    /// Unwind every position (or only `only`), closing at most
    /// `max_value_per_chunk` notional per order. Zero selects the configured
    /// default. Waits for any run already in progress.
    pub async fn clean_pos_in_father(
        &self,
        max_value_per_chunk: Decimal,
        only: Option<&str>,
    ) -> UnwindReport {
        let mut state = self.state.lock().await;
        self.run(&mut state, max_value_per_chunk, only).await
    }

    /// Like [`UnwindEngine::clean_pos_in_father`], but fails instead of
    /// waiting when a run is already in progress.
    pub async fn try_clean_pos_in_father(
        &self,
        max_value_per_chunk: Decimal,
        only: Option<&str>,
    ) -> UnwindResult<UnwindReport> {
        let mut state = self
            .state
            .try_lock()
            .map_err(|_| UnwindError::InProgress(self.venue.name().to_string()))?;
        Ok(self.run(&mut state, max_value_per_chunk, only).await)
    }

    async fn run(
        &self,
        state: &mut RunState,
        max_value_per_chunk: Decimal,
        only: Option<&str>,
    ) -> UnwindReport {
        state.reset();
        let cap = if max_value_per_chunk > Decimal::ZERO {
            max_value_per_chunk
        } else {
            self.config.max_value_per_chunk
        };
        let ctx = UnwindContext::new(self.venue.name(), only, cap);
        let venue_name = ctx.venue().to_string();
        info!(run_id = %ctx.run_id(), venue = %venue_name, only = ?only, %cap, "unwind started");

        let watchdog = Watchdog::spawn(
            self.escalator.clone(),
            venue_name.clone(),
            self.config.watchdog_interval(),
        );

        let required = self.config.clean_streak_required.max(1);
        let mut is_left = true;
        let mut sent_serious = false;
        let mut streak = 0;
        let mut rounds = 0;
        while rounds < self.config.max_rounds {
            rounds += 1;
            debug!(run_id = %ctx.run_id(), round = rounds, "unwind round");
            let pending = match self.venue.all_pending_orders().await {
                Ok(orders) => orders,
                Err(e) => {
                    error!(venue = %venue_name, error = %e, "failed to read pending orders");
                    Vec::new()
                }
            };
            for order in &pending {
                info!(symbol = %order.symbol, order_id = %order.order_id, side = %order.side, "pending order before round");
            }

            let outcome = self.do_clean_pos(&ctx, state, &pending).await;
            Metrics::unwind_round(&venue_name, outcome.is_left);
            is_left = outcome.is_left;
            sent_serious |= outcome.sent_serious;

            if outcome.is_left {
                streak = 0;
                tokio::time::sleep(self.config.round_pause()).await;
            } else {
                streak += 1;
                if streak >= required {
                    break;
                }
            }
        }
        let watchdog_alerts = watchdog.finish().await;

        let mut balance_stable = None;
        if is_left {
            self.escalator.alert(
                AlertLevel::Serious,
                &format!("unwind leaked positions. {venue_name}, clean streak: {streak}"),
            );
        } else if streak < required {
            self.escalator.alert(
                AlertLevel::Serious,
                &format!("possible unwind leak. {venue_name}, clean streak: {streak}"),
            );
        } else {
            if sent_serious {
                self.escalator.alert(
                    AlertLevel::Serious,
                    &format!("unwind finished without leak. {venue_name}"),
                );
            }
            let ignore_avail = self.venue.quirks().ignore_avail_on_balance_check;
            balance_stable = Some(
                check_balance_is_stable(&self.venue, &self.config, &self.escalator, ignore_avail)
                    .await,
            );
            if check_positions_and_orders_closed(&self.venue, &self.config, &self.escalator, &ctx)
                .await
            {
                is_left = true;
            }
        }

        let report = UnwindReport {
            run_id: ctx.run_id(),
            is_left,
            rounds,
            clean_streak: streak,
            leaked_symbols: state.leaked.iter().cloned().collect(),
            balance_stable,
            watchdog_alerts,
            elapsed: ctx.elapsed(),
        };
        info!(
            run_id = %report.run_id,
            venue = %venue_name,
            is_left = report.is_left,
            rounds = report.rounds,
            clean_streak = report.clean_streak,
            leaked = ?report.leaked_symbols,
            "unwind finished"
        );
        report
    }

    // ========================================================================
    // One round
    // ========================================================================

    /// Run one clean round over the current positions.
    pub async fn do_clean_pos(
        &self,
        ctx: &UnwindContext,
        state: &mut RunState,
        pending: &[PendingOrder],
    ) -> RoundOutcome {
        let venue_name = ctx.venue();
        let instruments = match self.venue.instruments().await {
            Ok(instruments) => instruments,
            Err(e) => {
                error!(venue = venue_name, error = %e, "failed to read instruments");
                return RoundOutcome::LEFT;
            }
        };
        let positions = match self.venue.positions().await {
            Ok(positions) => positions,
            Err(e) => {
                error!(venue = venue_name, error = %e, "failed to read positions");
                return RoundOutcome::LEFT;
            }
        };
        info!(venue = venue_name, positions = positions.len(), "unwind positions");

        // one bulk read keeps many spot pieces from stretching the round
        let tickers = match self.venue.all_tickers().await {
            Ok(tickers) => tickers,
            Err(VenueError::NotSupported) => HashMap::new(),
            Err(e) => {
                warn!(venue = venue_name, error = %e, "failed to read all tickers");
                HashMap::new()
            }
        };
        let is_spot = self.venue.kind().is_spot();
        let quirks = self.venue.quirks();
        let mut outcome = RoundOutcome::default();

        for position in &positions {
            let symbol = position.symbol.as_str();
            if !ctx.covers(symbol) {
                debug!(symbol, "outside unwind scope");
                continue;
            }
            let amount = position.amount.abs();
            let avail = position.avail_amount.abs();
            if amount.is_zero() && avail.is_zero() {
                continue;
            }

            if pending.iter().any(|o| o.symbol == symbol) {
                if let Err(e) = self.venue.cancel_pending_orders(symbol).await {
                    warn!(symbol, error = %e, "failed to cancel pending orders");
                }
            }

            if !quirks.skip_frozen_check && avail < amount {
                outcome.is_left = true;
                outcome.sent_serious = true;
                self.escalator.alert(
                    AlertLevel::Serious,
                    &format!("{venue_name} frozen position {symbol}: amount {amount}, avail {avail}"),
                );
                continue;
            }
            if amount.is_zero() {
                continue;
            }

            let Some(info) = instruments.get(symbol) else {
                error!(symbol, "no instrument info");
                // a delisted swap cannot hold a position
                if !is_spot {
                    outcome.is_left = true;
                }
                continue;
            };

            let ticker = match tickers.get(symbol) {
                Some(ticker) => ticker.clone(),
                None => match self.venue.ticker(symbol).await {
                    Ok(ticker) => ticker,
                    Err(VenueError::Delisted) => {
                        warn!(venue = venue_name, symbol, "instrument delisted");
                        return RoundOutcome {
                            is_left: false,
                            ..outcome
                        };
                    }
                    Err(e) => {
                        error!(venue = venue_name, symbol, error = %e, "failed to read ticker");
                        return RoundOutcome {
                            is_left: true,
                            ..outcome
                        };
                    }
                },
            };
            let mid = ticker.mid();
            if mid.is_zero() {
                warn!(symbol, "no mid price, position may stay open");
                outcome.is_left = true;
                continue;
            }
            let entry = position.avg_price;
            if !is_spot
                && entry.is_positive()
                && (mid.inner() > entry.inner() * Decimal::TWO
                    || entry.inner() > mid.inner() * Decimal::TWO)
            {
                error!(symbol, %mid, %entry, "mid price far from entry price, ticker may be wrong");
            }

            if is_spot || quirks.piece_on_swap {
                match classify(amount, mid, info, self.config.min_value_margin) {
                    PositionClass::Dust => {
                        warn!(symbol, %amount, step = %info.step_size, "position below amount step, ignoring");
                        continue;
                    }
                    PositionClass::Piece => {
                        outcome.is_left = true;
                        self.clean_piece(ctx, state, position, &ticker, info).await;
                        continue;
                    }
                    PositionClass::Closable => {}
                }
            }

            outcome.is_left = true;
            if let Err(e) = self
                .close_position(ctx, position, amount, info, ticker, &mut outcome)
                .await
            {
                error!(venue = venue_name, symbol, error = %e, "close interrupted");
                return outcome;
            }
        }
        outcome
    }

    /// Send a top-up order for a piece, or mark it leaked once the retry
    /// limit is spent. Pieces are never sent as reduce orders.
    async fn clean_piece(
        &self,
        ctx: &UnwindContext,
        state: &mut RunState,
        position: &PositionSnapshot,
        ticker: &Ticker,
        info: &InstrumentInfo,
    ) {
        let symbol = position.symbol.as_str();
        let attempts = state.piece_attempts.entry(symbol.to_string()).or_insert(0);
        if *attempts >= self.config.piece_retry_limit {
            if state.leaked.insert(symbol.to_string()) {
                warn!(venue = ctx.venue(), symbol, attempts = *attempts, "piece still open after retries, treating as leaked");
                Metrics::unwind_leaked(ctx.venue(), symbol);
            }
            return;
        }
        *attempts += 1;
        let attempt = *attempts;

        let is_spot = self.venue.kind().is_spot();
        let market_buy =
            has_abilities(&*self.venue, AbilitySet::of(&[Ability::OrderMarketBuy])).unwrap_or(false);
        let quirks = self.venue.quirks();
        let signal = piece_order(
            position,
            ticker,
            info,
            is_spot,
            market_buy,
            quirks.piece_value_times,
            piece_client_id(ctx.venue(), quirks),
        );
        warn!(
            symbol,
            attempt,
            mid = %ticker.mid(),
            side = %signal.side,
            amount = %signal.amount,
            order_type = %signal.order_type,
            "topping up piece position"
        );
        if let Err(e) = self.venue.open_order(signal).await {
            warn!(symbol, error = %e, "piece top-up rejected");
        }
        // fills can lag, so the position is re-read next round instead of closed now
        tokio::time::sleep(self.config.piece_settle()).await;
    }

    /// Close `position` in chunks. Errors only when the ticker refresh
    /// between chunks fails, which ends the round.
    async fn close_position(
        &self,
        ctx: &UnwindContext,
        position: &PositionSnapshot,
        amount: Size,
        info: &InstrumentInfo,
        mut ticker: Ticker,
        outcome: &mut RoundOutcome,
    ) -> UnwindResult<()> {
        let symbol = position.symbol.as_str();
        let is_spot = self.venue.kind().is_spot();
        let quirks = self.venue.quirks();
        let mid = ticker.mid();
        let limits = AdjustedLimits::new(info, quirks, is_spot, mid, self.config.min_value_margin);
        let sizer = ChunkSizer::new(
            info,
            &self.config,
            limits,
            ctx.max_value_per_chunk(),
            is_spot,
            quirks.one_click_close,
        );

        let mut left_value = position_value(amount, info, mid);
        let mut left_amount = amount;
        let mut chunks = 0u32;
        loop {
            match sizer.plan(position.side, &ticker, left_value, left_amount) {
                ChunkStep::NoPrice => {
                    outcome.sent_serious = true;
                    self.escalator.alert(
                        AlertLevel::Serious,
                        &format!("no price while closing {symbol} after {chunks} chunks. {}", ctx.venue()),
                    );
                    return Ok(());
                }
                ChunkStep::Done => return Ok(()),
                ChunkStep::OneClick => {
                    info!(symbol, %left_value, %left_amount, "one-click close");
                    // the next round's position read decides the outcome
                    if let Err(e) = self
                        .venue
                        .close_position_one_click(symbol, position.position_id.as_deref())
                        .await
                    {
                        warn!(symbol, error = %e, "one-click close failed");
                    }
                    return Ok(());
                }
                ChunkStep::Place(plan) => {
                    chunks += 1;
                    info!(
                        symbol,
                        chunk = chunks,
                        side = %plan.side,
                        amount = %plan.amount,
                        value = %plan.value,
                        %left_value,
                        %left_amount,
                        "close chunk"
                    );
                    let accepted = self
                        .venue
                        .place_close_order(CloseOrder {
                            symbol: symbol.to_string(),
                            side: plan.side,
                            amount: plan.amount,
                            pos_mode: position.pos_mode,
                            margin_mode: position.margin_mode,
                            ticker: ticker.clone(),
                        })
                        .await;
                    if !accepted {
                        warn!(symbol, chunk = chunks, "close order rejected");
                        return Ok(());
                    }
                    left_value -= plan.value;
                    left_amount = left_amount - plan.amount;
                    if left_value <= Decimal::ZERO || !left_amount.is_positive() {
                        return Ok(());
                    }
                }
            }

            tokio::time::sleep(self.config.chunk_pause()).await;
            ticker = self.venue.ticker(symbol).await?;
            tokio::time::sleep(self.config.chunk_pause()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use xlink_core::{
        AmountUnit, MockVenue, OrderSide, PosSide, Price, VenueCall, VenueKind, VenueQuirks,
    };
    use xlink_risk::HardStopLatch;
    use xlink_telemetry::RecordingAlerter;

    fn instrument(symbol: &str) -> InstrumentInfo {
        InstrumentInfo {
            symbol: symbol.to_string(),
            tradable: true,
            tick_size: Price::new(dec!(0.1)),
            step_size: Size::new(dec!(0.001)),
            multiplier: Decimal::ONE,
            min_order_amount: Size::new(dec!(0.001)),
            max_order_amount: Size::new(dec!(1000)),
            min_order_value: dec!(5),
            max_order_value: dec!(100000),
            amount_unit: AmountUnit::Base,
        }
    }

    fn engine(mock: MockVenue) -> (Arc<MockVenue>, UnwindEngine, Arc<RecordingAlerter>) {
        let mock = Arc::new(mock);
        for symbol in ["BTCUSDT", "ETHUSDT"] {
            mock.set_instrument(instrument(symbol));
            mock.set_ticker(Ticker::new(
                symbol,
                Price::new(dec!(100)),
                Size::new(dec!(100)),
                Price::new(dec!(100)),
                Size::new(dec!(100)),
            ));
        }
        let alerter = Arc::new(RecordingAlerter::new());
        let escalator = Escalator::new(Arc::new(HardStopLatch::new()), alerter.clone());
        let engine = UnwindEngine::new(mock.clone(), escalator, UnwindConfig::default());
        (mock, engine, alerter)
    }

    fn long(symbol: &str, amount: Decimal) -> PositionSnapshot {
        PositionSnapshot::new(symbol, PosSide::Long, Size::new(amount), Price::new(dec!(100)))
    }

    fn ctx(only: Option<&str>) -> UnwindContext {
        UnwindContext::new("mock_usdt_swap", only, dec!(500))
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_closes_in_chunks() {
        let (mock, engine, _) = engine(MockVenue::new("mock_usdt_swap", VenueKind::Swap));
        // 12 @ 100 = 1200 -> 500, 500, 200
        mock.set_positions_script(vec![vec![long("BTCUSDT", dec!(12))]]);

        let mut state = RunState::default();
        let outcome = engine.do_clean_pos(&ctx(None), &mut state, &[]).await;
        assert!(outcome.is_left);
        assert!(!outcome.sent_serious);

        let closes = mock.close_orders();
        let amounts: Vec<_> = closes.iter().map(|c| c.amount.inner()).collect();
        assert_eq!(amounts, vec![dec!(5), dec!(5), dec!(2)]);
        assert!(closes.iter().all(|c| c.side == OrderSide::Sell));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_scope_and_pending_cancel() {
        let (mock, engine, _) = engine(MockVenue::new("mock_usdt_swap", VenueKind::Swap));
        mock.set_positions_script(vec![vec![long("BTCUSDT", dec!(1)), long("ETHUSDT", dec!(1))]]);
        let pending = vec![PendingOrder {
            symbol: "ETHUSDT".to_string(),
            order_id: "7".to_string(),
            client_id: None,
            side: OrderSide::Buy,
            price: Price::new(dec!(90)),
            amount: Size::new(dec!(1)),
        }];

        let mut state = RunState::default();
        engine
            .do_clean_pos(&ctx(Some("ETHUSDT")), &mut state, &pending)
            .await;

        let calls = mock.calls();
        assert!(calls.contains(&VenueCall::CancelPendingOrders("ETHUSDT".to_string())));
        let closes = mock.close_orders();
        assert_eq!(closes.len(), 1);
        assert_eq!(closes[0].symbol, "ETHUSDT");
    }

    #[tokio::test(start_paused = true)]
    async fn test_frozen_position_is_skipped_and_escalated() {
        let (mock, engine, alerter) = engine(MockVenue::new("mock_usdt_swap", VenueKind::Swap));
        let frozen = long("BTCUSDT", dec!(2)).with_avail(Size::new(dec!(1)));
        mock.set_positions_script(vec![vec![frozen]]);

        let mut state = RunState::default();
        let outcome = engine.do_clean_pos(&ctx(None), &mut state, &[]).await;
        assert!(outcome.is_left);
        assert!(outcome.sent_serious);
        assert!(mock.close_orders().is_empty());
        assert!(alerter.contains("frozen position BTCUSDT"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_frozen_check_skipped_by_quirk() {
        let quirks = VenueQuirks {
            skip_frozen_check: true,
            ..VenueQuirks::default()
        };
        let (mock, engine, alerter) =
            engine(MockVenue::new("mock_usdt_swap", VenueKind::Swap).with_quirks(quirks));
        let frozen = long("BTCUSDT", dec!(2)).with_avail(Size::new(dec!(1)));
        mock.set_positions_script(vec![vec![frozen]]);

        let mut state = RunState::default();
        engine.do_clean_pos(&ctx(None), &mut state, &[]).await;
        assert_eq!(mock.close_orders().len(), 1);
        assert!(alerter.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_read_failures_leave_round_open() {
        let (mock, engine, _) = engine(MockVenue::new("mock_usdt_swap", VenueKind::Swap));
        mock.set_positions_error(Some(VenueError::Timeout));
        let mut state = RunState::default();
        assert_eq!(
            engine.do_clean_pos(&ctx(None), &mut state, &[]).await,
            RoundOutcome::LEFT
        );
    }

    #[tokio::test]
    async fn test_missing_ticker_and_delisting() {
        let (mock, engine, _) = engine(MockVenue::new("mock_usdt_swap", VenueKind::Swap));
        mock.set_bulk_tickers(false);
        mock.set_instrument(instrument("SOLUSDT"));
        mock.set_positions_script(vec![vec![long("SOLUSDT", dec!(1))]]);
        let mut state = RunState::default();
        // no ticker at all
        assert!(engine.do_clean_pos(&ctx(None), &mut state, &[]).await.is_left);

        mock.set_delisted("SOLUSDT");
        assert!(!engine.do_clean_pos(&ctx(None), &mut state, &[]).await.is_left);
        assert!(mock.close_orders().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_instrument_on_spot_is_not_left() {
        let (mock, engine, _) = engine(MockVenue::new("mock_spot", VenueKind::Spot));
        mock.set_positions_script(vec![vec![long("OLDUSDT", dec!(3))]]);
        let mut state = RunState::default();
        assert!(!engine.do_clean_pos(&ctx(None), &mut state, &[]).await.is_left);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_click_close_for_small_remainder() {
        let quirks = VenueQuirks {
            one_click_close: true,
            ..VenueQuirks::default()
        };
        let (mock, engine, _) =
            engine(MockVenue::new("mock_usdt_swap", VenueKind::Swap).with_quirks(quirks));
        mock.set_positions_script(vec![vec![long("BTCUSDT", dec!(0.3))]]);

        let mut state = RunState::default();
        engine.do_clean_pos(&ctx(None), &mut state, &[]).await;
        assert!(mock
            .calls()
            .contains(&VenueCall::OneClickClose("BTCUSDT".to_string())));
        assert!(mock.close_orders().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_close_stops_chunking() {
        let (mock, engine, _) = engine(MockVenue::new("mock_usdt_swap", VenueKind::Swap));
        mock.set_place_close_result(false);
        mock.set_positions_script(vec![vec![long("BTCUSDT", dec!(12))]]);

        let mut state = RunState::default();
        assert!(engine.do_clean_pos(&ctx(None), &mut state, &[]).await.is_left);
        assert_eq!(mock.close_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_run_rejected() {
        let (_, engine, _) = engine(MockVenue::new("mock_usdt_swap", VenueKind::Swap));
        let _held = engine.state.lock().await;
        let err = engine
            .try_clean_pos_in_father(Decimal::ZERO, None)
            .await
            .unwrap_err();
        assert!(matches!(err, UnwindError::InProgress(_)));
    }
}
