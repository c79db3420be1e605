//! Full unwind runs against the in-memory venue.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use xlink_core::{
    AmountUnit, BalanceSnapshot, InstrumentInfo, MockVenue, OrderSide, OrderType, PosSide,
    PositionSnapshot, Price, Size, Ticker, VenueCall, VenueKind,
};
use xlink_risk::{Escalator, HardStopLatch, HardStopReason};
use xlink_telemetry::{AlertLevel, RecordingAlerter};
use xlink_unwind::{UnwindConfig, UnwindEngine};

const PAIR: &str = "BTCUSDT";
const OTHER: &str = "ETHUSDT";

struct Harness {
    mock: Arc<MockVenue>,
    engine: UnwindEngine,
    alerter: Arc<RecordingAlerter>,
    latch: Arc<HardStopLatch>,
}

fn instrument(symbol: &str, min_amount: Decimal) -> InstrumentInfo {
    InstrumentInfo {
        symbol: symbol.to_string(),
        tradable: true,
        tick_size: Price::new(dec!(0.1)),
        step_size: Size::new(dec!(0.01)),
        multiplier: Decimal::ONE,
        min_order_amount: Size::new(min_amount),
        max_order_amount: Size::new(dec!(1000)),
        min_order_value: dec!(5),
        max_order_value: dec!(100000),
        amount_unit: AmountUnit::Base,
    }
}

fn harness(mock: MockVenue, config: UnwindConfig) -> Harness {
    for symbol in [PAIR, OTHER] {
        mock.set_instrument(instrument(symbol, dec!(0.1)));
        mock.set_ticker(Ticker::new(
            symbol,
            Price::new(dec!(100)),
            Size::new(dec!(50)),
            Price::new(dec!(100)),
            Size::new(dec!(50)),
        ));
    }
    mock.set_balances_script(vec![vec![BalanceSnapshot::new("USDT", dec!(1000), dec!(1000))]]);

    let mock = Arc::new(mock);
    let alerter = Arc::new(RecordingAlerter::new());
    let latch = Arc::new(HardStopLatch::new());
    let escalator = Escalator::new(latch.clone(), alerter.clone());
    let engine = UnwindEngine::new(mock.clone(), escalator, config);
    Harness {
        mock,
        engine,
        alerter,
        latch,
    }
}

fn swap() -> MockVenue {
    MockVenue::new("mock_usdt_swap", VenueKind::Swap)
}

fn long(symbol: &str, amount: Decimal) -> PositionSnapshot {
    PositionSnapshot::new(symbol, PosSide::Long, Size::new(amount), Price::new(dec!(100)))
}

#[tokio::test(start_paused = true)]
async fn test_run_ends_after_two_clean_rounds() {
    let h = harness(swap(), UnwindConfig::default());
    let pos = long(PAIR, dec!(1));
    h.mock
        .set_positions_script(vec![vec![pos.clone()], vec![pos], vec![]]);

    let report = h.engine.clean_pos_in_father(Decimal::ZERO, None).await;

    assert!(!report.is_left);
    assert_eq!(report.rounds, 4);
    assert_eq!(report.clean_streak, 2);
    assert_eq!(report.balance_stable, Some(true));
    assert!(report.leaked_symbols.is_empty());
    assert_eq!(report.watchdog_alerts, 0);
    assert_eq!(h.mock.position_reads(), 4);

    let closes = h.mock.close_orders();
    assert_eq!(closes.len(), 2);
    assert!(closes.iter().all(|c| c.side == OrderSide::Sell && c.amount == Size::new(dec!(1))));
    assert!(!h.alerter.contains("leak"));
    assert!(!h.latch.is_triggered());
}

#[tokio::test(start_paused = true)]
async fn test_single_clean_read_is_not_trusted() {
    let config = UnwindConfig {
        max_rounds: 3,
        ..UnwindConfig::default()
    };
    let h = harness(swap(), config);
    let pos = long(PAIR, dec!(1));
    h.mock
        .set_positions_script(vec![vec![pos.clone()], vec![pos], vec![]]);

    let report = h.engine.clean_pos_in_father(Decimal::ZERO, None).await;

    assert!(!report.is_left);
    assert_eq!(report.rounds, 3);
    assert_eq!(report.clean_streak, 1);
    assert_eq!(report.balance_stable, None);
    assert!(h.alerter.contains("possible unwind leak"));
}

#[tokio::test(start_paused = true)]
async fn test_chunk_cap_from_caller() {
    let h = harness(swap(), UnwindConfig::default());
    h.mock
        .set_positions_script(vec![vec![long(PAIR, dec!(5))], vec![]]);

    h.engine.clean_pos_in_father(dec!(200), None).await;

    let amounts: Vec<_> = h
        .mock
        .close_orders()
        .iter()
        .map(|c| c.amount.inner())
        .collect();
    assert_eq!(amounts, vec![dec!(2), dec!(2), dec!(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_spot_piece_is_topped_up_then_given_up() {
    let config = UnwindConfig {
        watchdog_interval_secs: 10,
        ..UnwindConfig::default()
    };
    let h = harness(MockVenue::new("mock_spot", VenueKind::Spot), config);
    // 0.05 @ 100 is under both the 0.1 minimum and the 5.5 minimum value
    h.mock.set_positions_script(vec![vec![long(PAIR, dec!(0.05))]]);

    let report = h.engine.clean_pos_in_father(Decimal::ZERO, None).await;

    assert!(report.is_left);
    assert_eq!(report.rounds, 10);
    assert_eq!(report.leaked_symbols, vec![PAIR.to_string()]);
    assert_eq!(report.balance_stable, None);
    assert_eq!(h.mock.position_reads(), 10);
    assert!(h.mock.close_orders().is_empty());

    let top_ups = h.mock.opened_orders();
    assert_eq!(top_ups.len(), 3);
    for signal in &top_ups {
        assert_eq!(signal.side, OrderSide::Buy);
        assert_eq!(signal.order_type, OrderType::Market);
        assert!(signal.client_id.as_str().contains("98"));
    }

    assert!(report.watchdog_alerts >= 1);
    assert!(h.alerter.contains("unwind not done after 10 sec"));
    assert!(h.alerter.contains("unwind leaked positions"));
}

#[tokio::test(start_paused = true)]
async fn test_only_unwinds_named_symbol() {
    let h = harness(swap(), UnwindConfig::default());
    let btc = long(PAIR, dec!(1));
    h.mock.set_positions_script(vec![
        vec![btc.clone(), long(OTHER, dec!(2))],
        vec![btc.clone()],
        vec![btc],
    ]);

    let report = h.engine.clean_pos_in_father(Decimal::ZERO, Some(OTHER)).await;

    assert!(!report.is_left);
    let closes = h.mock.close_orders();
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0].symbol, OTHER);
    assert!(h
        .mock
        .calls()
        .contains(&VenueCall::CancelOrdersIfPresent(Some(OTHER.to_string()))));
}

#[tokio::test(start_paused = true)]
async fn test_residual_position_alerts() {
    let h = harness(swap(), UnwindConfig::default());
    // rounds read flat, verification still sees 10 @ 100
    h.mock
        .set_positions_script(vec![vec![], vec![], vec![long(PAIR, dec!(10))]]);

    let report = h.engine.clean_pos_in_father(Decimal::ZERO, None).await;

    assert!(report.is_left);
    assert!(h.alerter.contains("never reached zero"));
    assert!(h.alerter.contains("residual position too large"));
    assert_eq!(h.alerter.count(AlertLevel::Critical), 1);
    assert!(!h.latch.is_triggered());
}

#[tokio::test(start_paused = true)]
async fn test_residual_position_halts_when_configured() {
    let config = UnwindConfig {
        halt_on_residual: true,
        ..UnwindConfig::default()
    };
    let h = harness(swap(), config);
    h.mock
        .set_positions_script(vec![vec![], vec![], vec![long(PAIR, dec!(10))]]);

    h.engine.clean_pos_in_father(Decimal::ZERO, None).await;

    assert!(h.latch.is_triggered());
    assert!(matches!(
        h.latch.reason(),
        Some(HardStopReason::ResidualPosition { ref symbol, .. }) if symbol == PAIR
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unstable_balance_reported() {
    let h = harness(swap(), UnwindConfig::default());
    h.mock.set_positions_script(vec![vec![]]);
    h.mock.set_balances_script(
        (0..8)
            .map(|i| {
                let amount = dec!(1000) + Decimal::from(i * 100);
                vec![BalanceSnapshot::new("USDT", amount, amount)]
            })
            .collect(),
    );

    let report = h.engine.clean_pos_in_father(Decimal::ZERO, None).await;

    assert!(!report.is_left);
    assert_eq!(report.balance_stable, Some(false));
    assert!(h.alerter.contains("balance never stabilized"));
    assert!(!h.latch.is_triggered());
}

#[tokio::test(start_paused = true)]
async fn test_runs_are_serialized() {
    let h = harness(swap(), UnwindConfig::default());
    h.mock.set_positions_script(vec![vec![long(PAIR, dec!(1))], vec![]]);
    let engine = Arc::new(h.engine);

    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.clean_pos_in_father(Decimal::ZERO, None).await }
    });
    tokio::task::yield_now().await;

    assert!(engine
        .try_clean_pos_in_father(Decimal::ZERO, None)
        .await
        .is_err());
    let report = first.await.unwrap();
    assert!(!report.is_left);
}
