//! Dry runs against the in-memory venue.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use xlink_core::{
    ActionType, AmountUnit, BalanceSnapshot, InstrumentInfo, MockVenue, PosSide, PositionSnapshot,
    Price, SelectedLine, Size, Ticker, VenueKind,
};
use xlink_monitor::{CycleOutcome, VenueProfile};
use xlink_telemetry::{AlertLevel, RecordingAlerter, RecordingSink};
use xlink_unwind::UnwindReport;

use crate::config::AppConfig;
use crate::connector::Connector;
use crate::error::{AppError, AppResult};

/// Venue names served by the in-memory venue.
pub const SIMULATED_PREFIX: &str = "mock";

/// Build the adapter for `profile`. Only the in-memory venue is linked
/// into this binary.
pub fn build_venue(profile: &VenueProfile) -> AppResult<Arc<MockVenue>> {
    if !profile.name.starts_with(SIMULATED_PREFIX) {
        return Err(AppError::UnknownVenue(profile.name.clone()));
    }
    Ok(Arc::new(simulated_venue(profile)))
}

/// In-memory venue with one market, one open long and a flat balance.
#[must_use]
pub fn simulated_venue(profile: &VenueProfile) -> MockVenue {
    let kind = if profile.name.contains("spot") {
        VenueKind::Spot
    } else {
        VenueKind::Swap
    };
    let pair = profile.pair.as_str();
    let mock = MockVenue::new(profile.name.clone(), kind);
    mock.set_ticker(Ticker::new(
        pair,
        Price::new(dec!(100)),
        Size::new(dec!(10)),
        Price::new(dec!(100.1)),
        Size::new(dec!(10)),
    ));
    mock.set_instrument(InstrumentInfo {
        symbol: pair.to_string(),
        tradable: true,
        tick_size: Price::new(dec!(0.1)),
        step_size: Size::new(dec!(0.01)),
        multiplier: Decimal::ONE,
        min_order_amount: Size::new(dec!(0.01)),
        max_order_amount: Size::new(dec!(100)),
        min_order_value: dec!(5),
        max_order_value: dec!(100000),
        amount_unit: AmountUnit::Base,
    });
    mock.set_positions_script(vec![
        vec![PositionSnapshot::new(
            pair,
            PosSide::Long,
            Size::new(dec!(3)),
            Price::new(dec!(100)),
        )],
        vec![],
    ]);
    mock.set_balances_script(vec![vec![BalanceSnapshot::new("USDT", dec!(10000), dec!(10000))]]);
    mock.set_login_on_create(true);
    mock
}

/// What one simulation did.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub cycle: CycleOutcome,
    /// Endpoints written to the sink after the cycle.
    pub flushed: usize,
    pub selected: Vec<(ActionType, SelectedLine)>,
    pub close_orders: usize,
    pub report: UnwindReport,
    pub alerts: Vec<(AlertLevel, String)>,
    pub endpoint_stats: String,
}

impl fmt::Display for SimulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "probe cycle: {:?}, endpoints flushed: {}", self.cycle, self.flushed)?;
        for (action, line) in &self.selected {
            writeln!(f, "  {action}: {line}")?;
        }
        writeln!(
            f,
            "unwind {}: left={}, rounds={}, clean streak={}, close orders={}, leaked={:?}, balance stable={:?}",
            self.report.run_id,
            self.report.is_left,
            self.report.rounds,
            self.report.clean_streak,
            self.close_orders,
            self.report.leaked_symbols,
            self.report.balance_stable,
        )?;
        for (level, message) in &self.alerts {
            writeln!(f, "  alert [{level}] {message}")?;
        }
        write!(f, "{}", self.endpoint_stats)
    }
}

/// Run one probe cycle and one unwind against the in-memory venue.
pub async fn run_simulation(config: &AppConfig) -> AppResult<SimulationSummary> {
    let mock = build_venue(&config.venue)?;
    let alerter = Arc::new(RecordingAlerter::new());
    let sink = Arc::new(RecordingSink::new());
    let connector = Connector::new(mock.clone(), config, alerter.clone(), Some(sink.clone()))?;
    mock.set_probe_listener(connector.monitor());

    info!(venue = %config.venue.name, "simulated probe cycle");
    let cycle = connector.monitor().trigger().await;
    let endpoint_stats = connector.monitor().summary();
    let flushed = connector.monitor().flush();
    let selected = ActionType::ALL
        .iter()
        .map(|&action| (action, connector.router().selected(action)))
        .collect();

    info!(venue = %config.venue.name, "simulated unwind");
    let report = connector.unwind(None).await;

    Ok(SimulationSummary {
        cycle,
        flushed,
        selected,
        close_orders: mock.close_orders().len(),
        report,
        alerts: alerter.alerts(),
        endpoint_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use xlink_core::VenueAdapter;

    #[test]
    fn test_build_venue_rejects_real_names() {
        let profile = VenueProfile {
            name: "binance_usdt_swap".to_string(),
            pair: "BTCUSDT".to_string(),
            ..VenueProfile::default()
        };
        assert!(matches!(build_venue(&profile), Err(AppError::UnknownVenue(_))));
    }

    #[test]
    fn test_simulated_spot_venue() {
        let profile = VenueProfile {
            name: "mock_spot".to_string(),
            pair: "ETHUSDT".to_string(),
            ..VenueProfile::default()
        };
        assert_eq!(simulated_venue(&profile).kind(), VenueKind::Spot);
    }
}
