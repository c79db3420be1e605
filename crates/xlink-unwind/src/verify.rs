//! Post-unwind verification.
//!
//! Venues release balances and positions some time after a full close, so
//! both checks poll until two reads agree or the poll budget runs out.

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use xlink_core::{AccountSnapshot, BalanceSnapshot, DynVenue};
use xlink_risk::{Escalator, HardStopReason};
use xlink_telemetry::{AlertLevel, Metrics};

use crate::config::UnwindConfig;
use crate::context::UnwindContext;

fn within(a: Decimal, b: Decimal, epsilon: Decimal, tolerance: Decimal) -> bool {
    let diff = (a - b).abs();
    diff < epsilon || diff <= (a + b).abs() * tolerance
}

fn balance_agrees(
    b0: &BalanceSnapshot,
    b1: &BalanceSnapshot,
    ignore_avail: bool,
    epsilon: Decimal,
    tolerance: Decimal,
) -> bool {
    within(b0.amount, b1.amount, epsilon, tolerance)
        && (ignore_avail || within(b0.avail, b1.avail, epsilon, tolerance))
}

/// Every balance in `last` has a same-named balance in `cur` within
/// `epsilon` absolute or `tolerance` relative difference.
pub fn balances_agree(
    last: &[BalanceSnapshot],
    cur: &[BalanceSnapshot],
    ignore_avail: bool,
    epsilon: Decimal,
    tolerance: Decimal,
) -> bool {
    if last.len() != cur.len() {
        return false;
    }
    last.iter().all(|b0| {
        cur.iter()
            .filter(|b1| b1.name == b0.name)
            .any(|b1| balance_agrees(b0, b1, ignore_avail, epsilon, tolerance))
    })
}

/// Poll balances until two consecutive reads agree.
pub async fn check_balance_is_stable(
    venue: &DynVenue,
    config: &UnwindConfig,
    escalator: &Escalator,
    ignore_avail: bool,
) -> bool {
    tokio::time::sleep(config.verify_settle()).await;
    // no baseline until a read succeeds
    let mut last = match venue.account_snapshot().await {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(venue = venue.name(), error = %e, "failed to read account");
            None
        }
    };

    for _ in 0..config.verify_polls {
        tokio::time::sleep(config.verify_poll()).await;
        let cur = match venue.account_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(venue = venue.name(), error = %e, "failed to read account");
                continue;
            }
        };
        let Some(prev) = last.as_ref() else {
            last = Some(cur);
            continue;
        };
        if balances_agree(
            &prev.balances,
            &cur.balances,
            ignore_avail,
            config.balance_epsilon,
            config.balance_tolerance,
        ) {
            info!(venue = venue.name(), balances = ?cur.balances, "balances stable");
            return true;
        }
        last = Some(cur);
    }

    let balances = last.map(|snapshot| snapshot.balances).unwrap_or_default();
    let msg = format!("balance never stabilized. {}: {:?}", venue.name(), balances);
    error!(venue = venue.name(), ?balances, "balance never stabilized");
    if config.halt_on_unstable_balance {
        escalator.fatal(HardStopReason::BalanceUnstable, &msg);
    } else {
        escalator.alert(AlertLevel::Serious, &msg);
    }
    false
}

/// Poll until no in-scope position or resting order remains. Returns `true`
/// when something is still open after the last poll.
pub async fn check_positions_and_orders_closed(
    venue: &DynVenue,
    config: &UnwindConfig,
    escalator: &Escalator,
    ctx: &UnwindContext,
) -> bool {
    let mut last = AccountSnapshot::default();
    for _ in 0..config.verify_polls {
        tokio::time::sleep(config.verify_poll()).await;
        let cur = match venue.account_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(venue = venue.name(), error = %e, "failed to read account");
                continue;
            }
        };

        let mut all_closed = !cur
            .positions
            .iter()
            .filter(|p| ctx.covers(&p.symbol))
            .any(|p| !p.amount.is_zero() || !p.avail_amount.is_zero());
        if !all_closed {
            warn!(venue = venue.name(), positions = ?cur.positions, "positions not flat yet");
        }
        if venue.cancel_orders_if_present(ctx.only()).await {
            warn!(venue = venue.name(), "orders still resting");
            all_closed = false;
        }
        last = cur;
        if all_closed {
            info!(venue = venue.name(), "positions and orders closed");
            return false;
        }
    }

    escalator.alert(
        AlertLevel::Serious,
        &format!(
            "positions or orders never reached zero. {}: {:?}",
            venue.name(),
            last.positions
        ),
    );
    for position in last.positions.iter().filter(|p| ctx.covers(&p.symbol)) {
        let notional = position.notional();
        if notional < config.residual_alert_value {
            continue;
        }
        Metrics::unwind_leaked(venue.name(), &position.symbol);
        let msg = format!(
            "residual position too large. {} {}: {}@{} (${notional})",
            venue.name(),
            position.symbol,
            position.amount,
            position.avg_price
        );
        if config.halt_on_residual {
            escalator.fatal(
                HardStopReason::ResidualPosition {
                    symbol: position.symbol.clone(),
                    notional,
                },
                &msg,
            );
        } else {
            escalator.alert(AlertLevel::Critical, &msg);
        }
    }
    true
}
