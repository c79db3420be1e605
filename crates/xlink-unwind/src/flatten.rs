//! Close-order sizing for unwinds.
//!
//! Pure functions: classify a position, size the next reduce chunk, and
//! build the top-up order for a piece position. The engine owns every venue
//! call and sleep.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use xlink_core::{
    AmountUnit, ClientOrderId, InstrumentInfo, OrderSide, OrderType, PosSide, PositionSnapshot,
    Price, Signal, Size, Ticker, VenueQuirks,
};

use crate::config::UnwindConfig;

/// Upper bound on step increments when topping up a piece.
const MAX_TOP_UP_STEPS: u32 = 10_000;
const PIECE_BUY_MARKUP: Decimal = dec!(1.1);
const PIECE_SELL_MARKDOWN: Decimal = dec!(0.99);

// ============================================================================
// Classification
// ============================================================================

/// How a position on a piece-aware venue can be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionClass {
    /// Below the amount step; the venue cannot trade it at all.
    Dust,
    /// Below the minimum order amount or value; must be topped up first.
    Piece,
    /// Large enough for reduce orders.
    Closable,
}

/// Classify `amount` (magnitude) at `mid` against the venue's minimums.
pub fn classify(amount: Size, mid: Price, info: &InstrumentInfo, value_margin: Decimal) -> PositionClass {
    if amount < info.step_size {
        return PositionClass::Dust;
    }
    if amount < info.min_order_amount {
        return PositionClass::Piece;
    }
    if amount.notional(mid) < info.min_order_value * value_margin {
        return PositionClass::Piece;
    }
    PositionClass::Closable
}

fn multiplier(info: &InstrumentInfo) -> Decimal {
    if info.multiplier.is_zero() {
        Decimal::ONE
    } else {
        info.multiplier
    }
}

/// Quote-currency value of `amount` at `mid`.
pub fn position_value(amount: Size, info: &InstrumentInfo, mid: Price) -> Decimal {
    match info.amount_unit {
        AmountUnit::Base => amount.inner() * multiplier(info) * mid.inner(),
        AmountUnit::Quote => amount.inner() * multiplier(info),
    }
}

// ============================================================================
// Chunk sizing
// ============================================================================

/// Step and minimum amount after venue-specific corrections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustedLimits {
    pub step: Size,
    pub min_amount: Size,
}

impl AdjustedLimits {
    /// Strip a multiplier the venue already folded into its limits, and on
    /// spot raise the minimum until it clears the minimum order value.
    pub fn new(
        info: &InstrumentInfo,
        quirks: &VenueQuirks,
        is_spot: bool,
        mid: Price,
        value_margin: Decimal,
    ) -> Self {
        let multi = multiplier(info);
        let (step, mut min_amount) = if quirks.step_includes_multiplier {
            (info.step_size / multi, info.min_order_amount / multi)
        } else {
            (info.step_size, info.min_order_amount)
        };
        let min_value = info.min_order_value * value_margin;
        if is_spot && mid.is_positive() && min_amount.inner() * multi * mid.inner() < min_value {
            min_amount = Size::new(min_value / mid.inner()).floor_to_step(step);
        }
        Self { step, min_amount }
    }
}

/// One reduce order to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub side: OrderSide,
    pub amount: Size,
    /// Notional this chunk removes from the remaining value.
    pub value: Decimal,
}

/// Next action in the chunk loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStep {
    /// The book side used for sizing is empty.
    NoPrice,
    /// Nothing more can be sent this round.
    Done,
    /// Close the whole remainder with one call.
    OneClick,
    Place(ChunkPlan),
}

/// Sizes successive reduce chunks for one position.
#[derive(Debug, Clone)]
pub struct ChunkSizer<'a> {
    info: &'a InstrumentInfo,
    config: &'a UnwindConfig,
    limits: AdjustedLimits,
    cap: Decimal,
    is_spot: bool,
    one_click: bool,
}

impl<'a> ChunkSizer<'a> {
    pub fn new(
        info: &'a InstrumentInfo,
        config: &'a UnwindConfig,
        limits: AdjustedLimits,
        cap: Decimal,
        is_spot: bool,
        one_click: bool,
    ) -> Self {
        Self {
            info,
            config,
            limits,
            cap,
            is_spot,
            one_click,
        }
    }

    /// Value of the visible book on the side a close would hit, scaled by
    /// the configured share. Zero when that side is empty.
    pub fn depth_value(&self, side: PosSide, ticker: &Ticker) -> Decimal {
        let (price, qty) = match side {
            PosSide::Long => (ticker.ask_price, ticker.ask_qty),
            PosSide::Short => (ticker.bid_price, ticker.bid_qty),
        };
        let base = match self.info.amount_unit {
            AmountUnit::Base => qty.inner() * multiplier(self.info) * price.inner(),
            AmountUnit::Quote => qty.inner() * multiplier(self.info),
        };
        base * self.config.depth_share
    }

    /// Size the next chunk given what is left of the position.
    pub fn plan(
        &self,
        side: PosSide,
        ticker: &Ticker,
        left_value: Decimal,
        left_amount: Size,
    ) -> ChunkStep {
        let depth = self.depth_value(side, ticker);
        if depth.is_zero() {
            return ChunkStep::NoPrice;
        }
        let depth = depth.max(self.config.min_depth_value);

        let value = left_value
            .min(self.cap)
            .min(self.info.max_order_value)
            .min(depth);
        if value <= Decimal::ZERO {
            return ChunkStep::Done;
        }
        if self.is_spot && value < self.info.min_order_value * self.config.min_value_margin {
            return ChunkStep::Done;
        }

        let unit_price = match self.info.amount_unit {
            AmountUnit::Base => match side {
                PosSide::Long => ticker.ask_price.inner(),
                PosSide::Short => ticker.bid_price.inner(),
            },
            AmountUnit::Quote => Decimal::ONE,
        };
        if unit_price.is_zero() {
            return ChunkStep::NoPrice;
        }

        let mut order_side = side.close_side();
        let mut amount =
            Size::new(value / (unit_price * multiplier(self.info))).floor_to_step(self.limits.step);
        if amount < self.limits.min_amount {
            amount = self.limits.min_amount.min(left_amount);
            if self.is_spot {
                order_side = OrderSide::Sell;
            }
        }

        if self.one_click
            && (left_value <= self.config.one_click_value
                || left_amount <= self.limits.min_amount * Decimal::TWO)
        {
            return ChunkStep::OneClick;
        }

        if !amount.is_positive() || left_value <= self.cap {
            amount = left_amount;
        }
        if self.is_spot {
            // balances drift while pieces are topped up; take everything once close
            if amount > left_amount || amount.inner() > left_amount.inner() * dec!(0.9) {
                amount = left_amount.floor_to_step(self.info.step_size);
            }
            if amount < self.limits.min_amount {
                return ChunkStep::Done;
            }
        }

        ChunkStep::Place(ChunkPlan {
            side: order_side,
            amount,
            value,
        })
    }
}

// ============================================================================
// Piece top-up
// ============================================================================

/// Smallest step multiple at `mid` whose value clears `min_order_value * times`.
pub fn piece_top_up_amount(info: &InstrumentInfo, mid: Price, times: Decimal) -> Size {
    let threshold = info.min_order_value * times;
    if !mid.is_positive() {
        return info.min_order_amount;
    }
    let mut amount = Size::new(threshold / mid.inner()).floor_to_step(info.step_size);
    if amount < info.min_order_amount {
        amount = info.min_order_amount;
    }
    if info.step_size.is_zero() {
        return amount;
    }
    let mut steps = 0;
    while amount.notional(mid) < threshold && steps < MAX_TOP_UP_STEPS {
        amount = amount + info.step_size;
        steps += 1;
    }
    amount
}

/// Client id for piece top-up orders, with the venue's forced lead-in.
pub fn piece_client_id(venue: &str, quirks: &VenueQuirks) -> ClientOrderId {
    let lead_in = match &quirks.cid_lead_in {
        Some(lead_in) => lead_in.as_str(),
        None if venue.starts_with("gate") => "t-",
        None => "",
    };
    ClientOrderId::from(format!("{lead_in}98{}", Utc::now().timestamp_millis()))
}

/// Opening order that grows a piece past the venue minimum.
///
/// Spot buys enough to clear the minimum value, at market when the venue
/// supports market buys. Swaps add the minimum amount on the position side.
pub fn piece_order(
    position: &PositionSnapshot,
    ticker: &Ticker,
    info: &InstrumentInfo,
    is_spot: bool,
    market_buy: bool,
    value_times: Decimal,
    client_id: ClientOrderId,
) -> Signal {
    let signal = if is_spot {
        let amount = piece_top_up_amount(info, ticker.mid(), value_times);
        let price = ticker.ask_price * PIECE_BUY_MARKUP;
        Signal::limit(&position.symbol, client_id, OrderSide::Buy, price, amount)
    } else {
        let side = position.side.open_side();
        let price = match side {
            OrderSide::Buy => ticker.ask_price * PIECE_BUY_MARKUP,
            OrderSide::Sell => ticker.bid_price * PIECE_SELL_MARKDOWN,
        };
        Signal::limit(&position.symbol, client_id, side, price, info.min_order_amount)
    };

    if is_spot && market_buy {
        return Signal {
            price: Price::ZERO,
            order_type: OrderType::Market,
            ..signal
        }
        .pinned_to_rest();
    }
    signal.pinned_to_rest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use xlink_core::SignalChannel;

    fn info(step: Decimal, min_amount: Decimal, min_value: Decimal) -> InstrumentInfo {
        InstrumentInfo {
            symbol: "BTCUSDT".to_string(),
            tradable: true,
            tick_size: Price::new(dec!(0.1)),
            step_size: Size::new(step),
            multiplier: Decimal::ONE,
            min_order_amount: Size::new(min_amount),
            max_order_amount: Size::new(dec!(1000)),
            min_order_value: min_value,
            max_order_value: dec!(100000),
            amount_unit: AmountUnit::Base,
        }
    }

    fn ticker(bid: Decimal, bid_qty: Decimal, ask: Decimal, ask_qty: Decimal) -> Ticker {
        Ticker::new(
            "BTCUSDT",
            Price::new(bid),
            Size::new(bid_qty),
            Price::new(ask),
            Size::new(ask_qty),
        )
    }

    #[test]
    fn test_classify() {
        let info = info(dec!(0.01), dec!(0.1), dec!(5));
        let mid = Price::new(dec!(100));
        let margin = dec!(1.1);
        assert_eq!(classify(Size::new(dec!(0.005)), mid, &info, margin), PositionClass::Dust);
        assert_eq!(classify(Size::new(dec!(0.05)), mid, &info, margin), PositionClass::Piece);
        // 0.1 * 5 = 0.5 < 5.5
        let cheap = Price::new(dec!(5));
        assert_eq!(classify(Size::new(dec!(0.1)), cheap, &info, margin), PositionClass::Piece);
        assert_eq!(classify(Size::new(dec!(2)), mid, &info, margin), PositionClass::Closable);
    }

    #[test]
    fn test_adjusted_limits() {
        let mut info = info(dec!(10), dec!(10), dec!(5));
        info.multiplier = dec!(10);
        let quirks = VenueQuirks {
            step_includes_multiplier: true,
            ..VenueQuirks::default()
        };
        let limits = AdjustedLimits::new(&info, &quirks, false, Price::new(dec!(100)), dec!(1.1));
        assert_eq!(limits.step.inner(), dec!(1));
        assert_eq!(limits.min_amount.inner(), dec!(1));

        // spot minimum raised to clear 5.5 at price 100
        let spot = self::info(dec!(0.001), dec!(0.001), dec!(5));
        let limits = AdjustedLimits::new(
            &spot,
            &VenueQuirks::default(),
            true,
            Price::new(dec!(100)),
            dec!(1.1),
        );
        assert_eq!(limits.min_amount.inner(), dec!(0.055));
    }

    #[test]
    fn test_chunks_capped_by_value_and_depth() {
        let info = info(dec!(0.001), dec!(0.001), dec!(5));
        let config = UnwindConfig::default();
        let limits = AdjustedLimits::new(&info, &VenueQuirks::default(), false, Price::new(dec!(100)), dec!(1.1));
        let sizer = ChunkSizer::new(&info, &config, limits, dec!(500), false, false);

        // long 20 @ 100 = 2000; ask depth 100 * 100 * 0.8 = 8000
        let book = ticker(dec!(99), dec!(100), dec!(100), dec!(100));
        let step = sizer.plan(PosSide::Long, &book, dec!(2000), Size::new(dec!(20)));
        assert_eq!(
            step,
            ChunkStep::Place(ChunkPlan {
                side: OrderSide::Sell,
                amount: Size::new(dec!(5)),
                value: dec!(500),
            })
        );

        // thin book: 1 * 100 * 0.8 = 80
        let thin = ticker(dec!(99), dec!(1), dec!(100), dec!(1));
        match sizer.plan(PosSide::Long, &thin, dec!(2000), Size::new(dec!(20))) {
            ChunkStep::Place(plan) => {
                assert_eq!(plan.value, dec!(80));
                assert_eq!(plan.amount.inner(), dec!(0.8));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_remainder_below_cap_closes_everything() {
        let info = info(dec!(0.001), dec!(0.001), dec!(5));
        let config = UnwindConfig::default();
        let limits = AdjustedLimits::new(&info, &VenueQuirks::default(), false, Price::new(dec!(100)), dec!(1.1));
        let sizer = ChunkSizer::new(&info, &config, limits, dec!(500), false, false);
        let book = ticker(dec!(100), dec!(1000), dec!(101), dec!(1000));

        match sizer.plan(PosSide::Short, &book, dec!(300), Size::new(dec!(3))) {
            ChunkStep::Place(plan) => {
                assert_eq!(plan.side, OrderSide::Buy);
                assert_eq!(plan.amount.inner(), dec!(3));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_depth_floor_and_empty_book() {
        let info = info(dec!(0.001), dec!(0.001), dec!(5));
        let config = UnwindConfig::default();
        let limits = AdjustedLimits::new(&info, &VenueQuirks::default(), false, Price::new(dec!(100)), dec!(1.1));
        let sizer = ChunkSizer::new(&info, &config, limits, dec!(500), false, false);

        let empty = ticker(dec!(100), dec!(0), dec!(101), dec!(0));
        assert_eq!(
            sizer.plan(PosSide::Long, &empty, dec!(2000), Size::new(dec!(20))),
            ChunkStep::NoPrice
        );

        // 0.1 * 100 * 0.8 = 8, floored at 50
        let tiny = ticker(dec!(99), dec!(0.1), dec!(100), dec!(0.1));
        match sizer.plan(PosSide::Long, &tiny, dec!(2000), Size::new(dec!(20))) {
            ChunkStep::Place(plan) => assert_eq!(plan.value, dec!(50)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_one_click_for_small_remainder() {
        let info = info(dec!(0.001), dec!(0.001), dec!(5));
        let config = UnwindConfig::default();
        let limits = AdjustedLimits::new(&info, &VenueQuirks::default(), false, Price::new(dec!(100)), dec!(1.1));
        let sizer = ChunkSizer::new(&info, &config, limits, dec!(500), false, true);
        let book = ticker(dec!(100), dec!(1000), dec!(101), dec!(1000));

        assert_eq!(
            sizer.plan(PosSide::Long, &book, dec!(40), Size::new(dec!(0.4))),
            ChunkStep::OneClick
        );
        assert!(matches!(
            sizer.plan(PosSide::Long, &book, dec!(4000), Size::new(dec!(40))),
            ChunkStep::Place(_)
        ));
    }

    #[test]
    fn test_spot_takes_whole_remainder_near_end() {
        let info = info(dec!(0.01), dec!(0.01), dec!(5));
        let config = UnwindConfig::default();
        let limits = AdjustedLimits::new(&info, &VenueQuirks::default(), true, Price::new(dec!(100)), dec!(1.1));
        let sizer = ChunkSizer::new(&info, &config, limits, dec!(500), true, false);
        let book = ticker(dec!(100), dec!(1000), dec!(100), dec!(1000));

        match sizer.plan(PosSide::Long, &book, dec!(100.5), Size::new(dec!(1.005))) {
            ChunkStep::Place(plan) => assert_eq!(plan.amount.inner(), dec!(1)),
            other => panic!("unexpected {other:?}"),
        }
        // below the spot minimum value
        assert_eq!(
            sizer.plan(PosSide::Long, &book, dec!(4), Size::new(dec!(0.04))),
            ChunkStep::Done
        );
    }

    #[test]
    fn test_piece_top_up_amount() {
        let info = info(dec!(0.01), dec!(0.01), dec!(5));
        // 5.5 / 96 floors to 0.05 (4.8), then one step to 0.06 (5.76)
        let amount = piece_top_up_amount(&info, Price::new(dec!(96)), dec!(1.1));
        assert_eq!(amount.inner(), dec!(0.06));
    }

    #[test]
    fn test_piece_orders() {
        let info = info(dec!(0.01), dec!(0.05), dec!(5));
        let book = ticker(dec!(100), dec!(1), dec!(100), dec!(1));
        let long = PositionSnapshot::new("BTCUSDT", PosSide::Long, Size::new(dec!(0.02)), Price::new(dec!(90)));
        let short = PositionSnapshot::new("BTCUSDT", PosSide::Short, Size::new(dec!(0.02)), Price::new(dec!(90)));

        let spot = piece_order(&long, &book, &info, true, true, dec!(1.1), ClientOrderId::from("98"));
        assert_eq!(spot.side, OrderSide::Buy);
        assert_eq!(spot.order_type, OrderType::Market);
        assert!(spot.price.is_zero());
        assert_eq!(spot.amount.inner(), dec!(0.06));
        assert_eq!(spot.channel, SignalChannel::Rest);

        let swap_short = piece_order(&short, &book, &info, false, true, dec!(1.1), ClientOrderId::from("98"));
        assert_eq!(swap_short.side, OrderSide::Sell);
        assert_eq!(swap_short.order_type, OrderType::Limit);
        assert_eq!(swap_short.price.inner(), dec!(99.00));
        assert_eq!(swap_short.amount.inner(), dec!(0.05));
    }

    #[test]
    fn test_piece_client_id_lead_in() {
        let gate = piece_client_id("gate_spot", &VenueQuirks::default());
        assert!(gate.as_str().starts_with("t-98"));
        let plain = piece_client_id("binance_spot", &VenueQuirks::default());
        assert!(plain.as_str().starts_with("98"));
    }
}
