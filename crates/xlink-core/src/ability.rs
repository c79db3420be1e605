//! Venue capability bitmask.
//!
//! Each venue declares an `include` set (capabilities it supports) and an
//! `exclude` set (capabilities it explicitly lacks). Exclusion always wins.
//!
//! Some abilities are category roots: excluding the root excludes every
//! nested leaf, even when the leaf bit is present in `include`. The nesting
//! lives in [`COLLAPSE_TABLE`] and must be updated by hand whenever a new
//! leaf is added under an existing category.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

// ============================================================================
// Ability
// ============================================================================

/// One named capability bit. The discriminant is the bit index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Ability {
    RsPub = 0,
    /// Rest ticker carries the venue sequence number.
    RsPubGetTickerWithSeq,
    RsPri,
    RsPriSetLeverage,
    /// Rest order lookup. Some venues lack it entirely.
    RsPriCheckOrder,
    RsPriCheckOrderByCid,
    RsPriGetPos,
    RsPriGetPosWithSeq,
    RsPriGetEquityWithSeq,
    RsPriOrderFilledPrice,
    RsPriGetAllIndex,
    RsPriGetAllFundingRate,
    WsPub,
    WsPubTrade,
    WsPubPartial,
    WsPubTicker100PCorrect,
    WsPubTickerWithSeq,
    /// Category root for every private streaming capability.
    WsPri,
    /// Orders can be sent over the private stream.
    WsPriReqOrder,
    WsPriPosition,
    WsPriPositionWithSeq,
    WsPriPositionHasSeqSameAsTicker,
    /// Category root for streamed equity.
    WsPriEquity,
    WsPriEquityAvailReducedWhenHold,
    WsPriEquityWithUpnl,
    WsPriEquityWithSeq,
    WsPriEquityWithFree,
    WsPriOrder,
    WsPriOrderFilledPriceCorrect,
    WsPriOrderFee,
    WsPriOrderTypeExact,
    WsPriPosFasterOrder,
    WsPriOrderEventHasSeqSameAsTicker,
    EquityAvailReducedWhenPendingOrder,
    EquityAvailReducedWhenHold,
    OrderAmend,
    OrderAmendByCid,
    /// Order records carry the client order id.
    OrderCid,
    OrderCancelByCid,
    OrderExceedLimitBuy,
    OrderExceedLimitSell,
    OrderMarketBuy,
    OrderMarketSell,
    OrderIoc,
    PositionModeHedge,
    PositionModeOneWay,
    MarginModeCrossed,
    MarginModeIsolated,
}

impl Ability {
    /// Every ability, in bit order.
    pub const VARIANTS: [Ability; 48] = [
        Ability::RsPub,
        Ability::RsPubGetTickerWithSeq,
        Ability::RsPri,
        Ability::RsPriSetLeverage,
        Ability::RsPriCheckOrder,
        Ability::RsPriCheckOrderByCid,
        Ability::RsPriGetPos,
        Ability::RsPriGetPosWithSeq,
        Ability::RsPriGetEquityWithSeq,
        Ability::RsPriOrderFilledPrice,
        Ability::RsPriGetAllIndex,
        Ability::RsPriGetAllFundingRate,
        Ability::WsPub,
        Ability::WsPubTrade,
        Ability::WsPubPartial,
        Ability::WsPubTicker100PCorrect,
        Ability::WsPubTickerWithSeq,
        Ability::WsPri,
        Ability::WsPriReqOrder,
        Ability::WsPriPosition,
        Ability::WsPriPositionWithSeq,
        Ability::WsPriPositionHasSeqSameAsTicker,
        Ability::WsPriEquity,
        Ability::WsPriEquityAvailReducedWhenHold,
        Ability::WsPriEquityWithUpnl,
        Ability::WsPriEquityWithSeq,
        Ability::WsPriEquityWithFree,
        Ability::WsPriOrder,
        Ability::WsPriOrderFilledPriceCorrect,
        Ability::WsPriOrderFee,
        Ability::WsPriOrderTypeExact,
        Ability::WsPriPosFasterOrder,
        Ability::WsPriOrderEventHasSeqSameAsTicker,
        Ability::EquityAvailReducedWhenPendingOrder,
        Ability::EquityAvailReducedWhenHold,
        Ability::OrderAmend,
        Ability::OrderAmendByCid,
        Ability::OrderCid,
        Ability::OrderCancelByCid,
        Ability::OrderExceedLimitBuy,
        Ability::OrderExceedLimitSell,
        Ability::OrderMarketBuy,
        Ability::OrderMarketSell,
        Ability::OrderIoc,
        Ability::PositionModeHedge,
        Ability::PositionModeOneWay,
        Ability::MarginModeCrossed,
        Ability::MarginModeIsolated,
    ];

    #[inline]
    #[must_use]
    pub const fn bit(self) -> u64 {
        1u64 << (self as u8)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RsPub => "RsPub",
            Self::RsPubGetTickerWithSeq => "RsPubGetTickerWithSeq",
            Self::RsPri => "RsPri",
            Self::RsPriSetLeverage => "RsPriSetLeverage",
            Self::RsPriCheckOrder => "RsPriCheckOrder",
            Self::RsPriCheckOrderByCid => "RsPriCheckOrderByCid",
            Self::RsPriGetPos => "RsPriGetPos",
            Self::RsPriGetPosWithSeq => "RsPriGetPosWithSeq",
            Self::RsPriGetEquityWithSeq => "RsPriGetEquityWithSeq",
            Self::RsPriOrderFilledPrice => "RsPriOrderFilledPrice",
            Self::RsPriGetAllIndex => "RsPriGetAllIndex",
            Self::RsPriGetAllFundingRate => "RsPriGetAllFundingRate",
            Self::WsPub => "WsPub",
            Self::WsPubTrade => "WsPubTrade",
            Self::WsPubPartial => "WsPubPartial",
            Self::WsPubTicker100PCorrect => "WsPubTicker100PCorrect",
            Self::WsPubTickerWithSeq => "WsPubTickerWithSeq",
            Self::WsPri => "WsPri",
            Self::WsPriReqOrder => "WsPriReqOrder",
            Self::WsPriPosition => "WsPriPosition",
            Self::WsPriPositionWithSeq => "WsPriPositionWithSeq",
            Self::WsPriPositionHasSeqSameAsTicker => "WsPriPositionHasSeqSameAsTicker",
            Self::WsPriEquity => "WsPriEquity",
            Self::WsPriEquityAvailReducedWhenHold => "WsPriEquityAvailReducedWhenHold",
            Self::WsPriEquityWithUpnl => "WsPriEquityWithUpnl",
            Self::WsPriEquityWithSeq => "WsPriEquityWithSeq",
            Self::WsPriEquityWithFree => "WsPriEquityWithFree",
            Self::WsPriOrder => "WsPriOrder",
            Self::WsPriOrderFilledPriceCorrect => "WsPriOrderFilledPriceCorrect",
            Self::WsPriOrderFee => "WsPriOrderFee",
            Self::WsPriOrderTypeExact => "WsPriOrderTypeExact",
            Self::WsPriPosFasterOrder => "WsPriPosFasterOrder",
            Self::WsPriOrderEventHasSeqSameAsTicker => "WsPriOrderEventHasSeqSameAsTicker",
            Self::EquityAvailReducedWhenPendingOrder => "EquityAvailReducedWhenPendingOrder",
            Self::EquityAvailReducedWhenHold => "EquityAvailReducedWhenHold",
            Self::OrderAmend => "OrderAmend",
            Self::OrderAmendByCid => "OrderAmendByCid",
            Self::OrderCid => "OrderCid",
            Self::OrderCancelByCid => "OrderCancelByCid",
            Self::OrderExceedLimitBuy => "OrderExceedLimitBuy",
            Self::OrderExceedLimitSell => "OrderExceedLimitSell",
            Self::OrderMarketBuy => "OrderMarketBuy",
            Self::OrderMarketSell => "OrderMarketSell",
            Self::OrderIoc => "OrderIoc",
            Self::PositionModeHedge => "PositionModeHedge",
            Self::PositionModeOneWay => "PositionModeOneWay",
            Self::MarginModeCrossed => "MarginModeCrossed",
            Self::MarginModeIsolated => "MarginModeIsolated",
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Bit 63 stays reserved.
const _: () = assert!(Ability::VARIANTS.len() <= 63);

// ============================================================================
// AbilitySet
// ============================================================================

/// Immutable 64-bit capability mask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilitySet(u64);

impl AbilitySet {
    pub const EMPTY: Self = Self(0);

    /// Every defined ability.
    pub const ALL: Self = Self((1u64 << Ability::VARIANTS.len()) - 1);

    pub const SEQ_RS: Self = Self::of(&[
        Ability::RsPriGetEquityWithSeq,
        Ability::RsPriGetPosWithSeq,
        Ability::RsPubGetTickerWithSeq,
    ]);

    pub const SEQ_WS: Self = Self::of(&[
        Ability::WsPriPositionWithSeq,
        Ability::WsPriEquityWithSeq,
        Ability::WsPubTicker100PCorrect,
    ]);

    pub const SEQ: Self = Self::SEQ_RS.union(Self::SEQ_WS);

    /// Abilities most venues lack unless they say otherwise.
    pub const DEFAULT_HAS_NO: Self = Self::of(&[
        Ability::WsPriOrderEventHasSeqSameAsTicker,
        Ability::WsPriOrderFee,
        Ability::RsPriGetAllIndex,
        Ability::RsPriGetAllFundingRate,
        Ability::OrderAmend,
        Ability::OrderAmendByCid,
    ]);

    pub const ONLY_SWAP_HAVE: Self = Self::of(&[
        Ability::PositionModeHedge,
        Ability::PositionModeOneWay,
        Ability::WsPriPosition,
    ]);

    pub const DEFAULT_SWAP: Self = Self::ALL
        .difference(Self::of(&[Ability::WsPriReqOrder, Ability::WsPriPosFasterOrder]))
        .difference(Self::SEQ)
        .difference(Self::DEFAULT_HAS_NO);

    pub const DEFAULT_SPOT: Self = Self::DEFAULT_SWAP.difference(Self::ONLY_SWAP_HAVE);

    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn of(abilities: &[Ability]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < abilities.len() {
            bits |= abilities[i].bit();
            i += 1;
        }
        Self(bits)
    }

    #[inline]
    #[must_use]
    pub const fn with(self, ability: Ability) -> Self {
        Self(self.0 | ability.bit())
    }

    #[inline]
    #[must_use]
    pub const fn without(self, ability: Ability) -> Self {
        Self(self.0 & !ability.bit())
    }

    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    #[inline]
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, ability: Ability) -> bool {
        self.0 & ability.bit() != 0
    }

    #[inline]
    #[must_use]
    pub const fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Bits outside the defined ability range.
    #[inline]
    #[must_use]
    pub const fn unknown_bits(self) -> u64 {
        self.0 & !Self::ALL.0
    }

    pub fn iter(self) -> impl Iterator<Item = Ability> {
        Ability::VARIANTS
            .into_iter()
            .filter(move |a| self.contains(*a))
    }

    /// Expand an exclude set so every category root drags its leaves along.
    #[must_use]
    pub fn collapse_excluded(self) -> Self {
        COLLAPSE_TABLE
            .iter()
            .filter(|(root, _)| self.contains(*root))
            .fold(self, |acc, (_, leaves)| acc.union(*leaves))
    }
}

impl fmt::Debug for AbilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for AbilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Ability::name).collect();
        write!(f, "[{}]", names.join("|"))
    }
}

impl From<Ability> for AbilitySet {
    fn from(ability: Ability) -> Self {
        Self(ability.bit())
    }
}

impl FromIterator<Ability> for AbilitySet {
    fn from_iter<I: IntoIterator<Item = Ability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

// ============================================================================
// Category collapse
// ============================================================================

/// Category root -> leaves implied absent when the root is excluded.
pub const COLLAPSE_TABLE: [(Ability, AbilitySet); 4] = [
    (
        Ability::WsPri,
        AbilitySet::of(&[
            Ability::WsPriReqOrder,
            Ability::WsPriPosition,
            Ability::WsPriPositionWithSeq,
            Ability::WsPriEquity,
            Ability::WsPriEquityAvailReducedWhenHold,
            Ability::WsPriEquityWithUpnl,
            Ability::WsPriEquityWithSeq,
            Ability::WsPriEquityWithFree,
            Ability::WsPriOrder,
            Ability::WsPriOrderFilledPriceCorrect,
            Ability::WsPriPosFasterOrder,
            Ability::WsPriOrderTypeExact,
        ]),
    ),
    (
        Ability::WsPriEquity,
        AbilitySet::of(&[
            Ability::WsPriEquityAvailReducedWhenHold,
            Ability::WsPriEquityWithSeq,
            Ability::WsPriEquityWithUpnl,
            Ability::WsPriEquityWithFree,
        ]),
    ),
    (
        Ability::OrderCid,
        AbilitySet::of(&[Ability::OrderCancelByCid, Ability::RsPriCheckOrderByCid]),
    ),
    (
        Ability::RsPriCheckOrder,
        AbilitySet::of(&[Ability::RsPriCheckOrder, Ability::RsPriCheckOrderByCid]),
    ),
];

// ============================================================================
// Containment
// ============================================================================

/// Anything that declares include/exclude ability sets.
pub trait AbilityProvider {
    fn include_abilities(&self) -> AbilitySet;
    fn exclude_abilities(&self) -> AbilitySet;
}

/// Pure containment check on raw sets.
#[must_use]
pub fn check_abilities(include: AbilitySet, exclude: AbilitySet, requested: AbilitySet) -> bool {
    if exclude.intersects(requested) {
        return false;
    }
    if exclude.collapse_excluded().intersects(requested) {
        return false;
    }
    include.contains_all(requested)
}

/// Whether `provider` supports every ability in `requested`.
///
/// Errors only when `requested` carries bits outside the defined range.
pub fn has_abilities<P>(provider: &P, requested: AbilitySet) -> Result<bool>
where
    P: AbilityProvider + ?Sized,
{
    if requested.unknown_bits() != 0 {
        return Err(CoreError::UnknownAbility(requested.unknown_bits()));
    }
    Ok(check_abilities(
        provider.include_abilities(),
        provider.exclude_abilities(),
        requested,
    ))
}
