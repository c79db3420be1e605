//! Per-(action, transport, path) dispatch capability table.
//!
//! Each venue reports which of the twelve concrete dispatch routes it
//! implements. The table is an exhaustive enum so adding a transport or
//! path fails to compile until every match is updated.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::line::{ActionType, Line, PathType, Transport};

/// One concrete dispatch route, e.g. `DoAmendOrderWsColo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteFeature {
    pub action: ActionType,
    pub transport: Transport,
    pub path: PathType,
}

impl RouteFeature {
    #[must_use]
    pub const fn new(action: ActionType, transport: Transport, path: PathType) -> Self {
        Self {
            action,
            transport,
            path,
        }
    }

    #[must_use]
    pub const fn for_line(action: ActionType, line: &Line) -> Self {
        Self::new(action, line.transport, line.path)
    }

    /// Same route on the normal path.
    #[must_use]
    pub const fn on_normal(self) -> Self {
        Self::new(self.action, self.transport, PathType::Normal)
    }

    #[must_use]
    pub const fn line(&self) -> Line {
        Line::new(self.transport, self.path)
    }

    /// Stable slot in `0..12`.
    #[must_use]
    pub const fn index(&self) -> u8 {
        let action = match self.action {
            ActionType::Place => 0,
            ActionType::Cancel => 1,
            ActionType::Amend => 2,
        };
        let transport = match self.transport {
            Transport::Rest => 0,
            Transport::Streaming => 1,
        };
        let path = match self.path {
            PathType::Normal => 0,
            PathType::Colo => 1,
        };
        action * 4 + transport * 2 + path
    }

    /// Every route in slot order.
    #[must_use]
    pub fn all() -> impl Iterator<Item = RouteFeature> {
        [ActionType::Place, ActionType::Cancel, ActionType::Amend]
            .into_iter()
            .flat_map(|action| {
                Line::all()
                    .into_iter()
                    .map(move |line| RouteFeature::for_line(action, &line))
            })
    }
}

impl fmt::Display for RouteFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            ActionType::Place => "Place",
            ActionType::Cancel => "Cancel",
            ActionType::Amend => "Amend",
        };
        let transport = match self.transport {
            Transport::Rest => "Rs",
            Transport::Streaming => "Ws",
        };
        let path = match self.path {
            PathType::Normal => "Nor",
            PathType::Colo => "Colo",
        };
        write!(f, "Do{action}Order{transport}{path}")
    }
}

/// Set of supported [`RouteFeature`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteFeatures(u16);

impl RouteFeatures {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self((1 << 12) - 1);

    #[must_use]
    pub const fn with(self, feature: RouteFeature) -> Self {
        Self(self.0 | (1 << feature.index()))
    }

    #[must_use]
    pub const fn without(self, feature: RouteFeature) -> Self {
        Self(self.0 & !(1 << feature.index()))
    }

    #[must_use]
    pub const fn supports(&self, feature: RouteFeature) -> bool {
        self.0 & (1 << feature.index()) != 0
    }

    /// Every action on the given line.
    #[must_use]
    pub fn with_line(self, line: Line) -> Self {
        ActionType::ALL
            .into_iter()
            .fold(self, |acc, action| acc.with(RouteFeature::for_line(action, &line)))
    }

    pub fn iter(self) -> impl Iterator<Item = RouteFeature> {
        RouteFeature::all().filter(move |f| self.supports(*f))
    }
}

impl FromIterator<RouteFeature> for RouteFeatures {
    fn from_iter<I: IntoIterator<Item = RouteFeature>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}
