//! Transport x path combinations used to reach a venue.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Request-response ("rs") or persistent streaming ("ws") transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Transport {
    #[default]
    #[serde(rename = "rs")]
    Rest,
    #[serde(rename = "ws")]
    Streaming,
}

impl Transport {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rest => "rs",
            Self::Streaming => "ws",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rs" | "rest" => Ok(Self::Rest),
            "ws" | "stream" | "streaming" => Ok(Self::Streaming),
            other => Err(CoreError::InvalidLine(format!("unknown client type: {other}"))),
        }
    }
}

/// Ordinary network path or the privileged low-latency colo path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PathType {
    #[default]
    #[serde(rename = "nor")]
    Normal,
    #[serde(rename = "colo")]
    Colo,
}

impl PathType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "nor",
            Self::Colo => "colo",
        }
    }
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nor" | "normal" => Ok(Self::Normal),
            "colo" => Ok(Self::Colo),
            other => Err(CoreError::InvalidLine(format!("unknown link type: {other}"))),
        }
    }
}

/// Margin mode applied before switching a derivative venue onto a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginMode {
    /// Leave the venue's margin mode untouched.
    #[default]
    None,
    Cross,
    Isolated,
}

impl MarginMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Cross => "cross",
            Self::Isolated => "isolated",
        }
    }

    #[must_use]
    pub const fn is_set(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for MarginMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order action routed over a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Place,
    Amend,
    Cancel,
}

impl ActionType {
    pub const ALL: [ActionType; 3] = [Self::Place, Self::Amend, Self::Cancel];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Place => "place",
            Self::Amend => "amend",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Line
// ============================================================================

/// One (transport, path) pair plus the margin mode to apply on switch.
///
/// Equality and hashing consider transport and path only.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Line {
    pub transport: Transport,
    pub path: PathType,
    #[serde(default)]
    pub margin_mode: MarginMode,
}

impl Line {
    #[must_use]
    pub const fn new(transport: Transport, path: PathType) -> Self {
        Self {
            transport,
            path,
            margin_mode: MarginMode::None,
        }
    }

    #[must_use]
    pub const fn with_margin_mode(mut self, margin_mode: MarginMode) -> Self {
        self.margin_mode = margin_mode;
        self
    }

    pub const REST_NORMAL: Line = Line::new(Transport::Rest, PathType::Normal);
    pub const REST_COLO: Line = Line::new(Transport::Rest, PathType::Colo);
    pub const STREAM_NORMAL: Line = Line::new(Transport::Streaming, PathType::Normal);
    pub const STREAM_COLO: Line = Line::new(Transport::Streaming, PathType::Colo);

    /// The four transport x path combinations.
    #[must_use]
    pub const fn all() -> [Line; 4] {
        [
            Self::REST_NORMAL,
            Self::REST_COLO,
            Self::STREAM_NORMAL,
            Self::STREAM_COLO,
        ]
    }

    #[must_use]
    pub fn is_rest(&self) -> bool {
        self.transport == Transport::Rest
    }
}

impl PartialEq for Line {
    fn eq(&self, other: &Self) -> bool {
        self.transport == other.transport && self.path == other.path
    }
}

impl Eq for Line {}

impl std::hash::Hash for Line {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.transport.hash(state);
        self.path.hash(state);
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.transport, self.path, self.margin_mode)
    }
}

// ============================================================================
// SelectedLine
// ============================================================================

/// The line currently chosen for one action, with the weight it was
/// discovered at. Weight is informational and not part of equality.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SelectedLine {
    pub line: Line,
    #[serde(default)]
    pub weight: i64,
}

impl SelectedLine {
    #[must_use]
    pub const fn new(line: Line) -> Self {
        Self { line, weight: 0 }
    }

    #[must_use]
    pub const fn with_weight(line: Line, weight: i64) -> Self {
        Self { line, weight }
    }

    /// Store `other` if it differs from `self`. Returns whether it changed.
    pub fn compare_and_store(&mut self, other: &SelectedLine) -> bool {
        if self == other {
            return false;
        }
        *self = *other;
        true
    }
}

impl PartialEq for SelectedLine {
    fn eq(&self, other: &Self) -> bool {
        self.line == other.line
    }
}

impl Eq for SelectedLine {}

impl fmt::Display for SelectedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(weight {}, line {})", self.weight, self.line)
    }
}

/// Parse `"client:rs;link:colo"`. Margin mode is never taken from strings.
impl FromStr for SelectedLine {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut transport = None;
        let mut path = None;
        for part in s.split(';').filter(|p| !p.trim().is_empty()) {
            let (key, value) = part
                .split_once(':')
                .ok_or_else(|| CoreError::InvalidLine(format!("malformed segment: {part}")))?;
            match key.trim().to_ascii_lowercase().as_str() {
                "client" => transport = Some(value.parse::<Transport>()?),
                "link" => path = Some(value.parse::<PathType>()?),
                _ => {}
            }
        }
        let transport = transport.ok_or_else(|| CoreError::InvalidLine("miss client type".into()))?;
        let path = path.ok_or_else(|| CoreError::InvalidLine("miss link type".into()))?;
        Ok(Self::new(Line::new(transport, path)))
    }
}
