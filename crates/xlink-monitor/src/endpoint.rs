//! Probe endpoints: one latency stream per (line, action variant).

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI64, Ordering};

use once_cell::sync::OnceCell;

use xlink_core::{ActionType, Line, PathType, RouteFeature, Transport};

use crate::config::VenueProfile;
use crate::ring_buffer::LatencyRingBuffer;

// ============================================================================
// EndpointKey
// ============================================================================

/// Two-digit line id carried inside probe client order ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum EndpointKey {
    Nil = 0,
    RsNorPlace = 1,
    RsColoPlace = 2,
    RsNorCancel = 3,
    RsColoCancel = 4,
    RsNorAmend = 5,
    RsColoAmend = 6,
    WsNorPlace = 7,
    WsColoPlace = 8,
    WsNorCancel = 9,
    WsColoCancel = 10,
    WsNorAmend = 11,
    WsColoAmend = 12,
}

impl EndpointKey {
    pub const ALL: [EndpointKey; 12] = [
        Self::RsNorPlace,
        Self::RsColoPlace,
        Self::RsNorCancel,
        Self::RsColoCancel,
        Self::RsNorAmend,
        Self::RsColoAmend,
        Self::WsNorPlace,
        Self::WsColoPlace,
        Self::WsNorCancel,
        Self::WsColoCancel,
        Self::WsNorAmend,
        Self::WsColoAmend,
    ];

    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Nil),
            1..=12 => Some(Self::ALL[usize::from(id) - 1]),
            _ => None,
        }
    }

    /// Key for a concrete route.
    #[must_use]
    pub const fn for_feature(feature: RouteFeature) -> Self {
        let transport = match feature.transport {
            Transport::Rest => 0,
            Transport::Streaming => 6,
        };
        let action = match feature.action {
            ActionType::Place => 0,
            ActionType::Cancel => 2,
            ActionType::Amend => 4,
        };
        let path = match feature.path {
            PathType::Normal => 0,
            PathType::Colo => 1,
        };
        Self::ALL[transport + action + path]
    }

    /// `(transport, path, action)`, or `None` for [`EndpointKey::Nil`].
    #[must_use]
    pub const fn factors(self) -> Option<(Transport, PathType, ActionType)> {
        let id = self as u8;
        if id == 0 {
            return None;
        }
        let idx = id - 1;
        let transport = if idx < 6 {
            Transport::Rest
        } else {
            Transport::Streaming
        };
        let action = match (idx % 6) / 2 {
            0 => ActionType::Place,
            1 => ActionType::Cancel,
            _ => ActionType::Amend,
        };
        let path = if idx % 2 == 0 {
            PathType::Normal
        } else {
            PathType::Colo
        };
        Some((transport, path, action))
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nil => "Nil",
            Self::RsNorPlace => "RsNorPlace",
            Self::RsColoPlace => "RsColoPlace",
            Self::RsNorCancel => "RsNorCancel",
            Self::RsColoCancel => "RsColoCancel",
            Self::RsNorAmend => "RsNorAmend",
            Self::RsColoAmend => "RsColoAmend",
            Self::WsNorPlace => "WsNorPlace",
            Self::WsColoPlace => "WsColoPlace",
            Self::WsNorCancel => "WsNorCancel",
            Self::WsColoCancel => "WsColoCancel",
            Self::WsNorAmend => "WsNorAmend",
            Self::WsColoAmend => "WsColoAmend",
        };
        f.write_str(name)
    }
}

// ============================================================================
// LineAction
// ============================================================================

/// A line plus an action variant such as `place` or `amend_pd`.
///
/// Unlike [`Line`] equality, the margin mode is part of the identity so
/// cross and isolated samples land in separate endpoints.
#[derive(Debug, Clone)]
pub struct LineAction {
    pub line: Line,
    pub action_with_ext: String,
}

impl LineAction {
    pub fn new(line: Line, action: ActionType, ext: &str) -> Self {
        Self {
            line,
            action_with_ext: format!("{action}{ext}"),
        }
    }

    /// Whether this variant belongs to `action`.
    #[must_use]
    pub fn is_action(&self, action: ActionType) -> bool {
        self.action_with_ext.starts_with(action.as_str())
    }
}

impl PartialEq for LineAction {
    fn eq(&self, other: &Self) -> bool {
        self.line == other.line
            && self.line.margin_mode == other.line.margin_mode
            && self.action_with_ext == other.action_with_ext
    }
}

impl Eq for LineAction {}

impl Hash for LineAction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.line.hash(state);
        self.line.margin_mode.hash(state);
        self.action_with_ext.hash(state);
    }
}

impl fmt::Display for LineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.line, self.action_with_ext)
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Latency samples for one [`LineAction`].
#[derive(Debug)]
pub struct Endpoint {
    line_action: LineAction,
    delay: LatencyRingBuffer,
    last_update_us: AtomicI64,
    tags: OnceCell<BTreeMap<String, String>>,
}

impl Endpoint {
    pub fn new(line_action: LineAction, capacity: usize) -> Self {
        Self {
            line_action,
            delay: LatencyRingBuffer::new(capacity),
            last_update_us: AtomicI64::new(0),
            tags: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn line_action(&self) -> &LineAction {
        &self.line_action
    }

    #[must_use]
    pub fn delay(&self) -> &LatencyRingBuffer {
        &self.delay
    }

    /// Add a sample stamped at `now_us`.
    pub fn record(&self, micros: i64, now_us: i64) {
        self.delay.put(micros);
        self.last_update_us.store(now_us, Ordering::Relaxed);
    }

    /// Wall clock of the last sample, 0 if none.
    #[must_use]
    pub fn last_update_us(&self) -> i64 {
        self.last_update_us.load(Ordering::Relaxed)
    }

    /// Venue tags plus link, client, action and margin mode. Built once.
    pub fn tags(&self, profile: &VenueProfile) -> &BTreeMap<String, String> {
        self.tags.get_or_init(|| {
            let line = &self.line_action.line;
            let mut tags = profile.tags();
            tags.insert("link".to_string(), line.path.to_string());
            tags.insert("client".to_string(), line.transport.to_string());
            tags.insert("action".to_string(), self.line_action.action_with_ext.clone());
            tags.insert("margin_mode".to_string(), line.margin_mode.to_string());
            tags
        })
    }
}
