//! Client order ids for probe orders.
//!
//! Format: `{prefix}{a|n}_{key:02}_{unix_micros}`. The prefix is `M_`, or
//! `t-M_` for venues that force a `t-` lead-in onto every client id.

use chrono::Utc;

use xlink_core::VenueQuirks;

use crate::endpoint::EndpointKey;

const MONITOR_PREFIX: &str = "M_";
const GATE_LEAD_IN: &str = "t-";
/// Line id used by the link-activation cancel.
const ACTIVATION_KEY: u8 = 99;
/// Order id sent with the link-activation cancel.
pub const ACTIVATION_ORDER_ID: &str = "1234";

/// Fields recovered from a probe client order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedCid {
    pub active: bool,
    pub key_id: u8,
    pub started_us: i64,
}

impl DecodedCid {
    #[must_use]
    pub fn key(&self) -> Option<EndpointKey> {
        EndpointKey::from_id(self.key_id)
    }

    #[must_use]
    pub fn is_activation(&self) -> bool {
        self.key_id == ACTIVATION_KEY
    }
}

/// Encodes and recognizes probe client order ids for one venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidCodec {
    prefix: String,
}

impl CidCodec {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Prefix for `venue`: a configured lead-in wins, then the `gate` naming
    /// convention, then plain `M_`.
    pub fn for_venue(venue: &str, quirks: &VenueQuirks) -> Self {
        let lead_in = match &quirks.cid_lead_in {
            Some(lead_in) => lead_in.as_str(),
            None if venue.starts_with("gate") => GATE_LEAD_IN,
            None => "",
        };
        Self::with_prefix(format!("{lead_in}{MONITOR_PREFIX}"))
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn encode(&self, key: EndpointKey, active: bool) -> String {
        self.encode_at(key, active, Utc::now().timestamp_micros())
    }

    pub fn encode_at(&self, key: EndpointKey, active: bool, micros: i64) -> String {
        let flag = if active { 'a' } else { 'n' };
        format!("{}{flag}_{:02}_{micros}", self.prefix, key.id())
    }

    /// Cid of the cancel that activates a REST link. Never matches a real order.
    pub fn activation_cid(&self) -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        format!("{}a_{ACTIVATION_KEY}_{nanos}", self.prefix)
    }

    #[must_use]
    pub fn is_monitor_order(&self, cid: &str) -> bool {
        cid.starts_with(&self.prefix)
    }

    #[must_use]
    pub fn decode(&self, cid: &str) -> Option<DecodedCid> {
        let rest = cid.strip_prefix(self.prefix.as_str())?;
        let mut parts = rest.splitn(3, '_');
        let active = match parts.next()? {
            "a" => true,
            "n" => false,
            _ => return None,
        };
        let key = parts.next()?;
        if key.len() != 2 {
            return None;
        }
        let key_id = key.parse::<u8>().ok()?;
        let started_us = parts.next()?.parse::<i64>().ok()?;
        Some(DecodedCid {
            active,
            key_id,
            started_us,
        })
    }
}
