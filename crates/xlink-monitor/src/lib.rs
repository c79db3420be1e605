//! Latency probing for every line of a venue.
//!
//! Provides:
//! - Synthetic place/amend/cancel probes, one line at a time
//! - Per-endpoint rolling latency (64 samples, min/max/avg/last/count)
//! - Probe client order ids that encode the line they were sent on
//! - Failover of each action to its fastest line after a clean cycle
//! - Periodic flush of endpoint stats to a metrics sink

pub mod cid;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod monitor;
pub mod ring_buffer;

pub use cid::{CidCodec, DecodedCid, ACTIVATION_ORDER_ID};
pub use config::{MonitorConfig, VenueProfile};
pub use endpoint::{Endpoint, EndpointKey, LineAction};
pub use error::{MonitorError, MonitorResult};
pub use monitor::{probe_size, CycleOutcome, DelayMonitor, DELAY_MEASUREMENT};
pub use ring_buffer::{LatencyRingBuffer, LatencyStats, DEFAULT_RING_CAPACITY};
