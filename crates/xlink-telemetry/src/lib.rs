//! Prometheus metrics, structured logging, and alerting for xlink.
//!
//! - Prometheus metrics for probing, line switches, dispatch, and unwinds
//! - Structured JSON logging with tracing
//! - `MetricsSink` destinations for flushed endpoint statistics
//! - `Alerter` channel for escalations

pub mod alert;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod sink;

pub use alert::{AlertLevel, Alerter, DynAlerter, LogAlerter, RecordingAlerter};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use sink::{DynMetricsSink, LogSink, MetricsSink, PrometheusSink, RecordingSink, SinkRecord};
