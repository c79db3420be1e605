//! Destinations for flushed endpoint statistics.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::metrics::ENDPOINT_STAT;

/// Receives one measurement per flushed endpoint.
pub trait MetricsSink: Send + Sync {
    fn write(&self, measurement: &str, tags: &BTreeMap<String, String>, fields: &[(&str, i64)]);
}

/// Arc wrapper for metrics sink trait objects.
pub type DynMetricsSink = Arc<dyn MetricsSink>;

/// Publishes flushed statistics as prometheus gauges.
#[derive(Debug, Default)]
pub struct PrometheusSink;

impl MetricsSink for PrometheusSink {
    fn write(&self, measurement: &str, tags: &BTreeMap<String, String>, fields: &[(&str, i64)]) {
        let tag = |key: &str| tags.get(key).map(String::as_str).unwrap_or("");
        for (field, value) in fields {
            ENDPOINT_STAT
                .with_label_values(&[
                    measurement,
                    tag("ex"),
                    tag("client"),
                    tag("link"),
                    tag("action"),
                    tag("margin_mode"),
                    *field,
                ])
                .set(*value as f64);
        }
    }
}

/// Writes flushed statistics to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn write(&self, measurement: &str, tags: &BTreeMap<String, String>, fields: &[(&str, i64)]) {
        info!(measurement, ?tags, ?fields, "endpoint stats");
    }
}

/// One recorded sink write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRecord {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: Vec<(String, i64)>,
}

impl SinkRecord {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<i64> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| *v)
    }
}

/// Keeps every write in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<SinkRecord>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().clone()
    }
}

impl MetricsSink for RecordingSink {
    fn write(&self, measurement: &str, tags: &BTreeMap<String, String>, fields: &[(&str, i64)]) {
        self.records.lock().push(SinkRecord {
            measurement: measurement.to_string(),
            tags: tags.clone(),
            fields: fields.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags() -> BTreeMap<String, String> {
        [("ex", "mock_usdt_swap"), ("client", "rs"), ("link", "colo"), ("action", "place")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_prometheus_sink_sets_gauges() {
        PrometheusSink.write("order_delay", &tags(), &[("avg", 1500), ("max", 2000)]);
        let avg = ENDPOINT_STAT
            .with_label_values(&["order_delay", "mock_usdt_swap", "rs", "colo", "place", "", "avg"])
            .get();
        assert!((avg - 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.write("order_delay", &tags(), &[("count", 3)]);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("count"), Some(3));
        assert_eq!(records[0].tags["client"], "rs");
    }
}
