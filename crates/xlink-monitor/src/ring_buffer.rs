//! Rolling latency statistics for one endpoint.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::RwLock;

/// Default number of samples kept per endpoint.
pub const DEFAULT_RING_CAPACITY: usize = 64;

/// Snapshot of a [`LatencyRingBuffer`], in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatencyStats {
    pub min: i64,
    pub max: i64,
    pub count: i64,
    pub last: i64,
    /// Integer mean of the retained samples.
    pub avg: i64,
}

impl LatencyStats {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Fields in flush order.
    #[must_use]
    pub fn fields(&self) -> [(&'static str, i64); 5] {
        [
            ("avg", self.avg),
            ("min", self.min),
            ("max", self.max),
            ("last", self.last),
            ("count", self.count),
        ]
    }
}

impl fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(us): max:{}, min:{}, avg:{}, count:{} last:{}",
            self.max, self.min, self.avg, self.count, self.last
        )
    }
}

/// Fixed-capacity buffer that evicts the oldest sample when full.
///
/// Writers (probe responses) and readers (flush) run concurrently, so the
/// samples sit behind a read/write lock.
#[derive(Debug)]
pub struct LatencyRingBuffer {
    capacity: usize,
    samples: RwLock<VecDeque<i64>>,
}

impl LatencyRingBuffer {
    /// A capacity of zero is bumped to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn put(&self, micros: i64) {
        let mut samples = self.samples.write();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(micros);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> LatencyStats {
        let samples = self.samples.read();
        let Some(&last) = samples.back() else {
            return LatencyStats::default();
        };

        let mut min = i64::MAX;
        let mut max = i64::MIN;
        let mut sum: i64 = 0;
        for &sample in samples.iter() {
            min = min.min(sample);
            max = max.max(sample);
            sum = sum.saturating_add(sample);
        }
        let count = samples.len() as i64;
        LatencyStats {
            min,
            max,
            count,
            last,
            avg: sum / count,
        }
    }

    pub fn reset(&self) {
        self.samples.write().clear();
    }
}

impl Default for LatencyRingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}
