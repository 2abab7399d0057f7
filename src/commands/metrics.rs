//! Query Metrics
//!
//! Aggregates execution counters and a running mean latency for every
//! query handled by a [`CommandHandler`](crate::commands::CommandHandler).
//!
//! All four fields are updated together under one lock, so any snapshot
//! satisfies `total == succeeded + failed`.

use std::sync::Mutex;
use std::time::Duration;

/// Point-in-time copy of the query metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Number of completed queries
    pub total: u64,
    /// Queries that produced a result line
    pub succeeded: u64,
    /// Queries that produced an error line
    pub failed: u64,
    /// Running mean of wall-clock execution time
    pub average_latency: Duration,
}

/// Thread-safe metrics aggregator owned by the dispatcher.
#[derive(Debug, Default)]
pub struct QueryMetrics {
    inner: Mutex<MetricsSnapshot>,
}

impl QueryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed query.
    ///
    /// The mean is folded in as `avg' = (avg * (total - 1) + latency) / total`.
    pub fn record(&self, succeeded: bool, latency: Duration) {
        let mut m = self.inner.lock().unwrap();

        m.total += 1;
        if succeeded {
            m.succeeded += 1;
        } else {
            m.failed += 1;
        }

        let total = u128::from(m.total);
        let avg_ns = (m.average_latency.as_nanos() * (total - 1) + latency.as_nanos()) / total;
        m.average_latency = Duration::from_nanos(u64::try_from(avg_ns).unwrap_or(u64::MAX));
    }

    /// Returns a consistent copy of the current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        *self.inner.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_is_zeroed() {
        assert_eq!(QueryMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_record_counts_outcomes() {
        let metrics = QueryMetrics::new();

        metrics.record(true, Duration::from_micros(10));
        metrics.record(false, Duration::from_micros(10));
        metrics.record(true, Duration::from_micros(10));

        let snap = metrics.snapshot();
        assert_eq!(snap.total, 3);
        assert_eq!(snap.succeeded, 2);
        assert_eq!(snap.failed, 1);
    }

    #[test]
    fn test_running_mean() {
        let metrics = QueryMetrics::new();

        metrics.record(true, Duration::from_micros(10));
        assert_eq!(metrics.snapshot().average_latency, Duration::from_micros(10));

        metrics.record(true, Duration::from_micros(30));
        assert_eq!(metrics.snapshot().average_latency, Duration::from_micros(20));

        metrics.record(false, Duration::from_micros(50));
        assert_eq!(metrics.snapshot().average_latency, Duration::from_micros(30));

        // Integer nanoseconds, truncated
        metrics.record(true, Duration::from_micros(31));
        assert_eq!(metrics.snapshot().average_latency, Duration::from_nanos(30_250));
        metrics.record(true, Duration::from_nanos(1));
        assert_eq!(metrics.snapshot().average_latency, Duration::from_nanos(24_200));
    }

    #[test]
    fn test_concurrent_records_stay_consistent() {
        let metrics = Arc::new(QueryMetrics::new());
        let mut handles = vec![];

        for t in 0..4 {
            let metrics = Arc::clone(&metrics);
            handles.push(thread::spawn(move || {
                for i in 0..250 {
                    metrics.record((t + i) % 3 != 0, Duration::from_nanos(100));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.total, 1000);
        assert_eq!(snap.succeeded + snap.failed, snap.total);
        assert_eq!(snap.average_latency, Duration::from_nanos(100));
    }
}
