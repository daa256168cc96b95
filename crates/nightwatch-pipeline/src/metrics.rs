//! Pipeline-wide counters: queue depth, success/failure tallies, a rolling
//! window of per-event processing durations and error-kind counts.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Maximum number of processing-time samples retained; oldest are dropped.
const MAX_SAMPLES: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Percentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Default)]
struct Inner {
    queue_depth: u32,
    success: u64,
    failure: u64,
    overflow_drops: u64,
    worker_exceptions: u64,
    processing_times_ms: Vec<f64>,
    error_counts: HashMap<String, u64>,
}

/// Thread-safe counters shared between the ingestion side and every worker.
#[derive(Default)]
pub struct ProcessingMetrics {
    inner: Mutex<Inner>,
}

impl ProcessingMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_queue_depth(&self, depth: u32) {
        self.inner.lock().queue_depth = depth;
    }

    #[must_use]
    pub fn queue_depth(&self) -> u32 {
        self.inner.lock().queue_depth
    }

    pub fn record_success(&self) {
        self.inner.lock().success += 1;
    }

    pub fn record_failure(&self) {
        self.inner.lock().failure += 1;
    }

    #[must_use]
    pub fn success_count(&self) -> u64 {
        self.inner.lock().success
    }

    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.inner.lock().failure
    }

    pub fn record_overflow_drop(&self) {
        self.inner.lock().overflow_drops += 1;
    }

    #[must_use]
    pub fn overflow_drops(&self) -> u64 {
        self.inner.lock().overflow_drops
    }

    pub fn record_worker_exception(&self) {
        self.inner.lock().worker_exceptions += 1;
    }

    #[must_use]
    pub fn worker_exceptions(&self) -> u64 {
        self.inner.lock().worker_exceptions
    }

    /// Records one event's processing duration, keeping only the most
    /// recent `MAX_SAMPLES` samples.
    pub fn record_processing_time_ms(&self, duration_ms: f64) {
        let mut inner = self.inner.lock();
        inner.processing_times_ms.push(duration_ms);
        let len = inner.processing_times_ms.len();
        if len > MAX_SAMPLES {
            inner.processing_times_ms.drain(0..len - MAX_SAMPLES);
        }
    }

    pub fn increment_error(&self, kind: &str) {
        *self.inner.lock().error_counts.entry(kind.to_string()).or_insert(0) += 1;
    }

    #[must_use]
    pub fn error_counts(&self) -> HashMap<String, u64> {
        self.inner.lock().error_counts.clone()
    }

    /// p50/p95/p99 of recorded durations, each `sorted[floor(n*p)]` clamped
    /// to the last valid index. All zero when no samples have been recorded.
    #[must_use]
    pub fn percentiles(&self) -> Percentiles {
        let inner = self.inner.lock();
        if inner.processing_times_ms.is_empty() {
            return Percentiles::default();
        }
        let mut sorted = inner.processing_times_ms.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = sorted.len();
        let at = |p: f64| sorted[((n as f64 * p) as usize).min(n - 1)];
        Percentiles { p50: at(0.50), p95: at(0.95), p99: at(0.99) }
    }
}
