//! Lock-free request metrics for the registrar client
//!
//! Uses atomics so concurrent requests (the directory load issues two at once)
//! never contend on a lock.
//!
//! NOTE: Relaxed ordering throughout; these counters are for reporting only
//! and must not drive control flow.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Exponential bucket boundaries (microseconds)
/// Buckets: ≤1ms, ≤2ms, ≤5ms, ≤10ms, ≤25ms, ≤50ms, ≤100ms, ≤250ms, ≤500ms, ≤1s, >1s
const BUCKET_BOUNDS: [u64; 10] =
    [1_000, 2_000, 5_000, 10_000, 25_000, 50_000, 100_000, 250_000, 500_000, 1_000_000];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Load all bucket values without resetting
#[inline]
fn load_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.load(Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = ((total as f64 * percentile).ceil() as u64).max(1);
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] = [
        1_000, 2_000, 5_000, 10_000, 25_000, 50_000, 100_000, 250_000, 500_000, 1_000_000,
        2_000_000,
    ];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free request metrics
///
/// Counters are monotonic for the lifetime of the client; `report()` reads a
/// snapshot without resetting.
pub struct ApiMetrics {
    /// Requests sent (monotonic)
    requests_total: AtomicU64,
    /// Requests that ended in a transport error, non-2xx or undecodable body
    failures_total: AtomicU64,
    /// Sum of request latencies in microseconds
    latency_sum_us: AtomicU64,
    /// Max request latency in microseconds
    latency_max_us: AtomicU64,
    /// Request latency histogram buckets
    latency_buckets: [AtomicU64; NUM_BUCKETS],
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            failures_total: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Record a completed request (lock-free)
    #[inline]
    pub fn record_request(&self, latency_us: u64, ok: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failures_total.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_us, latency_us);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn failures_total(&self) -> u64 {
        self.failures_total.load(Ordering::Relaxed)
    }

    /// Snapshot of all counters
    pub fn report(&self) -> ApiMetricsSummary {
        let requests_total = self.requests_total();
        let latency_sum_us = self.latency_sum_us.load(Ordering::Relaxed);
        let buckets = load_buckets(&self.latency_buckets);

        ApiMetricsSummary {
            requests_total,
            failures_total: self.failures_total(),
            avg_latency_us: if requests_total > 0 { latency_sum_us / requests_total } else { 0 },
            max_latency_us: self.latency_max_us.load(Ordering::Relaxed),
            p50_us: percentile_from_buckets(&buckets, 0.50),
            p95_us: percentile_from_buckets(&buckets, 0.95),
            p99_us: percentile_from_buckets(&buckets, 0.99),
        }
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiMetricsSummary {
    pub requests_total: u64,
    pub failures_total: u64,
    pub avg_latency_us: u64,
    pub max_latency_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
}

impl ApiMetricsSummary {
    pub fn log(&self) {
        info!(
            requests_total = %self.requests_total,
            failures_total = %self.failures_total,
            avg_latency_us = %self.avg_latency_us,
            max_latency_us = %self.max_latency_us,
            p50_us = %self.p50_us,
            p95_us = %self.p95_us,
            p99_us = %self.p99_us,
            "api_metrics"
        );
    }
}
