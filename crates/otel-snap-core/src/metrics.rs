//! Lock-free atomic counter and histogram primitives shared by the store's
//! activity cache and the tool-call instrumentation layer.
//!
//! Hot-path recording is O(1), allocation-free and lock-free; ordering is
//! `Relaxed` throughout since these are independent counters, not used to
//! establish happens-before relationships with other state.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counter {
    v: AtomicU64,
}

impl Counter {
    #[must_use]
    pub const fn new() -> Self {
        Self { v: AtomicU64::new(0) }
    }

    #[inline]
    pub fn inc(&self) {
        self.v.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(&self, delta: u64) {
        self.v.fetch_add(delta, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn load(&self) -> u64 {
        self.v.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reset(&self) {
        self.v.store(0, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Fixed-bucket log2 latency histogram, for self-tracked tool-call latency
// (distinct from the OTLP bucket percentile estimator in otel-snap-store,
// which interpolates buckets supplied by the instrumented program).
// ---------------------------------------------------------------------------

const LOG2_BUCKETS: usize = 64;

#[derive(Debug)]
pub struct Log2Histogram {
    buckets: [AtomicU64; LOG2_BUCKETS],
    count: AtomicU64,
    sum: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
}

impl Default for Log2Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Log2Histogram {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.min.fetch_min(value, Ordering::Relaxed);
        self.max.fetch_max(value, Ordering::Relaxed);
        let idx = bucket_index(value);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        // count is written last with Release so an Acquire load in snapshot()
        // establishes happens-before for all the prior writes above.
        self.count.fetch_add(1, Ordering::Release);
    }

    pub fn reset(&self) {
        for bucket in &self.buckets {
            bucket.store(0, Ordering::Relaxed);
        }
        self.count.store(0, Ordering::Relaxed);
        self.sum.store(0, Ordering::Relaxed);
        self.min.store(u64::MAX, Ordering::Relaxed);
        self.max.store(0, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> HistogramSnapshot {
        let count = self.count.load(Ordering::Acquire);
        if count == 0 {
            return HistogramSnapshot::default();
        }
        let buckets: [u64; LOG2_BUCKETS] = std::array::from_fn(|i| self.buckets[i].load(Ordering::Relaxed));
        let raw_min = self.min.load(Ordering::Relaxed);
        let max = self.max.load(Ordering::Relaxed);
        let min = raw_min.min(max);
        HistogramSnapshot {
            count,
            sum: self.sum.load(Ordering::Relaxed),
            min,
            max,
            p50: estimate_quantile_frac(&buckets, count, 1, 2, max),
            p95: estimate_quantile_frac(&buckets, count, 19, 20, max),
            p99: estimate_quantile_frac(&buckets, count, 99, 100, max),
        }
    }
}

#[inline]
const fn bucket_index(value: u64) -> usize {
    if value == 0 {
        return 0;
    }
    let lz = value.leading_zeros() as usize;
    63usize.saturating_sub(lz)
}

const fn bucket_upper_bound(idx: usize) -> u64 {
    if idx >= 63 {
        return u64::MAX;
    }
    (1u64 << (idx + 1)).saturating_sub(1)
}

fn estimate_quantile_frac(
    buckets: &[u64; LOG2_BUCKETS],
    count: u64,
    numerator: u64,
    denominator: u64,
    observed_max: u64,
) -> u64 {
    let numerator = numerator.min(denominator);
    let mut rank = count.saturating_mul(numerator).saturating_add(denominator.saturating_sub(1)) / denominator;
    rank = rank.clamp(1, count);

    let mut cumulative = 0u64;
    for (idx, c) in buckets.iter().copied().enumerate() {
        cumulative = cumulative.saturating_add(c);
        if cumulative >= rank {
            return bucket_upper_bound(idx).min(observed_max);
        }
    }
    observed_max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let c = Counter::new();
        c.inc();
        c.add(4);
        assert_eq!(c.load(), 5);
    }

    #[test]
    fn log2_histogram_empty_snapshot_is_zeroed() {
        let h = Log2Histogram::new();
        let s = h.snapshot();
        assert_eq!(s.count, 0);
        assert_eq!(s.max, 0);
    }

    #[test]
    fn log2_histogram_quantiles_are_ordered() {
        let h = Log2Histogram::new();
        for v in [1, 5, 10, 20, 50, 100, 500, 1000, 5000, 10000] {
            h.record(v);
        }
        let s = h.snapshot();
        assert!(s.p50 <= s.p95);
        assert!(s.p95 <= s.p99);
        assert!(s.max >= 10000);
    }
}
