//! Histogram percentile estimator (p50/p95/p99) from OTLP bucket data.
//!
//! Distinct from a self-tracked latency histogram: here the buckets and
//! counts are supplied by the instrumented program, so the only job is
//! linear interpolation within the bucket that crosses the target rank.

/// p50/p95/p99 estimated from an explicit-bounds histogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

const QUANTILES: [f64; 3] = [0.50, 0.95, 0.99];

/// `bounds[i-1] < x <= bounds[i]` for bucket `i < bounds.len()`; bucket
/// `bounds.len()` is the overflow bucket `(bounds[last], +inf)`.
#[must_use]
pub fn from_explicit_bounds(count: u64, bounds: &[f64], bucket_counts: &[u64]) -> Option<Percentiles> {
    if count == 0 || bucket_counts.is_empty() {
        return None;
    }
    let buckets: Vec<(f64, f64)> = explicit_bucket_ranges(bounds);
    estimate(count, &buckets, bucket_counts)
}

fn explicit_bucket_ranges(bounds: &[f64]) -> Vec<(f64, f64)> {
    let mut ranges = Vec::with_capacity(bounds.len() + 1);
    let mut lower = 0.0;
    for &bound in bounds {
        ranges.push((lower, bound));
        lower = bound;
    }
    ranges.push((lower, f64::INFINITY));
    ranges
}

/// Exponential histogram: buckets are `base^i` boundaries, assembled from
/// the negative, zero, and positive bucket arrays, sorted by lower bound.
#[must_use]
pub fn from_exponential_histogram(
    count: u64,
    scale: i32,
    zero_count: u64,
    positive_offset: i32,
    positive_counts: &[u64],
    negative_offset: i32,
    negative_counts: &[u64],
) -> Option<Percentiles> {
    if count == 0 {
        return None;
    }
    let base = 2f64.powf(2f64.powi(-scale));

    let mut buckets: Vec<(f64, f64, u64)> = Vec::new();

    for (i, &c) in negative_counts.iter().enumerate() {
        if c == 0 {
            continue;
        }
        let index = negative_offset + i as i32;
        let upper = -base.powi(index);
        let lower = -base.powi(index + 1);
        buckets.push((lower, upper, c));
    }

    if zero_count > 0 {
        buckets.push((0.0, 0.0, zero_count));
    }

    for (i, &c) in positive_counts.iter().enumerate() {
        if c == 0 {
            continue;
        }
        let index = positive_offset + i as i32;
        let lower = base.powi(index);
        let upper = base.powi(index + 1);
        buckets.push((lower, upper, c));
    }

    buckets.sort_by(|a, b| a.0.total_cmp(&b.0));

    if buckets.is_empty() {
        return None;
    }

    let ranges: Vec<(f64, f64)> = buckets.iter().map(|b| (b.0, b.1)).collect();
    let counts: Vec<u64> = buckets.iter().map(|b| b.2).collect();
    estimate(count, &ranges, &counts)
}

fn estimate(count: u64, ranges: &[(f64, f64)], bucket_counts: &[u64]) -> Option<Percentiles> {
    let mut values = [0.0; 3];
    for (slot, &q) in values.iter_mut().zip(QUANTILES.iter()) {
        *slot = quantile(count, ranges, bucket_counts, q)?;
    }
    Some(Percentiles {
        p50: values[0],
        p95: values[1],
        p99: values[2],
    })
}

fn quantile(count: u64, ranges: &[(f64, f64)], bucket_counts: &[u64], q: f64) -> Option<f64> {
    let target = q * count as f64;
    let mut cumulative: u64 = 0;
    let last_idx = ranges.len().saturating_sub(1);

    for (i, (&(lower, upper), &bucket_count)) in ranges.iter().zip(bucket_counts.iter()).enumerate() {
        let cum_before = cumulative;
        cumulative += bucket_count;
        if bucket_count == 0 || (cumulative as f64) < target {
            continue;
        }

        if upper.is_infinite() {
            // Overflow bucket: cannot interpolate into infinity.
            return Some(lower);
        }
        if i == last_idx && lower.is_infinite() {
            return Some(upper);
        }

        let effective_lower = if lower.is_infinite() { 0.0 } else { lower };
        let frac = (target - cum_before as f64) / bucket_count as f64;
        return Some(effective_lower + frac * (upper - effective_lower));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_percentiles_scenario_from_design_doc() {
        let bounds = [5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0];
        let counts = [100, 300, 400, 150, 30, 15, 4, 1, 0];
        let p = from_explicit_bounds(1000, &bounds, &counts).unwrap();
        assert!(p.p50 > 10.0 && p.p50 <= 25.0, "p50={}", p.p50);
        assert!(p.p95 > 50.0 && p.p95 <= 250.0, "p95={}", p.p95);
        assert!(p.p99 > 100.0 && p.p99 <= 1000.0, "p99={}", p.p99);
        assert!(p.p50 <= p.p95);
        assert!(p.p95 <= p.p99);
    }

    #[test]
    fn zero_count_returns_none() {
        assert!(from_explicit_bounds(0, &[1.0, 2.0], &[0, 0, 0]).is_none());
    }

    #[test]
    fn all_mass_in_overflow_bucket_returns_last_bound() {
        let bounds = [1.0, 2.0];
        let counts = [0, 0, 10];
        let p = from_explicit_bounds(10, &bounds, &counts).unwrap();
        assert_eq!(p.p50, 2.0);
        assert_eq!(p.p99, 2.0);
    }

    #[test]
    fn exponential_histogram_orders_buckets_before_interpolating() {
        let p = from_exponential_histogram(100, 0, 0, 0, &[50, 50], -1, &[]).unwrap();
        assert!(p.p50 <= p.p95);
        assert!(p.p95 <= p.p99);
    }
}
