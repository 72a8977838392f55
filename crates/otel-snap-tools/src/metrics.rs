//! Global tool metrics tracking.
//!
//! - Thread-safe atomic counters for calls/errors per tool
//! - Per-tool latency histograms with streaming P50/P95/P99
//! - `tool_metrics_snapshot()` returns the subset of tools that have been
//!   called at least once; `tool_metrics_snapshot_full()` returns all of them
//!
//! Call `record_call(tool_name)` / `record_error(tool_name)` from tool
//! handlers, and `record_latency(tool_name, latency_us)` once a call completes.

#![forbid(unsafe_code)]

use std::sync::LazyLock;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use otel_snap_core::metrics::Log2Histogram;
use serde::{Deserialize, Serialize};

/// The fixed set of agent-facing tools this crate exposes, in registration order.
pub const TOOL_NAMES: &[&str] = &[
    "get_otlp_endpoints",
    "create_snapshot",
    "query",
    "get_snapshot_data",
    "manage_snapshots",
    "get_stats",
    "clear_data",
];

const TOOL_COUNT: usize = TOOL_NAMES.len();

/// Threshold in microseconds: tools with p95 above this are flagged as slow.
const SLOW_TOOL_P95_THRESHOLD_US: u64 = 500_000; // 500ms

static TOOL_CALLS: LazyLock<[AtomicU64; TOOL_COUNT]> = LazyLock::new(|| std::array::from_fn(|_| AtomicU64::new(0)));
static TOOL_ERRORS: LazyLock<[AtomicU64; TOOL_COUNT]> = LazyLock::new(|| std::array::from_fn(|_| AtomicU64::new(0)));
static TOOL_LATENCIES: LazyLock<[RwLock<Log2Histogram>; TOOL_COUNT]> =
    LazyLock::new(|| std::array::from_fn(|_| RwLock::new(Log2Histogram::new())));

/// Convert tool name -> stable index into the pre-allocated counter arrays.
///
/// The index corresponds to the tool's position in `TOOL_NAMES`.
#[must_use]
pub fn tool_index(tool_name: &str) -> Option<usize> {
    TOOL_NAMES.iter().position(|&name| name == tool_name)
}

#[inline]
pub fn record_call_idx(tool_index: usize) {
    debug_assert!(tool_index < TOOL_COUNT);
    if let Some(counter) = TOOL_CALLS.get(tool_index) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[inline]
pub fn record_error_idx(tool_index: usize) {
    debug_assert!(tool_index < TOOL_COUNT);
    if let Some(counter) = TOOL_ERRORS.get(tool_index) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Record a successful tool call.
pub fn record_call(tool_name: &str) {
    if let Some(idx) = tool_index(tool_name) {
        record_call_idx(idx);
    } else {
        debug_assert!(false, "record_call called with unknown tool name: {tool_name}");
    }
}

/// Record a tool error.
pub fn record_error(tool_name: &str) {
    if let Some(idx) = tool_index(tool_name) {
        record_error_idx(idx);
    } else {
        debug_assert!(false, "record_error called with unknown tool name: {tool_name}");
    }
}

/// Record per-tool latency in microseconds.
#[inline]
pub fn record_latency_idx(tool_index: usize, latency_us: u64) {
    debug_assert!(tool_index < TOOL_COUNT);
    if let Some(hist) = TOOL_LATENCIES.get(tool_index) {
        hist.write().unwrap_or_else(std::sync::PoisonError::into_inner).record(latency_us);
    }
}

/// Record per-tool latency by name (convenience wrapper).
pub fn record_latency(tool_name: &str, latency_us: u64) {
    if let Some(idx) = tool_index(tool_name) {
        record_latency_idx(idx, latency_us);
    }
}

/// Clear all tool metrics counters (calls, errors, and latency histograms).
///
/// Intended for tests that need deterministic snapshots across multiple tool calls.
pub fn reset_tool_metrics() {
    for counter in TOOL_CALLS.iter() {
        counter.store(0, Ordering::Relaxed);
    }
    for counter in TOOL_ERRORS.iter() {
        counter.store(0, Ordering::Relaxed);
    }
    reset_tool_latencies();
}

/// Reset only the per-tool latency histograms (rolling-window support).
pub fn reset_tool_latencies() {
    for hist in TOOL_LATENCIES.iter() {
        hist.write().unwrap_or_else(std::sync::PoisonError::into_inner).reset();
    }
}

/// Per-tool latency statistics in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencySnapshot {
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    /// True if p95 exceeds the slow-tool threshold (500ms).
    pub is_slow: bool,
}

/// A single entry in a metrics snapshot: call/error counters plus latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshotEntry {
    pub name: String,
    pub calls: u64,
    pub errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencySnapshot>,
}

#[inline]
#[allow(clippy::cast_precision_loss)]
fn us_to_ms(us: u64) -> f64 {
    us as f64 / 1000.0
}

fn latency_snapshot_for(idx: usize) -> Option<LatencySnapshot> {
    let hs = TOOL_LATENCIES[idx].read().unwrap_or_else(std::sync::PoisonError::into_inner).snapshot();
    if hs.count == 0 {
        return None;
    }
    let avg_us = hs.sum.checked_div(hs.count).unwrap_or(0);
    Some(LatencySnapshot {
        avg_ms: us_to_ms(avg_us),
        min_ms: us_to_ms(hs.min),
        max_ms: us_to_ms(hs.max),
        p50_ms: us_to_ms(hs.p50),
        p95_ms: us_to_ms(hs.p95),
        p99_ms: us_to_ms(hs.p99),
        is_slow: hs.p95 > SLOW_TOOL_P95_THRESHOLD_US,
    })
}

/// Produce a sorted metrics snapshot covering only tools that have been called.
#[must_use]
pub fn tool_metrics_snapshot() -> Vec<MetricsSnapshotEntry> {
    let mut entries: Vec<MetricsSnapshotEntry> = TOOL_NAMES
        .iter()
        .enumerate()
        .filter_map(|(idx, &name)| {
            let calls = TOOL_CALLS[idx].load(Ordering::Relaxed);
            if calls == 0 {
                return None;
            }
            Some(MetricsSnapshotEntry {
                name: name.to_string(),
                calls,
                errors: TOOL_ERRORS[idx].load(Ordering::Relaxed),
                latency: latency_snapshot_for(idx),
            })
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

/// Return a snapshot including all seven tools, even those with zero calls.
#[must_use]
pub fn tool_metrics_snapshot_full() -> Vec<MetricsSnapshotEntry> {
    let mut entries: Vec<MetricsSnapshotEntry> = TOOL_NAMES
        .iter()
        .enumerate()
        .map(|(idx, &name)| MetricsSnapshotEntry {
            name: name.to_string(),
            calls: TOOL_CALLS[idx].load(Ordering::Relaxed),
            errors: TOOL_ERRORS[idx].load(Ordering::Relaxed),
            latency: latency_snapshot_for(idx),
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

/// Return only tools flagged as slow (p95 above the threshold).
#[must_use]
pub fn slow_tools() -> Vec<MetricsSnapshotEntry> {
    tool_metrics_snapshot().into_iter().filter(|e| e.latency.as_ref().is_some_and(|l| l.is_slow)).collect()
}
