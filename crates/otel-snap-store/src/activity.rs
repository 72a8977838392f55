//! Lock-free-ish counters, recent-errors ring, recent-traces table, metric
//! peek map, and a coalescing subscriber fan-out — all for "what changed?"
//! poll-style tools and a real-time subscription surface.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::sync::RwLock;
use std::time::Instant;

use opentelemetry_proto::tonic::metrics::v1::metric::Data as MetricData;
use opentelemetry_proto::tonic::trace::v1::status::StatusCode;

use otel_snap_core::metrics::Counter;

use crate::percentile::{self, Percentiles};
use crate::records::{LogRecordEntry, MetricRecordEntry, MetricType, SpanRecord};

const RECENT_ERRORS_CAPACITY: usize = 100;
const RECENT_TRACES_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
pub struct RecentError {
    pub trace_id: String,
    pub span_id: String,
    pub service: String,
    pub span_name: String,
    pub error_msg: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStatus {
    Ok,
    Error,
    Unset,
}

#[derive(Debug, Clone)]
pub struct RecentTrace {
    pub trace_id: String,
    pub service: String,
    pub root_span: String,
    pub status: TraceStatus,
    pub duration_ms: f64,
    pub error_msg: Option<String>,
    pub timestamp: u64,
    pub span_count: u64,
    pub has_root: bool,
}

struct RecentTraces {
    by_key: HashMap<String, RecentTrace>,
    trace_to_key: HashMap<String, String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl RecentTraces {
    fn new(capacity: usize) -> Self {
        Self {
            by_key: HashMap::new(),
            trace_to_key: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn rekey(&mut self, old_key: &str, new_key: String) {
        if old_key == new_key {
            return;
        }
        if let Some(entry) = self.by_key.remove(old_key) {
            self.order.retain(|k| k != old_key);
            self.trace_to_key.insert(entry.trace_id.clone(), new_key.clone());
            self.order.push_back(new_key.clone());
            self.by_key.insert(new_key, entry);
        }
    }

    fn insert_new(&mut self, key: String, entry: RecentTrace) {
        // Dedup: an existing entry at this key for a different trace id is replaced.
        if let Some(old) = self.by_key.remove(&key) {
            self.trace_to_key.remove(&old.trace_id);
            self.order.retain(|k| k != &key);
        }
        self.trace_to_key.insert(entry.trace_id.clone(), key.clone());
        self.order.push_back(key.clone());
        self.by_key.insert(key, entry);

        while self.order.len() > self.capacity {
            if let Some(evicted_key) = self.order.pop_front() {
                if let Some(evicted) = self.by_key.remove(&evicted_key) {
                    self.trace_to_key.remove(&evicted.trace_id);
                }
            }
        }
    }

    fn record_span(&mut self, span: &SpanRecord) {
        let is_root = span.span.parent_span_id.is_empty();
        let is_error = span.status_code() == StatusCode::Error;
        let error_msg = span.span.status.as_ref().map(|s| s.message.clone());

        if let Some(key) = self.trace_to_key.get(&span.trace_id).cloned() {
            let new_key = format!("{}:{}", span.service_name, span.span_name);
            let should_rekey = is_root
                && self
                    .by_key
                    .get(&key)
                    .is_some_and(|entry| !entry.has_root);
            if should_rekey {
                self.rekey(&key, new_key.clone());
            }
            let active_key = if should_rekey { new_key } else { key };
            if let Some(entry) = self.by_key.get_mut(&active_key) {
                entry.span_count += 1;
                if is_root && !entry.has_root {
                    entry.has_root = true;
                    entry.duration_ms = span.duration_ns() as f64 / 1_000_000.0;
                    entry.timestamp = span.span.start_time_unix_nano;
                }
                if is_error {
                    entry.status = TraceStatus::Error;
                    entry.error_msg = error_msg;
                }
            }
            return;
        }

        let key = format!("{}:{}", span.service_name, span.span_name);
        let status = if is_error {
            TraceStatus::Error
        } else {
            match span.status_code() {
                StatusCode::Ok => TraceStatus::Ok,
                StatusCode::Error => TraceStatus::Error,
                StatusCode::Unset => TraceStatus::Unset,
            }
        };
        let entry = RecentTrace {
            trace_id: span.trace_id.clone(),
            service: span.service_name.clone(),
            root_span: span.span_name.clone(),
            status,
            duration_ms: if is_root {
                span.duration_ns() as f64 / 1_000_000.0
            } else {
                0.0
            },
            error_msg,
            timestamp: span.span.start_time_unix_nano,
            span_count: 1,
            has_root: is_root,
        };
        self.insert_new(key, entry);
    }

    fn recent(&self, n: usize) -> Vec<RecentTrace> {
        self.order
            .iter()
            .rev()
            .take(n)
            .filter_map(|k| self.by_key.get(k).cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricPeek {
    pub metric_type: Option<MetricType>,
    pub last_updated: u64,
    pub value: f64,
    pub count: Option<u64>,
    pub sum: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub percentiles: Option<Percentiles>,
}

pub struct ActivityCache {
    spans_received: Counter,
    logs_received: Counter,
    metrics_received: Counter,
    generation: AtomicU64,
    recent_errors: RwLock<VecDeque<RecentError>>,
    recent_traces: RwLock<RecentTraces>,
    metric_peek: RwLock<HashMap<String, MetricPeek>>,
    subscribers: RwLock<HashMap<u64, SyncSender<()>>>,
    next_subscriber_id: AtomicU64,
    start_time: Instant,
}

impl Default for ActivityCache {
    fn default() -> Self {
        Self {
            spans_received: Counter::new(),
            logs_received: Counter::new(),
            metrics_received: Counter::new(),
            generation: AtomicU64::new(0),
            recent_errors: RwLock::new(VecDeque::with_capacity(RECENT_ERRORS_CAPACITY)),
            recent_traces: RwLock::new(RecentTraces::new(RECENT_TRACES_CAPACITY)),
            metric_peek: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            next_subscriber_id: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl ActivityCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_span(&self, span: &SpanRecord) {
        self.spans_received.inc();
        if span.status_code() == StatusCode::Error {
            let mut errors = self.recent_errors.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            if errors.len() >= RECENT_ERRORS_CAPACITY {
                errors.pop_front();
            }
            errors.push_back(RecentError {
                trace_id: span.trace_id.clone(),
                span_id: span.span_id.clone(),
                service: span.service_name.clone(),
                span_name: span.span_name.clone(),
                error_msg: span.span.status.as_ref().map_or_else(String::new, |s| s.message.clone()),
                timestamp: span.span.start_time_unix_nano,
            });
        }
        self.recent_traces
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .record_span(span);
        self.bump_generation_and_notify();
    }

    pub fn record_log(&self, _log: &LogRecordEntry) {
        self.logs_received.inc();
        self.bump_generation_and_notify();
    }

    pub fn record_metric(&self, metric: &MetricRecordEntry) {
        self.metrics_received.inc();
        self.update_metric_peek(metric);
        self.bump_generation_and_notify();
    }

    fn update_metric_peek(&self, metric: &MetricRecordEntry) {
        let mut peek = self.metric_peek.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = peek.entry(metric.metric_name.clone()).or_default();
        entry.metric_type = Some(metric.metric_type);
        entry.last_updated = metric.timestamp;
        let value = metric.numeric_value.or(metric.sum).unwrap_or(0.0);
        entry.value = value;
        entry.count = metric.count;
        entry.sum = metric.sum;
        if entry.min == 0.0 && entry.max == 0.0 {
            entry.min = value;
            entry.max = value;
        } else {
            entry.min = entry.min.min(value);
            entry.max = entry.max.max(value);
        }
        entry.percentiles = histogram_percentiles(metric);
    }

    fn bump_generation_and_notify(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
        let subscribers = self.subscribers.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        for tx in subscribers.values() {
            // Non-blocking: a slow subscriber just misses this notification.
            let _ = tx.try_send(());
        }
    }

    #[must_use]
    pub fn spans_received(&self) -> u64 {
        self.spans_received.load()
    }

    #[must_use]
    pub fn logs_received(&self) -> u64 {
        self.logs_received.load()
    }

    #[must_use]
    pub fn metrics_received(&self) -> u64 {
        self.metrics_received.load()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn recent_errors(&self, n: usize) -> Vec<RecentError> {
        self.recent_errors
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .rev()
            .take(n)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn recent_traces(&self, n: usize) -> Vec<RecentTrace> {
        self.recent_traces.read().unwrap_or_else(std::sync::PoisonError::into_inner).recent(n)
    }

    #[must_use]
    pub fn peek_metrics(&self, names: &[String]) -> HashMap<String, MetricPeek> {
        let peek = self.metric_peek.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        if names.is_empty() {
            return peek.clone();
        }
        names
            .iter()
            .filter_map(|name| peek.get(name).map(|p| (name.clone(), p.clone())))
            .collect()
    }

    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Register a new subscriber; returns its receiving end and an id to
    /// pass to [`Self::unsubscribe`].
    pub fn subscribe(&self) -> (Receiver<()>, u64) {
        let (tx, rx) = sync_channel(1);
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().unwrap_or_else(std::sync::PoisonError::into_inner).insert(id, tx);
        (rx, id)
    }

    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.write().unwrap_or_else(std::sync::PoisonError::into_inner).remove(&id);
    }

    pub fn clear(&self) {
        self.spans_received.reset();
        self.logs_received.reset();
        self.metrics_received.reset();
        self.generation.store(0, Ordering::Relaxed);
        self.recent_errors.write().unwrap_or_else(std::sync::PoisonError::into_inner).clear();
        *self.recent_traces.write().unwrap_or_else(std::sync::PoisonError::into_inner) =
            RecentTraces::new(RECENT_TRACES_CAPACITY);
        self.metric_peek.write().unwrap_or_else(std::sync::PoisonError::into_inner).clear();
    }
}

fn histogram_percentiles(metric: &MetricRecordEntry) -> Option<Percentiles> {
    match &metric.metric.data {
        Some(MetricData::Histogram(hist)) => {
            let dp = hist.data_points.first()?;
            percentile::from_explicit_bounds(dp.count, &dp.explicit_bounds, &dp.bucket_counts)
        }
        Some(MetricData::ExponentialHistogram(hist)) => {
            let dp = hist.data_points.first()?;
            let (pos_offset, pos_counts) = dp
                .positive
                .as_ref()
                .map_or((0, Vec::new()), |b| (b.offset, b.bucket_counts.clone()));
            let (neg_offset, neg_counts) = dp
                .negative
                .as_ref()
                .map_or((0, Vec::new()), |b| (b.offset, b.bucket_counts.clone()));
            percentile::from_exponential_histogram(
                dp.count,
                dp.scale,
                dp.zero_count,
                pos_offset,
                &pos_counts,
                neg_offset,
                &neg_counts,
            )
        }
        _ => None,
    }
}
