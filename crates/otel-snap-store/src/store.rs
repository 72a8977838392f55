//! The unified store: composes the three signal stores, the snapshot
//! manager, and the activity cache; exposes ingest, snapshot, query, stats,
//! and reset.

use std::collections::HashMap;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;

use otel_snap_core::error::{Error, Result};

use crate::activity::ActivityCache;
use crate::query::QueryFilter;
use crate::records::{self, LogRecordEntry, MetricRecordEntry, SpanRecord};
use crate::ring::RingSequence;
use crate::snapshot::{Snapshot, SnapshotManager};

/// Per-signal size/capacity/lifetime counters, shared shape across signals.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RingStats {
    pub size: usize,
    pub capacity: usize,
    pub total_written: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceStats {
    pub ring: RingStats,
    pub distinct_trace_ids: usize,
    pub distinct_services: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogStats {
    pub ring: RingStats,
    pub distinct_trace_ids: usize,
    pub distinct_services: usize,
    pub severities: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricStats {
    pub ring: RingStats,
    pub distinct_metric_names: usize,
    pub total_data_points: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub traces: TraceStats,
    pub logs: LogStats,
    pub metrics: MetricStats,
    pub snapshot_count: usize,
}

/// Identical shape used by both `GetSnapshotData` and `Query` results.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub span_count: usize,
    pub log_count: usize,
    pub metric_count: usize,
    pub distinct_services: usize,
    pub distinct_trace_ids: usize,
    pub log_severities: HashMap<String, u64>,
    pub distinct_metric_names: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration: chrono::Duration,
}

#[derive(Debug, Clone)]
pub struct SnapshotData {
    pub time_range: TimeRange,
    pub traces: Vec<SpanRecord>,
    pub logs: Vec<LogRecordEntry>,
    pub metrics: Vec<MetricRecordEntry>,
    pub summary: Summary,
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub traces: Vec<SpanRecord>,
    pub logs: Vec<LogRecordEntry>,
    pub metrics: Vec<MetricRecordEntry>,
    pub summary: Summary,
}

fn summarize(traces: &[SpanRecord], logs: &[LogRecordEntry], metrics: &[MetricRecordEntry]) -> Summary {
    let mut services: HashSet<&str> = HashSet::new();
    let mut trace_ids: HashSet<&str> = HashSet::new();
    for s in traces {
        services.insert(&s.service_name);
        trace_ids.insert(&s.trace_id);
    }
    let mut severities: HashMap<String, u64> = HashMap::new();
    for l in logs {
        services.insert(&l.service_name);
        if !l.trace_id.is_empty() {
            trace_ids.insert(&l.trace_id);
        }
        *severities.entry(l.severity_text.clone()).or_insert(0) += 1;
    }
    let mut metric_names: HashSet<&str> = HashSet::new();
    for m in metrics {
        services.insert(&m.service_name);
        metric_names.insert(&m.metric_name);
    }
    Summary {
        span_count: traces.len(),
        log_count: logs.len(),
        metric_count: metrics.len(),
        distinct_services: services.len(),
        distinct_trace_ids: trace_ids.len(),
        log_severities: severities,
        distinct_metric_names: metric_names.len(),
    }
}

/// Composes the unified store's three ring-backed signal stores, the
/// snapshot manager, and the activity cache.
pub struct UnifiedStore {
    traces: RingSequence<SpanRecord>,
    logs: RingSequence<LogRecordEntry>,
    metrics: RingSequence<MetricRecordEntry>,
    snapshots: SnapshotManager,
    activity: ActivityCache,
}

impl UnifiedStore {
    pub fn new(trace_capacity: usize, log_capacity: usize, metric_capacity: usize) -> Result<Self> {
        Ok(Self {
            traces: RingSequence::new(trace_capacity)?,
            logs: RingSequence::new(log_capacity)?,
            metrics: RingSequence::new(metric_capacity)?,
            snapshots: SnapshotManager::new(),
            activity: ActivityCache::new(),
        })
    }

    #[must_use]
    pub const fn activity(&self) -> &ActivityCache {
        &self.activity
    }

    #[must_use]
    pub const fn snapshots(&self) -> &SnapshotManager {
        &self.snapshots
    }

    pub fn receive_spans(&self, request: &ExportTraceServiceRequest) -> usize {
        let records = records::decode_spans(request);
        let count = records.len();
        for record in records {
            self.activity.record_span(&record);
            self.traces.add(record);
        }
        count
    }

    pub fn receive_logs(&self, request: &ExportLogsServiceRequest) -> usize {
        let records = records::decode_logs(request);
        let count = records.len();
        for record in records {
            self.activity.record_log(&record);
            self.logs.add(record);
        }
        count
    }

    pub fn receive_metrics(&self, request: &ExportMetricsServiceRequest) -> usize {
        let records = records::decode_metrics(request);
        let count = records.len();
        for record in records {
            self.activity.record_metric(&record);
            self.metrics.add(record);
        }
        count
    }

    /// Reads the three current positions sequentially (not jointly atomic —
    /// see the design notes on snapshot atomicity) and records a named
    /// snapshot at that approximate ordering point.
    pub fn create_snapshot(&self, name: &str) -> Result<Snapshot> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("snapshot name must not be empty".to_string()));
        }
        let trace_pos = self.traces.current_position();
        let log_pos = self.logs.current_position();
        let metric_pos = self.metrics.current_position();
        self.snapshots.create(name, trace_pos, log_pos, metric_pos)
    }

    fn current_snapshot(&self) -> Snapshot {
        Snapshot {
            name: "current".to_string(),
            created_at: Utc::now(),
            trace_pos: self.traces.current_position(),
            log_pos: self.logs.current_position(),
            metric_pos: self.metrics.current_position(),
        }
    }

    /// `end_name` of `None`/empty resolves to the live positions, timestamped
    /// at the moment of this call (not at any prior snapshot's creation).
    pub fn get_snapshot_data(&self, start_name: &str, end_name: Option<&str>) -> Result<SnapshotData> {
        let start = self.snapshots.get(start_name)?;
        let end = match end_name {
            Some(name) if !name.is_empty() => self.snapshots.get(name)?,
            _ => self.current_snapshot(),
        };
        if end.created_at < start.created_at {
            return Err(Error::InvalidRange {
                start: start.name.clone(),
                end: end.name.clone(),
            });
        }

        let traces = self.traces.get_range(start.trace_pos as i64, end.trace_pos as i64 - 1);
        let logs = self.logs.get_range(start.log_pos as i64, end.log_pos as i64 - 1);
        let metrics = self.metrics.get_range(start.metric_pos as i64, end.metric_pos as i64 - 1);
        let summary = summarize(&traces, &logs, &metrics);

        Ok(SnapshotData {
            time_range: TimeRange {
                start: start.created_at,
                end: end.created_at,
                duration: end.created_at - start.created_at,
            },
            traces,
            logs,
            metrics,
            summary,
        })
    }

    pub fn query(&self, filter: &QueryFilter) -> Result<QueryResult> {
        let (mut traces, mut logs, mut metrics) = if let Some(start) = &filter.start_snapshot {
            let data = self.get_snapshot_data(start, filter.end_snapshot.as_deref())?;
            (data.traces, data.logs, data.metrics)
        } else {
            (self.traces.get_all(), self.logs.get_all(), self.metrics.get_all())
        };

        traces.retain(|s| filter.matches_span(s));
        logs.retain(|l| filter.matches_log(l));
        metrics.retain(|m| filter.matches_metric(m));

        traces = crate::query::truncate(traces, filter.limit);
        logs = crate::query::truncate(logs, filter.limit);
        metrics = crate::query::truncate(metrics, filter.limit);

        let summary = summarize(&traces, &logs, &metrics);
        Ok(QueryResult { traces, logs, metrics, summary })
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        let traces = self.traces.get_all();
        let trace_services: HashSet<&str> = traces.iter().map(|s| s.service_name.as_str()).collect();
        let trace_ids: HashSet<&str> = traces.iter().map(|s| s.trace_id.as_str()).collect();

        let logs = self.logs.get_all();
        let log_services: HashSet<&str> = logs.iter().map(|l| l.service_name.as_str()).collect();
        let log_trace_ids: HashSet<&str> = logs
            .iter()
            .filter(|l| !l.trace_id.is_empty())
            .map(|l| l.trace_id.as_str())
            .collect();
        let mut severities: HashMap<String, u64> = HashMap::new();
        for l in &logs {
            *severities.entry(l.severity_text.clone()).or_insert(0) += 1;
        }

        let metrics = self.metrics.get_all();
        let metric_names: HashSet<&str> = metrics.iter().map(|m| m.metric_name.as_str()).collect();
        let total_data_points: usize = metrics.iter().map(|m| m.data_point_count).sum();

        Stats {
            traces: TraceStats {
                ring: RingStats {
                    size: self.traces.size(),
                    capacity: self.traces.capacity(),
                    total_written: self.traces.current_position(),
                },
                distinct_trace_ids: trace_ids.len(),
                distinct_services: trace_services.len(),
            },
            logs: LogStats {
                ring: RingStats {
                    size: self.logs.size(),
                    capacity: self.logs.capacity(),
                    total_written: self.logs.current_position(),
                },
                distinct_trace_ids: log_trace_ids.len(),
                distinct_services: log_services.len(),
                severities,
            },
            metrics: MetricStats {
                ring: RingStats {
                    size: self.metrics.size(),
                    capacity: self.metrics.capacity(),
                    total_written: self.metrics.current_position(),
                },
                distinct_metric_names: metric_names.len(),
                total_data_points,
            },
            snapshot_count: self.snapshots.count(),
        }
    }

    /// Complete reset: rings, snapshots, and the activity cache all clear
    /// together. Not atomic across the three rings — matches the snapshot
    /// atomicity trade-off elsewhere in this store.
    pub fn clear(&self) {
        self.traces.clear();
        self.logs.clear();
        self.metrics.clear();
        self.snapshots.clear();
        self.activity.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otel_snap_test_helpers::{build_log, build_root_span, trace_export_request};

    fn store() -> UnifiedStore {
        UnifiedStore::new(10, 10, 10).unwrap()
    }

    #[test]
    fn snapshot_window_scenario_from_design_doc() {
        let store = store();
        store.create_snapshot("A").unwrap();
        let s1 = build_root_span("svc", "s1", false);
        let s2 = build_root_span("svc", "s2", false);
        let s3 = build_root_span("svc", "s3", false);
        store.traces.add(s1);
        store.traces.add(s2);
        store.traces.add(s3);
        store.create_snapshot("B").unwrap();
        store.traces.add(build_root_span("svc", "s4", false));

        let ab = store.get_snapshot_data("A", Some("B")).unwrap();
        assert_eq!(ab.traces.len(), 3);

        let a_current = store.get_snapshot_data("A", None).unwrap();
        assert_eq!(a_current.traces.len(), 4);
    }

    #[test]
    fn create_snapshot_rejects_empty_name() {
        let store = store();
        assert!(store.create_snapshot("").is_err());
    }

    #[test]
    fn filter_by_trace_id_scenario_from_design_doc() {
        let store = store();
        let trace_id = "0102030405060708090a0b0c0d0e0f10";
        let span = otel_snap_test_helpers::build_span(
            "svc", "op", trace_id, "0102030405060708", Vec::new(), 0, 1, opentelemetry_proto::tonic::trace::v1::status::StatusCode::Ok,
        );
        store.traces.add(span);
        store.logs.add(build_log("svc", trace_id, "INFO", 9, "hi", 0));
        store.metrics.add(otel_snap_test_helpers::build_gauge_metric("svc", "m", 1.0, 0));

        let result = store
            .query(&QueryFilter {
                trace_id: Some(trace_id.to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(result.traces.len(), 1);
        assert_eq!(result.logs.len(), 1);
        assert_eq!(result.metrics.len(), 0);
    }

    #[test]
    fn status_and_duration_scenario_from_design_doc() {
        let store = store();
        store.traces.add(otel_snap_test_helpers::build_span(
            "svc", "a", "01", "01", Vec::new(), 0, 100_000_000,
            opentelemetry_proto::tonic::trace::v1::status::StatusCode::Ok,
        ));
        store.traces.add(otel_snap_test_helpers::build_span(
            "svc", "b", "02", "02", Vec::new(), 0, 50_000_000,
            opentelemetry_proto::tonic::trace::v1::status::StatusCode::Error,
        ));
        store.traces.add(otel_snap_test_helpers::build_span(
            "svc", "c", "03", "03", Vec::new(), 0, 200_000_000,
            opentelemetry_proto::tonic::trace::v1::status::StatusCode::Ok,
        ));

        let errors = store.query(&QueryFilter { errors_only: true, ..Default::default() }).unwrap();
        assert_eq!(errors.traces.len(), 1);
        assert_eq!(errors.traces[0].span_name, "b");

        let slow = store
            .query(&QueryFilter { min_duration_ns: Some(150_000_000), ..Default::default() })
            .unwrap();
        assert_eq!(slow.traces.len(), 1);
        assert_eq!(slow.traces[0].span_name, "c");

        let both = store
            .query(&QueryFilter {
                errors_only: true,
                min_duration_ns: Some(150_000_000),
                ..Default::default()
            })
            .unwrap();
        assert!(both.traces.is_empty());
    }

    #[test]
    fn severity_count_scenario_from_design_doc() {
        let store = store();
        store.create_snapshot("start").unwrap();
        store.logs.add(build_log("svc", "", "INFO", 9, "a", 0));
        store.logs.add(build_log("svc", "", "INFO", 9, "b", 0));
        store.logs.add(build_log("svc", "", "ERROR", 17, "c", 0));
        let data = store.get_snapshot_data("start", None).unwrap();
        assert_eq!(data.summary.log_severities.get("INFO"), Some(&2));
        assert_eq!(data.summary.log_severities.get("ERROR"), Some(&1));
    }

    #[test]
    fn clear_resets_rings_snapshots_and_activity() {
        let store = store();
        store.receive_spans(&trace_export_request("svc", otel_snap_test_helpers::otlp_span(
            vec![1], vec![2], Vec::new(), "op", 0, 1,
            opentelemetry_proto::tonic::trace::v1::status::StatusCode::Ok,
        )));
        store.create_snapshot("a").unwrap();
        store.clear();
        assert_eq!(store.stats().traces.ring.size, 0);
        assert_eq!(store.stats().snapshot_count, 0);
        assert_eq!(store.activity().spans_received(), 0);
    }
}
