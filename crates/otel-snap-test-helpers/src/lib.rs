//! OTLP payload and record builders shared across otel-snap test suites.

use std::sync::Arc;

use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::{AnyValue, InstrumentationScope, KeyValue, any_value::Value};
use opentelemetry_proto::tonic::logs::v1::{LogRecord as OtlpLogRecord, ResourceLogs, ScopeLogs};
use opentelemetry_proto::tonic::metrics::v1::{
    Gauge, Histogram, HistogramDataPoint, Metric as OtlpMetric, NumberDataPoint, ResourceMetrics, ScopeMetrics,
    metric::Data as MetricData, number_data_point::Value as NumberValue,
};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span as OtlpSpan, Status, status::StatusCode};

use otel_snap_store::records::{LogRecordEntry, MetricRecordEntry, MetricType, SpanRecord};

#[must_use]
pub fn string_attr(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(Value::StringValue(value.to_string())),
        }),
    }
}

#[must_use]
pub fn service_resource(name: &str) -> Resource {
    Resource {
        attributes: vec![string_attr("service.name", name)],
        ..Default::default()
    }
}

/// Build a raw OTLP span with the given trace/span id bytes.
#[must_use]
pub fn otlp_span(
    trace_id: Vec<u8>,
    span_id: Vec<u8>,
    parent_span_id: Vec<u8>,
    name: &str,
    start_ns: u64,
    end_ns: u64,
    status_code: StatusCode,
) -> OtlpSpan {
    OtlpSpan {
        trace_id,
        span_id,
        parent_span_id,
        name: name.to_string(),
        start_time_unix_nano: start_ns,
        end_time_unix_nano: end_ns,
        status: Some(Status {
            code: status_code as i32,
            message: if status_code == StatusCode::Error {
                "boom".to_string()
            } else {
                String::new()
            },
        }),
        ..Default::default()
    }
}

/// Build a fully decorated [`SpanRecord`] directly, bypassing OTLP decode,
/// for unit tests that only care about the projected fields.
#[must_use]
pub fn build_span(
    service: &str,
    name: &str,
    trace_id: &str,
    span_id: &str,
    parent_span_id: Vec<u8>,
    start_ns: u64,
    end_ns: u64,
    status_code: StatusCode,
) -> SpanRecord {
    let span = otlp_span(
        hex::decode(trace_id).unwrap_or_default(),
        hex::decode(span_id).unwrap_or_default(),
        parent_span_id,
        name,
        start_ns,
        end_ns,
        status_code,
    );
    SpanRecord {
        resource: Arc::new(service_resource(service)),
        scope: Arc::new(InstrumentationScope::default()),
        span: Arc::new(span),
        trace_id: trace_id.to_string(),
        span_id: span_id.to_string(),
        service_name: service.to_string(),
        span_name: name.to_string(),
    }
}

#[must_use]
pub fn build_root_span(service: &str, name: &str, is_error: bool) -> SpanRecord {
    let status = if is_error { StatusCode::Error } else { StatusCode::Ok };
    build_span(
        service,
        name,
        "0102030405060708090a0b0c0d0e0f10",
        "0102030405060708",
        Vec::new(),
        0,
        100_000_000,
        status,
    )
}

#[must_use]
pub fn build_error_span(service: &str, name: &str) -> SpanRecord {
    build_root_span(service, name, true)
}

#[must_use]
pub fn build_log(service: &str, trace_id: &str, severity_text: &str, severity_number: i32, body: &str, timestamp: u64) -> LogRecordEntry {
    let log = OtlpLogRecord {
        trace_id: hex::decode(trace_id).unwrap_or_default(),
        severity_text: severity_text.to_string(),
        severity_number,
        body: Some(AnyValue {
            value: Some(Value::StringValue(body.to_string())),
        }),
        time_unix_nano: timestamp,
        ..Default::default()
    };
    LogRecordEntry {
        resource: Arc::new(service_resource(service)),
        scope: Arc::new(InstrumentationScope::default()),
        log: Arc::new(log),
        trace_id: trace_id.to_string(),
        span_id: String::new(),
        service_name: service.to_string(),
        severity_text: severity_text.to_string(),
        severity_number,
        body: body.to_string(),
        timestamp,
    }
}

#[must_use]
pub fn build_histogram_datapoint(
    service: &str,
    metric_name: &str,
    explicit_bounds: Vec<f64>,
    bucket_counts: Vec<u64>,
    count: u64,
    sum: f64,
    timestamp: u64,
) -> MetricRecordEntry {
    let metric = OtlpMetric {
        name: metric_name.to_string(),
        data: Some(MetricData::Histogram(Histogram {
            data_points: vec![HistogramDataPoint {
                time_unix_nano: timestamp,
                count,
                sum: Some(sum),
                explicit_bounds,
                bucket_counts,
                ..Default::default()
            }],
            ..Default::default()
        })),
        ..Default::default()
    };
    MetricRecordEntry {
        resource: Arc::new(service_resource(service)),
        scope: Arc::new(InstrumentationScope::default()),
        metric: Arc::new(metric),
        metric_name: metric_name.to_string(),
        service_name: service.to_string(),
        metric_type: MetricType::Histogram,
        timestamp,
        data_point_count: 1,
        numeric_value: None,
        count: Some(count),
        sum: Some(sum),
    }
}

#[must_use]
pub fn build_gauge_metric(service: &str, metric_name: &str, value: f64, timestamp: u64) -> MetricRecordEntry {
    let metric = OtlpMetric {
        name: metric_name.to_string(),
        data: Some(MetricData::Gauge(Gauge {
            data_points: vec![NumberDataPoint {
                time_unix_nano: timestamp,
                value: Some(NumberValue::AsDouble(value)),
                ..Default::default()
            }],
        })),
        ..Default::default()
    };
    MetricRecordEntry {
        resource: Arc::new(service_resource(service)),
        scope: Arc::new(InstrumentationScope::default()),
        metric: Arc::new(metric),
        metric_name: metric_name.to_string(),
        service_name: service.to_string(),
        metric_type: MetricType::Gauge,
        timestamp,
        data_point_count: 1,
        numeric_value: Some(value),
        count: None,
        sum: None,
    }
}

/// Wrap a single span into a minimal `ExportTraceServiceRequest`.
#[must_use]
pub fn trace_export_request(service: &str, span: OtlpSpan) -> ExportTraceServiceRequest {
    ExportTraceServiceRequest {
        resource_spans: vec![ResourceSpans {
            resource: Some(service_resource(service)),
            scope_spans: vec![ScopeSpans {
                spans: vec![span],
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

#[must_use]
pub fn logs_export_request(service: &str, log: OtlpLogRecord) -> ExportLogsServiceRequest {
    ExportLogsServiceRequest {
        resource_logs: vec![ResourceLogs {
            resource: Some(service_resource(service)),
            scope_logs: vec![ScopeLogs {
                log_records: vec![log],
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

#[must_use]
pub fn metrics_export_request(service: &str, metric: OtlpMetric) -> ExportMetricsServiceRequest {
    ExportMetricsServiceRequest {
        resource_metrics: vec![ResourceMetrics {
            resource: Some(service_resource(service)),
            scope_metrics: vec![ScopeMetrics {
                metrics: vec![metric],
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}
