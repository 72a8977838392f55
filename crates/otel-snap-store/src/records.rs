//! Projected record types and OTLP decode functions for the three signals.
//!
//! Each record wraps the original OTLP resource/scope/signal tuple (shared,
//! never mutated after ingest — see the design notes on back-references) and
//! adds the pre-extracted fields the query engine and activity cache need
//! without re-walking the protobuf objects on every read.

use std::sync::Arc;

use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::InstrumentationScope;
use opentelemetry_proto::tonic::logs::v1::LogRecord as OtlpLogRecord;
use opentelemetry_proto::tonic::metrics::v1::{Metric as OtlpMetric, metric::Data as MetricData};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::{Span as OtlpSpan, status::StatusCode};

use crate::attrs::extract_service_name;

#[must_use]
pub fn hex_id(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// One span, decorated with pre-extracted fields.
#[derive(Debug, Clone)]
pub struct SpanRecord {
    pub resource: Arc<Resource>,
    pub scope: Arc<InstrumentationScope>,
    pub span: Arc<OtlpSpan>,
    pub trace_id: String,
    pub span_id: String,
    pub service_name: String,
    pub span_name: String,
}

impl SpanRecord {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.span.status.as_ref().map_or(StatusCode::Unset, |s| s.code())
    }

    #[must_use]
    pub fn duration_ns(&self) -> i64 {
        self.span.end_time_unix_nano as i64 - self.span.start_time_unix_nano as i64
    }
}

/// One log record, decorated with pre-extracted fields.
#[derive(Debug, Clone)]
pub struct LogRecordEntry {
    pub resource: Arc<Resource>,
    pub scope: Arc<InstrumentationScope>,
    pub log: Arc<OtlpLogRecord>,
    pub trace_id: String,
    pub span_id: String,
    pub service_name: String,
    pub severity_text: String,
    pub severity_number: i32,
    pub body: String,
    pub timestamp: u64,
}

/// Classification of a metric's data oneof, per §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    Unknown,
    Gauge,
    Sum,
    Histogram,
    ExponentialHistogram,
    Summary,
}

impl MetricType {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Gauge => "Gauge",
            Self::Sum => "Sum",
            Self::Histogram => "Histogram",
            Self::ExponentialHistogram => "ExponentialHistogram",
            Self::Summary => "Summary",
        }
    }
}

/// One metric, decorated with pre-extracted fields.
#[derive(Debug, Clone)]
pub struct MetricRecordEntry {
    pub resource: Arc<Resource>,
    pub scope: Arc<InstrumentationScope>,
    pub metric: Arc<OtlpMetric>,
    pub metric_name: String,
    pub service_name: String,
    pub metric_type: MetricType,
    pub timestamp: u64,
    pub data_point_count: usize,
    pub numeric_value: Option<f64>,
    pub count: Option<u64>,
    pub sum: Option<f64>,
}

/// Decode an `ExportTraceServiceRequest` into flat span records.
#[must_use]
pub fn decode_spans(request: &ExportTraceServiceRequest) -> Vec<SpanRecord> {
    let mut out = Vec::new();
    for resource_spans in &request.resource_spans {
        let resource = Arc::new(resource_spans.resource.clone().unwrap_or_default());
        let service_name = extract_service_name(&resource.attributes);
        for scope_spans in &resource_spans.scope_spans {
            let scope = Arc::new(scope_spans.scope.clone().unwrap_or_default());
            for span in &scope_spans.spans {
                out.push(SpanRecord {
                    resource: resource.clone(),
                    scope: scope.clone(),
                    span: Arc::new(span.clone()),
                    trace_id: hex_id(&span.trace_id),
                    span_id: hex_id(&span.span_id),
                    service_name: service_name.clone(),
                    span_name: span.name.clone(),
                });
            }
        }
    }
    out
}

/// Decode an `ExportLogsServiceRequest` into flat log records.
#[must_use]
pub fn decode_logs(request: &ExportLogsServiceRequest) -> Vec<LogRecordEntry> {
    let mut out = Vec::new();
    for resource_logs in &request.resource_logs {
        let resource = Arc::new(resource_logs.resource.clone().unwrap_or_default());
        let service_name = extract_service_name(&resource.attributes);
        for scope_logs in &resource_logs.scope_logs {
            let scope = Arc::new(scope_logs.scope.clone().unwrap_or_default());
            for log in &scope_logs.log_records {
                let body = log
                    .body
                    .as_ref()
                    .map(crate::attrs::value_to_string)
                    .unwrap_or_default();
                out.push(LogRecordEntry {
                    resource: resource.clone(),
                    scope: scope.clone(),
                    log: Arc::new(log.clone()),
                    trace_id: hex_id(&log.trace_id),
                    span_id: hex_id(&log.span_id),
                    service_name: service_name.clone(),
                    severity_text: log.severity_text.clone(),
                    severity_number: log.severity_number,
                    body,
                    timestamp: if log.time_unix_nano != 0 {
                        log.time_unix_nano
                    } else {
                        log.observed_time_unix_nano
                    },
                });
            }
        }
    }
    out
}

/// Decode an `ExportMetricsServiceRequest` into flat metric records.
#[must_use]
pub fn decode_metrics(request: &ExportMetricsServiceRequest) -> Vec<MetricRecordEntry> {
    let mut out = Vec::new();
    for resource_metrics in &request.resource_metrics {
        let resource = Arc::new(resource_metrics.resource.clone().unwrap_or_default());
        let service_name = extract_service_name(&resource.attributes);
        for scope_metrics in &resource_metrics.scope_metrics {
            let scope = Arc::new(scope_metrics.scope.clone().unwrap_or_default());
            for metric in &scope_metrics.metrics {
                out.push(classify_metric(metric, &resource, &scope, &service_name));
            }
        }
    }
    out
}

fn classify_metric(
    metric: &OtlpMetric,
    resource: &Arc<Resource>,
    scope: &Arc<InstrumentationScope>,
    service_name: &str,
) -> MetricRecordEntry {
    let base = |metric_type: MetricType, timestamp: u64, data_point_count: usize| MetricRecordEntry {
        resource: resource.clone(),
        scope: scope.clone(),
        metric: Arc::new(metric.clone()),
        metric_name: metric.name.clone(),
        service_name: service_name.to_string(),
        metric_type,
        timestamp,
        data_point_count,
        numeric_value: None,
        count: None,
        sum: None,
    };

    match &metric.data {
        Some(MetricData::Gauge(gauge)) => {
            let mut record = base(MetricType::Gauge, 0, gauge.data_points.len());
            if let Some(dp) = gauge.data_points.first() {
                record.timestamp = dp.time_unix_nano;
                record.numeric_value = Some(number_value(dp));
            }
            record
        }
        Some(MetricData::Sum(sum)) => {
            let mut record = base(MetricType::Sum, 0, sum.data_points.len());
            if let Some(dp) = sum.data_points.first() {
                record.timestamp = dp.time_unix_nano;
                record.numeric_value = Some(number_value(dp));
            }
            record
        }
        Some(MetricData::Histogram(hist)) => {
            let mut record = base(MetricType::Histogram, 0, hist.data_points.len());
            if let Some(dp) = hist.data_points.first() {
                record.timestamp = dp.time_unix_nano;
                record.count = Some(dp.count);
                record.sum = dp.sum;
            }
            record
        }
        Some(MetricData::ExponentialHistogram(hist)) => {
            let mut record = base(MetricType::ExponentialHistogram, 0, hist.data_points.len());
            if let Some(dp) = hist.data_points.first() {
                record.timestamp = dp.time_unix_nano;
                record.count = Some(dp.count);
                record.sum = dp.sum;
            }
            record
        }
        Some(MetricData::Summary(summary)) => {
            let mut record = base(MetricType::Summary, 0, summary.data_points.len());
            if let Some(dp) = summary.data_points.first() {
                record.timestamp = dp.time_unix_nano;
                record.count = Some(dp.count);
                record.sum = Some(dp.sum);
            }
            record
        }
        None => base(MetricType::Unknown, 0, 0),
    }
}

/// Extract a Gauge/Sum data point's numeric value.
///
/// The open question in the design notes flags the source's bug of treating
/// a zero value as "unset" and falling back to the other variant; here the
/// oneof variant is checked explicitly instead, so an honest zero survives.
fn number_value(dp: &opentelemetry_proto::tonic::metrics::v1::NumberDataPoint) -> f64 {
    use opentelemetry_proto::tonic::metrics::v1::number_data_point::Value;
    match dp.value {
        Some(Value::AsDouble(d)) => d,
        Some(Value::AsInt(i)) => i as f64,
        None => 0.0,
    }
}
