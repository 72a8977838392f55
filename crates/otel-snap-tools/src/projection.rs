//! JSON projections of store records for the agent-tool RPC surface.
//!
//! Attribute maps are capped at [`ATTRIBUTE_CAP`] entries (insertion order,
//! first-seen-wins) to keep query/snapshot payloads bounded regardless of
//! how many attributes an instrumented program attaches to a record.

use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value::Value};
use otel_snap_store::records::{LogRecordEntry, MetricRecordEntry, SpanRecord};
use serde::Serialize;
use serde_json::{Map, Value as Json};

pub const ATTRIBUTE_CAP: usize = 20;

/// Convert an OTLP `AnyValue` to a native JSON value (not a lossy string
/// projection — arrays and kvlists map onto JSON arrays/objects).
#[must_use]
pub fn any_value_to_json(value: &AnyValue) -> Json {
    match &value.value {
        Some(Value::StringValue(s)) => Json::String(s.clone()),
        Some(Value::BoolValue(b)) => Json::Bool(*b),
        Some(Value::IntValue(i)) => Json::from(*i),
        Some(Value::DoubleValue(d)) => serde_json::Number::from_f64(*d).map_or(Json::Null, Json::Number),
        Some(Value::ArrayValue(arr)) => Json::Array(arr.values.iter().map(any_value_to_json).collect()),
        Some(Value::KvlistValue(kv)) => {
            let mut map = Map::new();
            for entry in &kv.values {
                let v = entry.value.as_ref().map_or(Json::Null, any_value_to_json);
                map.insert(entry.key.clone(), v);
            }
            Json::Object(map)
        }
        Some(Value::BytesValue(bytes)) => Json::String(hex::encode(bytes)),
        None => Json::Null,
    }
}

/// Project up to [`ATTRIBUTE_CAP`] attributes into a JSON object.
#[must_use]
pub fn attrs_to_json_capped(attributes: &[KeyValue]) -> Json {
    let mut map = Map::new();
    for kv in attributes.iter().take(ATTRIBUTE_CAP) {
        let v = kv.value.as_ref().map_or(Json::Null, any_value_to_json);
        map.insert(kv.key.clone(), v);
    }
    Json::Object(map)
}

#[derive(Debug, Clone, Serialize)]
pub struct SpanProjection {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub service_name: String,
    pub span_name: String,
    pub start_time_unix_nano: u64,
    pub end_time_unix_nano: u64,
    pub duration_ns: i64,
    pub status_code: String,
    pub status_message: String,
    pub attributes: Json,
}

impl From<&SpanRecord> for SpanProjection {
    fn from(record: &SpanRecord) -> Self {
        let status = record.span.status.as_ref();
        Self {
            trace_id: record.trace_id.clone(),
            span_id: record.span_id.clone(),
            parent_span_id: hex::encode(&record.span.parent_span_id),
            service_name: record.service_name.clone(),
            span_name: record.span_name.clone(),
            start_time_unix_nano: record.span.start_time_unix_nano,
            end_time_unix_nano: record.span.end_time_unix_nano,
            duration_ns: record.duration_ns(),
            status_code: format!("{:?}", record.status_code()),
            status_message: status.map_or_else(String::new, |s| s.message.clone()),
            attributes: attrs_to_json_capped(&record.span.attributes),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogProjection {
    pub trace_id: String,
    pub span_id: String,
    pub service_name: String,
    pub severity_text: String,
    pub severity_number: i32,
    pub body: String,
    pub timestamp: u64,
    pub attributes: Json,
}

impl From<&LogRecordEntry> for LogProjection {
    fn from(record: &LogRecordEntry) -> Self {
        Self {
            trace_id: record.trace_id.clone(),
            span_id: record.span_id.clone(),
            service_name: record.service_name.clone(),
            severity_text: record.severity_text.clone(),
            severity_number: record.severity_number,
            body: record.body.clone(),
            timestamp: record.timestamp,
            attributes: attrs_to_json_capped(&record.log.attributes),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricProjection {
    pub metric_name: String,
    pub service_name: String,
    pub metric_type: String,
    pub timestamp: u64,
    pub data_point_count: usize,
    pub numeric_value: Option<f64>,
    pub count: Option<u64>,
    pub sum: Option<f64>,
    pub attributes: Json,
}

impl From<&MetricRecordEntry> for MetricProjection {
    fn from(record: &MetricRecordEntry) -> Self {
        Self {
            metric_name: record.metric_name.clone(),
            service_name: record.service_name.clone(),
            metric_type: record.metric_type.label().to_string(),
            timestamp: record.timestamp,
            data_point_count: record.data_point_count,
            numeric_value: record.numeric_value,
            count: record.count,
            sum: record.sum,
            // Metrics carry attributes per data point, not on the metric
            // itself; the resource's attributes are the closest bounded set
            // available without re-walking every data point.
            attributes: attrs_to_json_capped(&record.resource.attributes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otel_snap_test_helpers::{build_gauge_metric, build_log, build_root_span};

    #[test]
    fn attribute_cap_truncates_at_twenty() {
        let attrs: Vec<KeyValue> = (0..30)
            .map(|i| KeyValue {
                key: format!("k{i}"),
                value: Some(AnyValue { value: Some(Value::IntValue(i)) }),
            })
            .collect();
        let Json::Object(map) = attrs_to_json_capped(&attrs) else {
            panic!("expected object");
        };
        assert_eq!(map.len(), ATTRIBUTE_CAP);
    }

    #[test]
    fn span_projection_carries_duration_and_status() {
        let span = build_root_span("checkout", "handle", false);
        let projection = SpanProjection::from(&span);
        assert_eq!(projection.service_name, "checkout");
        assert_eq!(projection.duration_ns, 100_000_000);
        assert_eq!(projection.status_code, "Ok");
    }

    #[test]
    fn log_projection_carries_body_and_severity() {
        let log = build_log("auth", "", "INFO", 9, "boot", 42);
        let projection = LogProjection::from(&log);
        assert_eq!(projection.body, "boot");
        assert_eq!(projection.timestamp, 42);
    }

    #[test]
    fn metric_projection_carries_numeric_value() {
        let metric = build_gauge_metric("billing", "queue_depth", 3.5, 7);
        let projection = MetricProjection::from(&metric);
        assert_eq!(projection.numeric_value, Some(3.5));
        assert_eq!(projection.metric_type, "Gauge");
    }
}
