//! Multi-signal filter shape and per-record predicate matching.
//!
//! Range selection (which working set a query starts from) lives in
//! [`crate::store::UnifiedStore::query`]; this module only judges whether a
//! single record satisfies the filter's predicates.

use std::collections::HashMap;

use opentelemetry_proto::tonic::trace::v1::status::StatusCode;

use crate::attrs::{attributes_equal, has_attribute};
use crate::records::{LogRecordEntry, MetricRecordEntry, SpanRecord};

#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub service_name: Option<String>,
    pub trace_id: Option<String>,
    pub span_name: Option<String>,
    pub log_severity: Option<String>,
    pub metric_names: Option<Vec<String>>,
    pub start_snapshot: Option<String>,
    pub end_snapshot: Option<String>,
    pub limit: usize,
    pub errors_only: bool,
    pub span_status: Option<String>,
    pub min_duration_ns: Option<i64>,
    pub max_duration_ns: Option<i64>,
    pub has_attribute: Option<String>,
    pub attribute_equals: Option<HashMap<String, String>>,
}

impl QueryFilter {
    fn wanted_status(&self) -> Option<StatusCode> {
        if self.errors_only {
            return Some(StatusCode::Error);
        }
        self.span_status.as_deref().and_then(parse_status)
    }

    #[must_use]
    pub fn matches_span(&self, span: &SpanRecord) -> bool {
        if let Some(want) = &self.service_name {
            if &span.service_name != want {
                return false;
            }
        }
        if let Some(want) = &self.trace_id {
            if &span.trace_id != want {
                return false;
            }
        }
        if let Some(want) = &self.span_name {
            if &span.span_name != want {
                return false;
            }
        }
        if let Some(want) = self.wanted_status() {
            if span.status_code() != want {
                return false;
            }
        }
        let duration = span.duration_ns();
        if let Some(min) = self.min_duration_ns {
            if duration < min {
                return false;
            }
        }
        if let Some(max) = self.max_duration_ns {
            if duration > max {
                return false;
            }
        }
        if let Some(key) = &self.has_attribute {
            if !has_attribute(&span.span.attributes, key) {
                return false;
            }
        }
        if let Some(expected) = &self.attribute_equals {
            if !attributes_equal(&span.span.attributes, expected) {
                return false;
            }
        }
        true
    }

    #[must_use]
    pub fn matches_log(&self, log: &LogRecordEntry) -> bool {
        if let Some(want) = &self.service_name {
            if &log.service_name != want {
                return false;
            }
        }
        if let Some(want) = &self.trace_id {
            if &log.trace_id != want {
                return false;
            }
        }
        if let Some(want) = &self.log_severity {
            if !log.severity_text.eq_ignore_ascii_case(want) {
                return false;
            }
        }
        if let Some(key) = &self.has_attribute {
            if !has_attribute(&log.log.attributes, key) {
                return false;
            }
        }
        if let Some(expected) = &self.attribute_equals {
            if !attributes_equal(&log.log.attributes, expected) {
                return false;
            }
        }
        true
    }

    /// Metrics ignore duration/status/attribute/log-severity filters, and a
    /// set `trace_id` means "no metrics have trace correlation" — empty.
    #[must_use]
    pub fn matches_metric(&self, metric: &MetricRecordEntry) -> bool {
        if self.trace_id.is_some() {
            return false;
        }
        if let Some(want) = &self.service_name {
            if &metric.service_name != want {
                return false;
            }
        }
        if let Some(names) = &self.metric_names {
            if !names.contains(&metric.metric_name) {
                return false;
            }
        }
        true
    }
}

/// Accepts `OK`/`ERROR`/`UNSET` and `STATUS_CODE_*` forms, case-insensitively.
fn parse_status(raw: &str) -> Option<StatusCode> {
    let normalized = raw.trim().to_ascii_uppercase();
    let normalized = normalized.strip_prefix("STATUS_CODE_").unwrap_or(&normalized);
    match normalized {
        "OK" => Some(StatusCode::Ok),
        "ERROR" => Some(StatusCode::Error),
        "UNSET" => Some(StatusCode::Unset),
        _ => None,
    }
}

pub fn truncate<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    if limit > 0 && items.len() > limit {
        items.truncate(limit);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use otel_snap_test_helpers::build_root_span;
    use opentelemetry_proto::tonic::trace::v1::status::StatusCode as Code;

    #[test]
    fn errors_only_matches_error_status_case_insensitively() {
        let filter = QueryFilter {
            errors_only: true,
            ..Default::default()
        };
        let ok_span = build_root_span("svc", "op", false);
        let err_span = build_root_span("svc", "op", true);
        assert!(!filter.matches_span(&ok_span));
        assert!(filter.matches_span(&err_span));
    }

    #[test]
    fn status_code_prefix_form_is_recognized() {
        assert_eq!(parse_status("STATUS_CODE_ERROR"), Some(Code::Error));
        assert_eq!(parse_status("ok"), Some(Code::Ok));
    }

    #[test]
    fn duration_bounds_are_inclusive() {
        let span = build_root_span("svc", "op", false); // duration = 100ms = 100_000_000ns
        let filter = QueryFilter {
            min_duration_ns: Some(100_000_000),
            max_duration_ns: Some(100_000_000),
            ..Default::default()
        };
        assert!(filter.matches_span(&span));
    }

    #[test]
    fn metric_trace_id_filter_always_excludes() {
        let filter = QueryFilter {
            trace_id: Some("abc".to_string()),
            ..Default::default()
        };
        let metric = otel_snap_test_helpers::build_gauge_metric("svc", "m", 1.0, 0);
        assert!(!filter.matches_metric(&metric));
    }
}
