//! `query`: the multi-signal filter/range tool.

use std::collections::HashMap;

use fastmcp::prelude::*;
use otel_snap_core::Result;
use otel_snap_store::{QueryFilter, UnifiedStore};
use serde::Serialize;

use crate::projection::{LogProjection, MetricProjection, SpanProjection};
use crate::state;
use crate::tool_util::{json_error, store_error_to_mcp_error};

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub traces: Vec<SpanProjection>,
    pub logs: Vec<LogProjection>,
    pub metrics: Vec<MetricProjection>,
    pub summary: otel_snap_store::Summary,
}

#[allow(clippy::too_many_arguments)]
fn query_impl(store: &UnifiedStore, filter: QueryFilter) -> Result<QueryResponse> {
    let result = store.query(&filter)?;
    Ok(QueryResponse {
        traces: result.traces.iter().map(SpanProjection::from).collect(),
        logs: result.logs.iter().map(LogProjection::from).collect(),
        metrics: result.metrics.iter().map(MetricProjection::from).collect(),
        summary: result.summary,
    })
}

#[allow(clippy::too_many_arguments)]
#[tool(
    description = "Query traces, logs, and metrics with a shared filter. All filter fields are optional and AND together; metrics ignore trace_id/span_status/duration and return empty if trace_id is set."
)]
pub fn query(
    _ctx: &McpContext,
    service_name: Option<String>,
    trace_id: Option<String>,
    span_name: Option<String>,
    log_severity: Option<String>,
    metric_names: Option<Vec<String>>,
    start_snapshot: Option<String>,
    end_snapshot: Option<String>,
    limit: Option<usize>,
    errors_only: Option<bool>,
    span_status: Option<String>,
    min_duration_ns: Option<i64>,
    max_duration_ns: Option<i64>,
    has_attribute: Option<String>,
    attribute_equals: Option<HashMap<String, String>>,
) -> McpResult<String> {
    let filter = QueryFilter {
        service_name,
        trace_id,
        span_name,
        log_severity,
        metric_names,
        start_snapshot,
        end_snapshot,
        limit: limit.unwrap_or(0),
        errors_only: errors_only.unwrap_or(false),
        span_status,
        min_duration_ns,
        max_duration_ns,
        has_attribute,
        attribute_equals,
    };
    let response = query_impl(state::store(), filter).map_err(store_error_to_mcp_error)?;
    serde_json::to_string(&response).map_err(json_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> UnifiedStore {
        UnifiedStore::new(8, 8, 8).unwrap()
    }

    #[test]
    fn query_with_no_filters_returns_everything_ingested_directly() {
        let store = store();
        store.receive_spans(&otel_snap_test_helpers::trace_export_request(
            "svc",
            otel_snap_test_helpers::otlp_span(
                vec![1],
                vec![2],
                Vec::new(),
                "op",
                0,
                1,
                opentelemetry_proto::tonic::trace::v1::status::StatusCode::Ok,
            ),
        ));
        let response = query_impl(&store, QueryFilter::default()).unwrap();
        assert_eq!(response.traces.len(), 1);
    }

    #[test]
    fn query_by_service_name_filters_down() {
        let store = store();
        store.receive_spans(&otel_snap_test_helpers::trace_export_request(
            "checkout",
            otel_snap_test_helpers::otlp_span(
                vec![1],
                vec![2],
                Vec::new(),
                "op",
                0,
                1,
                opentelemetry_proto::tonic::trace::v1::status::StatusCode::Ok,
            ),
        ));
        let filter = QueryFilter {
            service_name: Some("billing".to_string()),
            ..Default::default()
        };
        let response = query_impl(&store, filter).unwrap();
        assert!(response.traces.is_empty());
    }

    #[test]
    fn unknown_start_snapshot_surfaces_not_found() {
        let store = store();
        let filter = QueryFilter {
            start_snapshot: Some("missing".to_string()),
            ..Default::default()
        };
        assert!(query_impl(&store, filter).is_err());
    }
}
