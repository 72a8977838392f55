//! MCP tool implementations exposed by the OTLP snapshot collector.
//!
//! This crate provides the seven agent-facing tools:
//! - `get_otlp_endpoints` — discover where to export telemetry to
//! - `create_snapshot` — mark the current ring position under a name
//! - `query` — filter traces/logs/metrics directly, without a snapshot window
//! - `get_snapshot_data` — fetch everything recorded between two snapshots
//! - `manage_snapshots` — list, delete, or clear named snapshots
//! - `get_stats` — ring/capacity/cardinality stats
//! - `clear_data` — reset the store completely
//!
//! Tool-level application state (the [`otel_snap_store::UnifiedStore`] and
//! the configured OTLP endpoint addresses) lives behind the process-wide
//! singletons in [`state`], since the `#[tool]` macro only hands handlers a
//! [`fastmcp::McpContext`] and their own JSON-decoded parameters.

#![forbid(unsafe_code)]
#![allow(clippy::needless_pass_by_value)]

pub mod endpoints;
pub mod metrics;
pub mod projection;
pub mod query;
pub mod snapshots;
pub mod state;
pub mod stats;
pub mod tool_util;

pub use endpoints::*;
pub use metrics::{
    LatencySnapshot, MetricsSnapshotEntry, TOOL_NAMES, record_call, record_call_idx, record_error, record_error_idx,
    record_latency, record_latency_idx, reset_tool_latencies, reset_tool_metrics, slow_tools, tool_index,
    tool_metrics_snapshot, tool_metrics_snapshot_full,
};
pub use projection::{LogProjection, MetricProjection, SpanProjection, any_value_to_json, attrs_to_json_capped};
pub use query::*;
pub use snapshots::*;
pub use stats::*;
