//! `create_snapshot`, `get_snapshot_data`, and `manage_snapshots`.

use fastmcp::McpErrorCode;
use fastmcp::prelude::*;
use otel_snap_core::{Error, Result};
use otel_snap_store::UnifiedStore;
use serde::Serialize;

use crate::projection::{LogProjection, MetricProjection, SpanProjection};
use crate::state;
use crate::tool_util::{json_error, store_error_to_mcp_error};

#[derive(Debug, Clone, Serialize)]
pub struct CreateSnapshotResponse {
    pub name: String,
    pub trace_position: u64,
    pub log_position: u64,
    pub metric_position: u64,
}

fn create_snapshot_impl(store: &UnifiedStore, name: &str) -> Result<CreateSnapshotResponse> {
    let snapshot = store.create_snapshot(name)?;
    Ok(CreateSnapshotResponse {
        name: snapshot.name,
        trace_position: snapshot.trace_pos,
        log_position: snapshot.log_pos,
        metric_position: snapshot.metric_pos,
    })
}

#[tool(description = "Create a named snapshot of the current traces/logs/metrics positions for later windowed queries.")]
pub fn create_snapshot(_ctx: &McpContext, name: String) -> McpResult<String> {
    let response = create_snapshot_impl(state::store(), &name).map_err(store_error_to_mcp_error)?;
    serde_json::to_string(&response).map_err(json_error)
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeRangeResponse {
    pub start: chrono::DateTime<chrono::Utc>,
    pub end: chrono::DateTime<chrono::Utc>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotDataResponse {
    pub time_range: TimeRangeResponse,
    pub traces: Vec<SpanProjection>,
    pub logs: Vec<LogProjection>,
    pub metrics: Vec<MetricProjection>,
    pub summary: otel_snap_store::Summary,
}

fn get_snapshot_data_impl(
    store: &UnifiedStore,
    start_snapshot: &str,
    end_snapshot: Option<&str>,
) -> Result<SnapshotDataResponse> {
    let data = store.get_snapshot_data(start_snapshot, end_snapshot)?;
    Ok(SnapshotDataResponse {
        time_range: TimeRangeResponse {
            start: data.time_range.start,
            end: data.time_range.end,
            duration_ms: data.time_range.duration.num_milliseconds(),
        },
        traces: data.traces.iter().map(SpanProjection::from).collect(),
        logs: data.logs.iter().map(LogProjection::from).collect(),
        metrics: data.metrics.iter().map(MetricProjection::from).collect(),
        summary: data.summary,
    })
}

#[tool(description = "Fetch all traces/logs/metrics recorded between a start snapshot and an end snapshot (defaults to now).")]
pub fn get_snapshot_data(
    _ctx: &McpContext,
    start_snapshot: String,
    end_snapshot: Option<String>,
) -> McpResult<String> {
    let response = get_snapshot_data_impl(state::store(), &start_snapshot, end_snapshot.as_deref())
        .map_err(store_error_to_mcp_error)?;
    serde_json::to_string(&response).map_err(json_error)
}

#[derive(Debug, Clone, Serialize)]
pub struct ManageSnapshotsResponse {
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshots: Option<Vec<String>>,
    pub message: String,
}

fn manage_snapshots_impl(
    store: &UnifiedStore,
    action: &str,
    name: Option<&str>,
) -> std::result::Result<ManageSnapshotsResponse, McpError> {
    match action {
        "list" => {
            let snapshots = store.snapshots().list();
            let count = snapshots.len();
            Ok(ManageSnapshotsResponse {
                action: action.to_string(),
                snapshots: Some(snapshots),
                message: format!("{count} snapshot(s)"),
            })
        }
        "delete" => {
            let Some(name) = name else {
                return Err(invalid_argument("manage_snapshots", "delete requires a `name`"));
            };
            store.snapshots().delete(name).map_err(store_error_to_mcp_error)?;
            Ok(ManageSnapshotsResponse {
                action: action.to_string(),
                snapshots: None,
                message: format!("deleted snapshot '{name}'"),
            })
        }
        "clear" => {
            let count = store.snapshots().count();
            store.snapshots().clear();
            Ok(ManageSnapshotsResponse {
                action: action.to_string(),
                snapshots: None,
                message: format!("cleared {count} snapshot(s)"),
            })
        }
        other => Err(invalid_argument(
            "manage_snapshots",
            format!("unknown action '{other}', expected list|delete|clear"),
        )),
    }
}

fn invalid_argument(tool: &str, message: impl Into<String>) -> McpError {
    store_error_to_mcp_error(Error::InvalidArgument(format!("{tool}: {}", message.into())))
}

#[tool(description = "List, delete, or clear named snapshots. `action` is one of `list`, `delete`, `clear`; `name` is required for `delete`.")]
pub fn manage_snapshots(_ctx: &McpContext, action: String, name: Option<String>) -> McpResult<String> {
    let response = manage_snapshots_impl(state::store(), &action, name.as_deref())
        .map_err(|e| McpError::new(McpErrorCode::ToolExecutionError, e.to_string()))?;
    serde_json::to_string(&response).map_err(json_error)
}
