//! `get_stats` and `clear_data`.

use fastmcp::prelude::*;
use otel_snap_store::{Stats, UnifiedStore};
use serde::Serialize;

use crate::state;
use crate::tool_util::json_error;

#[tool(description = "Report per-signal ring/capacity stats, distinct-service/trace-id counts, and the live snapshot count.")]
pub fn get_stats(_ctx: &McpContext) -> McpResult<String> {
    let stats: Stats = state::store().stats();
    serde_json::to_string(&stats).map_err(json_error)
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearDataResponse {
    pub cleared: bool,
    pub message: String,
}

fn clear_data_impl(store: &UnifiedStore) -> ClearDataResponse {
    store.clear();
    ClearDataResponse {
        cleared: true,
        message: "all traces, logs, metrics, snapshots, and activity state were reset".to_string(),
    }
}

#[tool(description = "Reset the store completely: all traces, logs, metrics, snapshots, and activity-cache state are cleared.")]
pub fn clear_data(_ctx: &McpContext) -> McpResult<String> {
    let response = clear_data_impl(state::store());
    serde_json::to_string(&response).map_err(json_error)
}
