//! `get_otlp_endpoints`: surfaces the gRPC ingest addresses to agents so
//! they can point an instrumented program at this collector.

use fastmcp::prelude::*;
use serde::Serialize;

use crate::state;
use crate::tool_util::json_error;

#[derive(Debug, Clone, Serialize)]
pub struct OtlpEndpointsResponse {
    pub traces_endpoint: String,
    pub logs_endpoint: String,
    pub metrics_endpoint: String,
}

#[tool(description = "Return the OTLP gRPC ingest endpoints (traces, logs, metrics) that instrumented programs should export to.")]
pub fn get_otlp_endpoints(_ctx: &McpContext) -> McpResult<String> {
    let endpoints = state::endpoints();
    let response = OtlpEndpointsResponse {
        traces_endpoint: endpoints.traces.clone(),
        logs_endpoint: endpoints.logs.clone(),
        metrics_endpoint: endpoints.metrics.clone(),
    };
    serde_json::to_string(&response).map_err(json_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_serializes_all_three_endpoints() {
        let response = OtlpEndpointsResponse {
            traces_endpoint: "127.0.0.1:4317".to_string(),
            logs_endpoint: "127.0.0.1:4317".to_string(),
            metrics_endpoint: "127.0.0.1:4317".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["traces_endpoint"], "127.0.0.1:4317");
        assert_eq!(json["metrics_endpoint"], "127.0.0.1:4317");
    }
}
