//! Drives the MCP tool RPC surface end-to-end through the real dispatch path
//! (`Router::handle_tools_call`), the same way otel-snap-server's HTTP and
//! stdio transports do, rather than calling the tool functions directly.

use asupersync::{Budget, Cx};
use fastmcp_core::SessionState;
use fastmcp_protocol::CallToolParams;
use opentelemetry_proto::tonic::trace::v1::status::StatusCode;
use otel_snap_core::Config;
use serde_json::{Value, json};

fn call_tool(router: &fastmcp_server::Router, request_id: u64, name: &str, arguments: Value) -> Value {
    let cx = Cx::for_testing();
    let params: CallToolParams = serde_json::from_value(json!({"name": name, "arguments": arguments})).unwrap();
    let result = router
        .handle_tools_call(&cx, request_id, params, &Budget::INFINITE, SessionState::new(), None, None)
        .unwrap_or_else(|e| panic!("tool {name} failed: {e}"));
    let value = serde_json::to_value(result).unwrap();
    let text = value["content"][0]["text"]
        .as_str()
        .unwrap_or_else(|| panic!("tool {name} did not return text content: {value}"));
    serde_json::from_str(text).unwrap_or_else(|e| panic!("tool {name} returned non-JSON text: {e}"))
}

#[test]
fn full_tool_lifecycle_matches_the_spec_contract() {
    // One store per test binary: the tool layer's state is a process-wide
    // singleton, so each conformance test file gets exactly one chance at it.
    otel_snap_tools::state::init_store(100, 100, 100).unwrap();
    otel_snap_tools::state::init_endpoints(
        "127.0.0.1:4317".to_string(),
        "127.0.0.1:4317".to_string(),
        "127.0.0.1:4317".to_string(),
    );

    let server = otel_snap_server::build_server(&Config::default());
    let router = server.into_router();
    let mut next_id = 0u64;
    let mut id = || {
        next_id += 1;
        next_id
    };

    let endpoints = call_tool(&router, id(), "get_otlp_endpoints", json!({}));
    assert_eq!(endpoints["traces_endpoint"], "127.0.0.1:4317");

    let snapshot_a = call_tool(&router, id(), "create_snapshot", json!({"name": "A"}));
    assert_eq!(snapshot_a["name"], "A");

    let store = otel_snap_tools::state::store();
    store.receive_spans(&otel_snap_test_helpers::trace_export_request(
        "checkout",
        otel_snap_test_helpers::otlp_span(vec![1; 16], vec![1; 8], Vec::new(), "charge", 0, 100_000_000, StatusCode::Ok),
    ));
    store.receive_spans(&otel_snap_test_helpers::trace_export_request(
        "checkout",
        otel_snap_test_helpers::otlp_span(vec![2; 16], vec![2; 8], Vec::new(), "charge", 0, 50_000_000, StatusCode::Error),
    ));

    let snapshot_b = call_tool(&router, id(), "create_snapshot", json!({"name": "B"}));
    assert_eq!(snapshot_b["name"], "B");

    let window = call_tool(&router, id(), "get_snapshot_data", json!({"start_snapshot": "A", "end_snapshot": "B"}));
    assert_eq!(window["summary"]["span_count"], 2);

    let errors = call_tool(&router, id(), "query", json!({"errors_only": true}));
    assert_eq!(errors["traces"].as_array().unwrap().len(), 1);

    let stats = call_tool(&router, id(), "get_stats", json!({}));
    assert_eq!(stats["traces"]["ring"]["size"], 2);

    let listed = call_tool(&router, id(), "manage_snapshots", json!({"action": "list"}));
    assert_eq!(listed["snapshots"].as_array().unwrap().len(), 2);

    let cleared = call_tool(&router, id(), "clear_data", json!({}));
    assert_eq!(cleared["cleared"], true);

    let stats_after_clear = call_tool(&router, id(), "get_stats", json!({}));
    assert_eq!(stats_after_clear["traces"]["ring"]["size"], 0);
}

#[test]
fn tools_list_reports_all_seven_tools_with_descriptions() {
    let server = otel_snap_server::build_server(&Config::default());
    let router = server.into_router();
    let cx = Cx::for_testing();
    let out = router.handle_tools_list(&cx, fastmcp_protocol::ListToolsParams::default(), None).unwrap();
    let value = serde_json::to_value(out).unwrap();
    let tools = value["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 7);
    for tool in tools {
        assert!(tool["description"].as_str().is_some_and(|d| !d.is_empty()));
    }
}
