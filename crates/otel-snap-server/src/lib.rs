#![forbid(unsafe_code)]

//! Wires the seven [`otel_snap_tools`] tool handlers into an MCP server, the
//! OTLP gRPC ingest services into a tonic server, and exposes both a stdio
//! and an HTTP transport for the tool-RPC surface.

pub mod ingest_file;
pub mod otlp_receiver;
pub mod startup_checks;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use asupersync::{Budget, Cx};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use fastmcp::prelude::*;
use fastmcp_core::{McpError, McpErrorCode, SessionState};
use fastmcp_protocol::{Icon, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolAnnotations};
use fastmcp_server::{BoxFuture, Server, Session};
use fastmcp_transport::http::{
    HttpError, HttpHandlerConfig, HttpMethod as McpHttpMethod, HttpRequest, HttpRequestHandler, HttpResponse,
    HttpStatus,
};
use otel_snap_core::{Config, Error, Transport};
use otel_snap_tools::{ClearData, CreateSnapshot, GetOtlpEndpoints, GetSnapshotData, GetStats, ManageSnapshots, Query};

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Wraps a [`fastmcp::ToolHandler`] to record per-tool call/error/latency
/// metrics around every dispatch, without changing its behavior.
struct InstrumentedTool<T> {
    tool_index: usize,
    tool_name: &'static str,
    inner: T,
}

impl<T: fastmcp::ToolHandler> fastmcp::ToolHandler for InstrumentedTool<T> {
    fn definition(&self) -> Tool {
        self.inner.definition()
    }

    fn icon(&self) -> Option<&Icon> {
        self.inner.icon()
    }

    fn version(&self) -> Option<&str> {
        self.inner.version()
    }

    fn tags(&self) -> &[String] {
        self.inner.tags()
    }

    fn annotations(&self) -> Option<&ToolAnnotations> {
        self.inner.annotations()
    }

    fn output_schema(&self) -> Option<serde_json::Value> {
        self.inner.output_schema()
    }

    fn timeout(&self) -> Option<Duration> {
        self.inner.timeout()
    }

    fn call(&self, ctx: &McpContext, arguments: serde_json::Value) -> McpResult<Vec<Content>> {
        otel_snap_tools::record_call_idx(self.tool_index);
        let start = Instant::now();
        let out = self.inner.call(ctx, arguments);
        record_outcome(self.tool_index, out.is_err(), start.elapsed());
        out
    }

    fn call_async<'a>(
        &'a self,
        ctx: &'a McpContext,
        arguments: serde_json::Value,
    ) -> BoxFuture<'a, McpOutcome<Vec<Content>>> {
        otel_snap_tools::record_call_idx(self.tool_index);
        let start = Instant::now();
        Box::pin(async move {
            let out = self.inner.call_async(ctx, arguments).await;
            let is_error = !matches!(out, fastmcp_core::Outcome::Ok(_));
            record_outcome(self.tool_index, is_error, start.elapsed());
            out
        })
    }
}

fn record_outcome(tool_index: usize, is_error: bool, elapsed: Duration) {
    if is_error {
        otel_snap_tools::record_error_idx(tool_index);
    }
    let latency_us = u64::try_from(elapsed.as_micros().min(u128::from(u64::MAX))).unwrap_or(u64::MAX);
    otel_snap_tools::record_latency_idx(tool_index, latency_us);
}

fn add_tool<T: fastmcp::ToolHandler + 'static>(
    server: fastmcp_server::ServerBuilder,
    tool_name: &'static str,
    tool: T,
) -> fastmcp_server::ServerBuilder {
    let tool_index =
        otel_snap_tools::tool_index(tool_name).unwrap_or_else(|| panic!("tool name missing from TOOL_NAMES: {tool_name}"));
    server.tool(InstrumentedTool { tool_index, tool_name, inner: tool })
}

/// Build the MCP server exposing the seven agent-facing tools. Assumes
/// [`otel_snap_tools::state::init_store`] and `init_endpoints` have already
/// run; tool handlers read the store through those process-wide singletons.
#[must_use]
pub fn build_server(_config: &Config) -> Server {
    let server = Server::new("otel-snap", env!("CARGO_PKG_VERSION"));
    let server = add_tool(server, "get_otlp_endpoints", GetOtlpEndpoints);
    let server = add_tool(server, "create_snapshot", CreateSnapshot);
    let server = add_tool(server, "query", Query);
    let server = add_tool(server, "get_snapshot_data", GetSnapshotData);
    let server = add_tool(server, "manage_snapshots", ManageSnapshots);
    let server = add_tool(server, "get_stats", GetStats);
    let server = add_tool(server, "clear_data", ClearData);
    server.build()
}

fn init_endpoints_from_addr(otlp_addr: SocketAddr) {
    let endpoint = otlp_addr.to_string();
    otel_snap_tools::state::init_endpoints(endpoint.clone(), endpoint.clone(), endpoint);
}

/// Run the OTLP gRPC ingest server plus the stdio MCP tool transport. Blocks
/// until stdin closes.
pub fn run_stdio(config: &Config) -> std::io::Result<()> {
    let probes = startup_checks::run_startup_probes(config);
    if !probes.is_ok() {
        return Err(std::io::Error::other(probes.format_errors()));
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let otlp_addr = runtime.block_on(async {
        init_store_only(config)?;
        let store = otel_snap_tools::state::store();
        otlp_receiver::serve_otlp(&config.otlp_host, config.otlp_port, store)
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))
    })?;
    init_endpoints_from_addr(otlp_addr);

    build_server(config).run_stdio();
    Ok(())
}

/// `init_store` has to run before the tokio runtime starts accepting OTLP
/// traffic, but `init_endpoints` needs the bound address the runtime
/// produces — split so `run_stdio`/`run_http` can sequence both halves
/// around `serve_otlp` without double-initializing the store.
fn init_store_only(config: &Config) -> std::io::Result<()> {
    otel_snap_tools::state::init_store(config.trace_buffer_size, config.log_buffer_size, config.metric_buffer_size)
        .map_err(|e| std::io::Error::other(e.to_string()))
}

struct HttpState {
    router: fastmcp_server::Router,
    server_info: fastmcp_protocol::ServerInfo,
    server_capabilities: fastmcp_protocol::ServerCapabilities,
    handler: HttpRequestHandler,
    allowed_origins: Vec<String>,
}

impl HttpState {
    fn cors_origin(&self, headers: &HeaderMap) -> Option<String> {
        let origin = headers.get("origin")?.to_str().ok()?.to_string();
        if cors_allows(&self.allowed_origins, &origin) { Some(origin) } else { None }
    }

    fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone();
        match self.dispatch_inner(request) {
            Ok(value) => id.map(|req_id| JsonRpcResponse::success(req_id, value)),
            Err(err) => id.map(|req_id| JsonRpcResponse::error(Some(req_id), JsonRpcError::from(err))),
        }
    }

    fn dispatch_inner(&self, request: JsonRpcRequest) -> std::result::Result<serde_json::Value, McpError> {
        let request_id = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let cx = Cx::for_request_with_budget(Budget::INFINITE);
        let mut session = Session::new(self.server_info.clone(), self.server_capabilities.clone());

        match request.method.as_str() {
            "initialize" => {
                let params: fastmcp_protocol::InitializeParams = parse_params(request.params)?;
                let out = self.router.handle_initialize(&cx, &mut session, params, None)?;
                serde_json::to_value(out).map_err(McpError::from)
            }
            "initialized" | "notifications/cancelled" | "logging/setLevel" => Ok(serde_json::Value::Null),
            "tools/list" => {
                let params: fastmcp_protocol::ListToolsParams = parse_params_or_default(request.params)?;
                let out = self.router.handle_tools_list(&cx, params, Some(session.state()))?;
                serde_json::to_value(out).map_err(McpError::from)
            }
            "tools/call" => {
                let params: fastmcp_protocol::CallToolParams = parse_params(request.params)?;
                let out = self
                    .router
                    .handle_tools_call(&cx, request_id, params, &Budget::INFINITE, SessionState::new(), None, None)?;
                serde_json::to_value(out).map_err(McpError::from)
            }
            other => Err(McpError::new(McpErrorCode::MethodNotFound, format!("unknown method: {other}"))),
        }
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<serde_json::Value>) -> std::result::Result<T, McpError> {
    let value = params.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(value).map_err(|e| McpError::new(McpErrorCode::InvalidParams, e.to_string()))
}

fn parse_params_or_default<T: serde::de::DeserializeOwned + Default>(
    params: Option<serde_json::Value>,
) -> std::result::Result<T, McpError> {
    match params {
        None | Some(serde_json::Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|e| McpError::new(McpErrorCode::InvalidParams, e.to_string())),
    }
}

const fn http_error_status(err: &HttpError) -> HttpStatus {
    match err {
        HttpError::InvalidMethod(_) => HttpStatus::METHOD_NOT_ALLOWED,
        HttpError::InvalidContentType(_)
        | HttpError::JsonError(_)
        | HttpError::CodecError(_)
        | HttpError::HeadersTooLarge { .. }
        | HttpError::BodyTooLarge { .. }
        | HttpError::UnsupportedTransferEncoding(_) => HttpStatus::BAD_REQUEST,
        HttpError::Timeout | HttpError::Closed => HttpStatus::SERVICE_UNAVAILABLE,
        HttpError::Transport(_) => HttpStatus::INTERNAL_SERVER_ERROR,
    }
}

/// A single pattern matches either exactly, as `"*"`, or as a `host:*`
/// prefix allowing any port on that host (the shape of our default
/// `allowed_origins`, e.g. `"http://localhost:*"`).
fn cors_allows(allowed: &[String], origin: &str) -> bool {
    if allowed.is_empty() {
        return true;
    }
    allowed.iter().any(|pattern| cors_pattern_matches(pattern, origin))
}

fn cors_pattern_matches(pattern: &str, origin: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix(":*") {
        return origin
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(':'))
            .is_some_and(|port| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()));
    }
    pattern == origin
}

fn to_mcp_http_request(headers: &HeaderMap, body: Vec<u8>) -> HttpRequest {
    let mut out = HashMap::new();
    for (name, value) in headers {
        if let Ok(v) = value.to_str() {
            out.insert(name.as_str().to_lowercase(), v.to_string());
        }
    }
    out.entry("accept".to_string()).or_insert_with(|| "application/json".to_string());
    out.entry("content-type".to_string()).or_insert_with(|| "application/json".to_string());
    HttpRequest { method: McpHttpMethod::Post, path: "/mcp".to_string(), headers: out, body, query: HashMap::new() }
}

fn to_axum_response(resp: HttpResponse, origin: Option<String>) -> Response {
    let status = StatusCode::from_u16(resp.status.0).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    for (name, value) in &resp.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(origin) = origin {
        builder = builder
            .header("access-control-allow-origin", origin)
            .header("access-control-allow-methods", "POST, OPTIONS")
            .header("access-control-allow-headers", "content-type");
    }
    builder.body(axum::body::Body::from(resp.body)).unwrap_or_else(|_| Response::new(axum::body::Body::empty()))
}

async fn handle_mcp_post(State(state): State<Arc<HttpState>>, headers: HeaderMap, body: axum::body::Bytes) -> Response {
    let origin = state.cors_origin(&headers);
    let http_req = to_mcp_http_request(&headers, body.to_vec());
    let json_rpc = match state.handler.parse_request(&http_req) {
        Ok(req) => req,
        Err(err) => {
            let status = http_error_status(&err);
            return to_axum_response(state.handler.error_response(status, &err.to_string()), origin);
        }
    };
    let resp = state
        .dispatch(json_rpc)
        .map_or_else(|| HttpResponse::new(HttpStatus::ACCEPTED), |r| HttpResponse::ok().with_json(&r));
    to_axum_response(resp, origin)
}

async fn handle_mcp_options(State(state): State<Arc<HttpState>>, headers: HeaderMap) -> Response {
    let origin = state.cors_origin(&headers);
    let http_req = to_mcp_http_request(&headers, Vec::new());
    to_axum_response(state.handler.handle_options(&http_req), origin)
}

async fn handle_health() -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(r#"{"status":"ok"}"#))
        .unwrap_or_else(|_| Response::new(axum::body::Body::empty()))
}

/// Run the OTLP gRPC ingest server plus the HTTP MCP tool transport. Blocks
/// until the process receives a shutdown signal.
pub fn run_http(config: &Config) -> std::io::Result<()> {
    let probes = startup_checks::run_startup_probes(config);
    if !probes.is_ok() {
        return Err(std::io::Error::other(probes.format_errors()));
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_http_async(config))
}

/// Runs startup through "listening socket bound", the part of `run_http`
/// worth driving end-to-end in a test without blocking forever in
/// `axum::serve`. Initializes the store and OTLP endpoints exactly once.
async fn bind_http(config: &Config) -> std::io::Result<(tokio::net::TcpListener, axum::Router, SocketAddr)> {
    init_store_only(config)?;
    let store = otel_snap_tools::state::store();
    let otlp_addr = otlp_receiver::serve_otlp(&config.otlp_host, config.otlp_port, store)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    init_endpoints_from_addr(otlp_addr);

    let server = build_server(config);
    let server_info = server.info().clone();
    let server_capabilities = server.capabilities().clone();
    let router = server.into_router();
    let handler = HttpRequestHandler::with_config(HttpHandlerConfig {
        base_path: "/mcp".to_string(),
        allow_cors: true,
        cors_origins: config.allowed_origins.clone(),
        timeout: Duration::from_secs(30),
        max_body_size: 10 * 1024 * 1024,
    });
    let state = Arc::new(HttpState { router, server_info, server_capabilities, handler, allowed_origins: config.allowed_origins.clone() });

    let app = axum::Router::new()
        .route("/mcp", axum::routing::post(handle_mcp_post).options(handle_mcp_options))
        .route("/health", axum::routing::get(handle_health))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.http_host, config.http_port)
        .parse()
        .map_err(|e| std::io::Error::other(format!("invalid http bind address: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| std::io::Error::other(Error::Bind { transport: "http", addr: addr.to_string(), source }))?;
    let bound_addr = listener.local_addr()?;

    tracing::info!(addr = %bound_addr, "http tool-rpc listening");
    Ok((listener, app, bound_addr))
}

async fn run_http_async(config: &Config) -> std::io::Result<()> {
    let (listener, app, _addr) = bind_http(config).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Dispatch to the configured transport.
pub fn run(config: &Config) -> std::io::Result<()> {
    match config.transport {
        Transport::Stdio => run_stdio(config),
        Transport::Http => run_http(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_allows_wildcard_port_pattern() {
        let allowed = vec!["http://localhost:*".to_string()];
        assert!(cors_allows(&allowed, "http://localhost:5173"));
        assert!(!cors_allows(&allowed, "http://evil.example"));
    }

    #[test]
    fn cors_allows_exact_match() {
        let allowed = vec!["http://127.0.0.1:4380".to_string()];
        assert!(cors_allows(&allowed, "http://127.0.0.1:4380"));
        assert!(!cors_allows(&allowed, "http://127.0.0.1:4381"));
    }

    #[test]
    fn cors_allows_star() {
        assert!(cors_allows(&["*".to_string()], "http://anything"));
    }

    #[test]
    fn cors_empty_allows_all() {
        assert!(cors_allows(&[], "http://anything"));
    }

    #[test]
    fn build_server_registers_seven_tools() {
        let config = Config::default();
        let server = build_server(&config);
        let router = server.into_router();
        let cx = Cx::for_testing();
        let out = router.handle_tools_list(&cx, fastmcp_protocol::ListToolsParams::default(), None).unwrap();
        let value = serde_json::to_value(out).unwrap();
        let tools = value["tools"].as_array().unwrap();
        assert_eq!(tools.len(), otel_snap_tools::TOOL_NAMES.len());
    }

    /// Drives `run_http`'s real startup sequence (store init, OTLP bind,
    /// endpoint init, HTTP bind) exactly once, the path where the
    /// double-`init_store` call used to make every startup fail. Binding
    /// twice would panic on the second `init_store`, so this is the only
    /// test in the binary allowed to call it.
    #[tokio::test]
    async fn http_startup_binds_without_double_initializing_the_store() {
        let config = Config::default();
        let (listener, app, addr) = bind_http(&config).await.expect("startup sequence should succeed exactly once");

        let serve = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let response = reqwest_health_check(addr).await;
        assert_eq!(response, Some(200));

        serve.abort();
    }

    async fn reqwest_health_check(addr: SocketAddr) -> Option<u16> {
        // Plain TCP + handcrafted request line: avoids pulling in an HTTP
        // client dev-dependency just for one smoke check.
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut stream = tokio::net::TcpStream::connect(addr).await.ok()?;
        stream.write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await.ok()?;
        let mut response = String::new();
        stream.read_to_string(&mut response).await.ok()?;
        response.split_whitespace().nth(1).and_then(|code| code.parse().ok())
    }
}
