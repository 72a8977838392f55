//! Startup verification probes.
//!
//! Before binding the real listeners, check that the configured ports are
//! actually free and produce an actionable error otherwise. A bind failure
//! here is fatal only for the transport it concerns — the OTLP ingest port
//! and the HTTP tool-RPC port are independent.

use std::fmt;
use std::net::TcpListener;

use otel_snap_core::{Config, Transport};

/// Result of checking whether a port is available for binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortStatus {
    /// Port is free and available for binding.
    Free,
    /// Port is already occupied by some other process.
    InUse,
    /// Could not determine port status due to an OS-level error.
    Error { kind: std::io::ErrorKind, message: String },
}

impl PortStatus {
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self, Self::Free)
    }
}

/// Check whether `host:port` can be bound right now.
///
/// Binding and immediately dropping the listener is the only portable way to
/// answer this without shelling out to `lsof`/`netstat`.
#[must_use]
pub fn check_port_status(host: &str, port: u16) -> PortStatus {
    let addr = format!("{host}:{port}");
    match TcpListener::bind(&addr) {
        Ok(_listener) => PortStatus::Free,
        Err(e) => match e.kind() {
            std::io::ErrorKind::AddrInUse => PortStatus::InUse,
            kind => PortStatus::Error { kind, message: e.to_string() },
        },
    }
}

/// Outcome of a single startup probe.
#[derive(Debug, Clone)]
pub enum ProbeResult {
    Ok { name: &'static str },
    Fail(ProbeFailure),
}

/// Details of a failed probe.
#[derive(Debug, Clone)]
pub struct ProbeFailure {
    pub name: &'static str,
    pub problem: String,
    pub fix: String,
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] Problem: {}\n        Fix: {}", self.name, self.problem, self.fix)
    }
}

/// Aggregate result of all startup probes.
#[derive(Debug)]
pub struct StartupReport {
    pub results: Vec<ProbeResult>,
}

impl StartupReport {
    #[must_use]
    pub fn failures(&self) -> Vec<&ProbeFailure> {
        self.results
            .iter()
            .filter_map(|r| match r {
                ProbeResult::Fail(f) => Some(f),
                ProbeResult::Ok { .. } => None,
            })
            .collect()
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failures().is_empty()
    }

    #[must_use]
    pub fn format_errors(&self) -> String {
        use fmt::Write;
        let failures = self.failures();
        if failures.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        out.push_str("\n  Startup failed — the following checks did not pass:\n\n");
        for (i, fail) in failures.iter().enumerate() {
            let _ = writeln!(out, "  {}. [{}] {}", i + 1, fail.name, fail.problem);
            let _ = writeln!(out, "     Fix: {}\n", fail.fix);
        }
        out
    }
}

/// Probe the OTLP gRPC ingest port, unless it's 0 (ephemeral, OS-assigned).
fn probe_otlp_port(config: &Config) -> ProbeResult {
    if config.otlp_port == 0 {
        return ProbeResult::Ok { name: "otlp_port" };
    }
    match check_port_status(&config.otlp_host, config.otlp_port) {
        PortStatus::Free => ProbeResult::Ok { name: "otlp_port" },
        PortStatus::InUse => ProbeResult::Fail(ProbeFailure {
            name: "otlp_port",
            problem: format!("{}:{} is already in use", config.otlp_host, config.otlp_port),
            fix: "stop the other process or configure a different otlp_port".to_string(),
        }),
        PortStatus::Error { message, .. } => ProbeResult::Fail(ProbeFailure {
            name: "otlp_port",
            problem: format!("could not check {}:{}: {message}", config.otlp_host, config.otlp_port),
            fix: "verify the host address is valid and resolvable".to_string(),
        }),
    }
}

/// Probe the HTTP tool-RPC port, only relevant when the transport is HTTP.
fn probe_http_port(config: &Config) -> ProbeResult {
    if config.transport != Transport::Http {
        return ProbeResult::Ok { name: "http_port" };
    }
    match check_port_status(&config.http_host, config.http_port) {
        PortStatus::Free => ProbeResult::Ok { name: "http_port" },
        PortStatus::InUse => ProbeResult::Fail(ProbeFailure {
            name: "http_port",
            problem: format!("{}:{} is already in use", config.http_host, config.http_port),
            fix: "stop the other process or configure a different http_port".to_string(),
        }),
        PortStatus::Error { message, .. } => ProbeResult::Fail(ProbeFailure {
            name: "http_port",
            problem: format!("could not check {}:{}: {message}", config.http_host, config.http_port),
            fix: "verify the host address is valid and resolvable".to_string(),
        }),
    }
}

/// Run all startup probes relevant to `config` and aggregate the results.
#[must_use]
pub fn run_startup_probes(config: &Config) -> StartupReport {
    StartupReport { results: vec![probe_otlp_port(config), probe_http_port(config)] }
}
