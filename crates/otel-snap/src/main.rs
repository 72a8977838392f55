//! Local, in-memory OTLP telemetry collector with an agent-facing tool RPC surface.
//!
//! This is the process entry point; argument parsing and bootstrap live in
//! [`otel_snap_cli`].

#![forbid(unsafe_code)]

fn main() {
    std::process::exit(otel_snap_cli::run());
}
