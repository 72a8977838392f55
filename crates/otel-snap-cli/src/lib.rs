//! Command-line parsing and bootstrap for the `otel-snap` binary.

#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use otel_snap_core::{Config, ConfigFile, Transport};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportArg {
    Stdio,
    Http,
}

impl From<TransportArg> for Transport {
    fn from(value: TransportArg) -> Self {
        match value {
            TransportArg::Stdio => Self::Stdio,
            TransportArg::Http => Self::Http,
        }
    }
}

/// Local, in-memory OTLP telemetry collector with an agent-facing tool RPC surface.
#[derive(Parser, Debug)]
#[command(name = "otel-snap", version, about)]
struct Cli {
    /// Path to an explicit config file, applied after the global/project layers.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Agent tool-RPC transport.
    #[arg(long, value_enum)]
    transport: Option<TransportArg>,

    /// Host the OTLP gRPC ingest server binds to.
    #[arg(long)]
    otlp_host: Option<String>,

    /// Port the OTLP gRPC ingest server binds to (0 = OS-assigned).
    #[arg(long)]
    otlp_port: Option<u16>,

    /// Host the HTTP tool-RPC transport binds to.
    #[arg(long)]
    http_host: Option<String>,

    /// Port the HTTP tool-RPC transport binds to.
    #[arg(long)]
    http_port: Option<u16>,

    /// Trace ring capacity.
    #[arg(long)]
    trace_buffer_size: Option<usize>,

    /// Log ring capacity.
    #[arg(long)]
    log_buffer_size: Option<usize>,

    /// Metric ring capacity.
    #[arg(long)]
    metric_buffer_size: Option<usize>,

    /// Run without any per-session state (stateless tool RPC).
    #[arg(long)]
    stateless: bool,

    /// Optional base directory for the file-tailing ingest source (spec §6.3):
    /// reads `traces/`, `logs/`, `metrics/` subdirectories of JSONL exports.
    #[arg(long)]
    file_source: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigFile {
        ConfigFile {
            trace_buffer_size: self.trace_buffer_size,
            log_buffer_size: self.log_buffer_size,
            metric_buffer_size: self.metric_buffer_size,
            otlp_host: self.otlp_host.clone(),
            otlp_port: self.otlp_port,
            transport: self.transport.map(Into::into),
            http_host: self.http_host.clone(),
            http_port: self.http_port,
            allowed_origins: None,
            session_timeout: None,
            stateless: self.stateless.then_some(true),
            verbose: self.verbose.then_some(true),
        }
    }
}

/// Parse arguments, resolve configuration, and run the collector. Returns the
/// process exit code.
#[must_use]
pub fn run() -> i32 {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match Config::resolve(cli.config.as_deref(), &cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("otel-snap: configuration error: {e}");
            return 2;
        }
    };

    if config.verbose {
        tracing::info!(?config, "resolved configuration");
    }

    if let Some(base_dir) = cli.file_source.clone() {
        // The store only exists once otel_snap_server::run's startup path has
        // initialized it; a short delay avoids racing that.
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            otel_snap_server::ingest_file::start(&base_dir, otel_snap_tools::state::store());
        });
    }

    match otel_snap_server::run(&config) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("otel-snap: {e}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_only_set_explicit_fields() {
        let cli = Cli::parse_from(["otel-snap", "--http-port", "9999"]);
        let overrides = cli.overrides();
        assert_eq!(overrides.http_port, Some(9999));
        assert_eq!(overrides.otlp_port, None);
        assert_eq!(overrides.trace_buffer_size, None);
    }

    #[test]
    fn transport_flag_maps_to_core_enum() {
        let cli = Cli::parse_from(["otel-snap", "--transport", "http"]);
        assert_eq!(cli.overrides().transport, Some(Transport::Http));
    }
}
