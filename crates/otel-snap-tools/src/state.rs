//! Process-wide singletons the tool handlers read from.
//!
//! The store and the endpoint strings are initialized once at server
//! startup (see `otel-snap-server::build_server`) and never replaced
//! afterward; tool handlers treat them as read-only global state, the same
//! way the teacher's tool layer treats its database pool.

use std::sync::OnceLock;

use otel_snap_core::{Error, Result};
use otel_snap_store::UnifiedStore;

static STORE: OnceLock<UnifiedStore> = OnceLock::new();

/// Construct the global [`UnifiedStore`]. Must be called exactly once,
/// before any tool handler runs.
pub fn init_store(trace_capacity: usize, log_capacity: usize, metric_capacity: usize) -> Result<()> {
    let store = UnifiedStore::new(trace_capacity, log_capacity, metric_capacity)?;
    STORE
        .set(store)
        .map_err(|_| Error::Internal("store already initialized".to_string()))
}

/// Borrow the global store.
///
/// # Panics
/// Panics if [`init_store`] has not run yet — a programming error, never a
/// condition a caller can recover from.
#[must_use]
pub fn store() -> &'static UnifiedStore {
    STORE.get().expect("otel-snap store not initialized; call init_store at startup")
}

#[derive(Debug, Clone)]
pub struct OtlpEndpoints {
    pub traces: String,
    pub logs: String,
    pub metrics: String,
}

static ENDPOINTS: OnceLock<OtlpEndpoints> = OnceLock::new();

/// Record the OTLP ingest endpoint strings surfaced by `get_otlp_endpoints`.
///
/// A single unified gRPC server serves all three signals on one port, so the
/// three strings are normally identical; per-signal ports are still allowed
/// by passing distinct values.
pub fn init_endpoints(traces: String, logs: String, metrics: String) {
    let _ = ENDPOINTS.set(OtlpEndpoints { traces, logs, metrics });
}

#[must_use]
pub fn endpoints() -> &'static OtlpEndpoints {
    ENDPOINTS.get().expect("otel-snap endpoints not initialized; call init_endpoints at startup")
}
