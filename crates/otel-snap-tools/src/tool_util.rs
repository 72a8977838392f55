//! Maps [`otel_snap_core::Error`] onto the agent-tool RPC error shape.

use fastmcp::McpErrorCode;
use fastmcp::prelude::*;
use otel_snap_core::Error;
use serde_json::json;

fn error_payload(error_type: &str, message: &str, recoverable: bool) -> serde_json::Value {
    json!({
        "error": {
            "type": error_type,
            "message": message,
            "recoverable": recoverable,
        }
    })
}

/// Wrap a store-layer error as a tool-execution [`McpError`] carrying a
/// structured payload, keyed by the error's stable `error_type()`.
#[must_use]
pub fn store_error_to_mcp_error(err: Error) -> McpError {
    let error_type = err.error_type();
    let recoverable = err.is_recoverable();
    let message = err.to_string();
    McpError::with_data(
        McpErrorCode::ToolExecutionError,
        message.clone(),
        error_payload(error_type, &message, recoverable),
    )
}

pub fn json_error(err: serde_json::Error) -> McpError {
    McpError::new(McpErrorCode::InternalError, format!("JSON error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_not_found_maps_to_recoverable_not_found() {
        let err = store_error_to_mcp_error(Error::SnapshotNotFound("x".to_string()));
        let data = err.data.expect("expected data payload");
        assert_eq!(data["error"]["type"], "NOT_FOUND");
        assert_eq!(data["error"]["recoverable"], true);
    }

    #[test]
    fn internal_error_maps_to_unrecoverable() {
        let err = store_error_to_mcp_error(Error::Internal("boom".to_string()));
        let data = err.data.expect("expected data payload");
        assert_eq!(data["error"]["type"], "UNHANDLED_EXCEPTION");
        assert_eq!(data["error"]["recoverable"], false);
    }
}
