//! Error types for otel-snap.
//!
//! The variants mirror the error categories from the design doc (§7): every
//! one of them is surfaced to the caller and none is ever fatal to the
//! process. The store has no retry logic because there is nothing to retry
//! against — these are in-memory, synchronous failures.

use thiserror::Error;

/// Result type alias used throughout the store and tool layers.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for otel-snap.
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Validation errors
    // ==========================================================================
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("ring capacity must be greater than zero")]
    InvalidCapacity,

    // ==========================================================================
    // Resource errors
    // ==========================================================================
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("snapshot already exists: {0}")]
    SnapshotAlreadyExists(String),

    #[error("invalid snapshot range: end snapshot {end:?} was created before start snapshot {start:?}")]
    InvalidRange { start: String, end: String },

    // ==========================================================================
    // Configuration / startup errors
    // ==========================================================================
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to bind {transport} listener to {addr}: {source}")]
    Bind {
        transport: &'static str,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // ==========================================================================
    // I/O / serialization
    // ==========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ==========================================================================
    // Internal
    // ==========================================================================
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable error-type string used in agent-tool RPC error payloads.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) | Self::InvalidCapacity => "INVALID_ARGUMENT",
            Self::SnapshotNotFound(_) => "NOT_FOUND",
            Self::SnapshotAlreadyExists(_) => "ALREADY_EXISTS",
            Self::InvalidRange { .. } => "INVALID_RANGE",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Bind { .. } => "BIND_ERROR",
            Self::Io(_) => "OS_ERROR",
            Self::Serialization(_) => "TYPE_ERROR",
            Self::Internal(_) => "UNHANDLED_EXCEPTION",
        }
    }

    /// Whether a caller could plausibly retry after fixing their input.
    ///
    /// Bind failures and internal errors are not: the former needs operator
    /// intervention, the latter indicates a bug.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::InvalidCapacity
                | Self::SnapshotNotFound(_)
                | Self::SnapshotAlreadyExists(_)
                | Self::InvalidRange { .. }
                | Self::Config(_)
                | Self::Serialization(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_type_mapping_is_exhaustive_for_common_cases() {
        assert_eq!(
            Error::InvalidArgument("x".into()).error_type(),
            "INVALID_ARGUMENT"
        );
        assert_eq!(
            Error::SnapshotNotFound("x".into()).error_type(),
            "NOT_FOUND"
        );
        assert_eq!(
            Error::SnapshotAlreadyExists("x".into()).error_type(),
            "ALREADY_EXISTS"
        );
        assert_eq!(
            Error::InvalidRange {
                start: "a".into(),
                end: "b".into()
            }
            .error_type(),
            "INVALID_RANGE"
        );
        assert!(Error::InvalidArgument("x".into()).is_recoverable());
        assert!(!Error::Internal("x".into()).is_recoverable());
    }
}
