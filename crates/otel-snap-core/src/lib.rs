//! Shared config, error, and metrics primitives for otel-snap.

pub mod config;
pub mod error;
pub mod metrics;

pub use config::{Config, ConfigFile, ConfigSource, Transport};
pub use error::{Error, Result};
pub use metrics::{Counter, HistogramSnapshot, Log2Histogram};
