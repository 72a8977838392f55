//! Bounded multi-signal OTLP store: ring sequences, snapshots, the query
//! engine, and the activity cache.

pub mod activity;
pub mod attrs;
pub mod percentile;
pub mod query;
pub mod records;
pub mod ring;
pub mod snapshot;
pub mod store;

pub use activity::ActivityCache;
pub use query::QueryFilter;
pub use ring::RingSequence;
pub use snapshot::{Snapshot, SnapshotManager};
pub use store::{QueryResult, SnapshotData, Stats, Summary, UnifiedStore};
