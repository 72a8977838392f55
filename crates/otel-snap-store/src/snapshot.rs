//! Snapshot manager: named, lightweight position triples.
//!
//! Snapshots never reference stored telemetry directly — deleting one never
//! frees any ring data, and a full store `Clear()` drops both together.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use otel_snap_core::error::{Error, Result};

/// A named, immutable triple of absolute positions across the three signals.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub trace_pos: u64,
    pub log_pos: u64,
    pub metric_pos: u64,
}

#[derive(Default)]
pub struct SnapshotManager {
    snapshots: RwLock<HashMap<String, Snapshot>>,
}

impl SnapshotManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        name: &str,
        trace_pos: u64,
        log_pos: u64,
        metric_pos: u64,
    ) -> Result<Snapshot> {
        let mut snapshots = self.snapshots.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if snapshots.contains_key(name) {
            return Err(Error::SnapshotAlreadyExists(name.to_string()));
        }
        let snapshot = Snapshot {
            name: name.to_string(),
            created_at: Utc::now(),
            trace_pos,
            log_pos,
            metric_pos,
        };
        snapshots.insert(name.to_string(), snapshot.clone());
        Ok(snapshot)
    }

    pub fn get(&self, name: &str) -> Result<Snapshot> {
        self.snapshots
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::SnapshotNotFound(name.to_string()))
    }

    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.snapshots
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let mut snapshots = self.snapshots.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if snapshots.remove(name).is_none() {
            return Err(Error::SnapshotNotFound(name.to_string()));
        }
        Ok(())
    }

    pub fn clear(&self) {
        self.snapshots.write().unwrap_or_else(std::sync::PoisonError::into_inner).clear();
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.snapshots.read().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_duplicate_name() {
        let mgr = SnapshotManager::new();
        mgr.create("a", 0, 0, 0).unwrap();
        assert!(matches!(
            mgr.create("a", 1, 1, 1),
            Err(Error::SnapshotAlreadyExists(_))
        ));
    }

    #[test]
    fn get_and_delete_missing_name_fail_not_found() {
        let mgr = SnapshotManager::new();
        assert!(matches!(mgr.get("missing"), Err(Error::SnapshotNotFound(_))));
        assert!(matches!(mgr.delete("missing"), Err(Error::SnapshotNotFound(_))));
    }

    #[test]
    fn delete_does_not_affect_count_of_unrelated_snapshots() {
        let mgr = SnapshotManager::new();
        mgr.create("a", 0, 0, 0).unwrap();
        mgr.create("b", 1, 1, 1).unwrap();
        mgr.delete("a").unwrap();
        assert_eq!(mgr.count(), 1);
        assert_eq!(mgr.list(), vec!["b".to_string()]);
    }
}
