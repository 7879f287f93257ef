use super::{PersistenceResult, SnapshotStore};
use crate::snapshot::Snapshot;
use parking_lot::Mutex;

/// Keeps the latest committed snapshot in memory. Nothing survives the
/// process.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    latest: Mutex<Option<Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing snapshot, as if it had been committed earlier.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            latest: Mutex::new(Some(snapshot)),
        }
    }

    pub fn latest(&self) -> Option<Snapshot> {
        self.latest.lock().clone()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> PersistenceResult<Option<Snapshot>> {
        Ok(self.latest.lock().clone())
    }

    fn commit(&self, snapshot: &Snapshot) -> PersistenceResult<()> {
        *self.latest.lock() = Some(snapshot.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
