use crate::snapshot::Snapshot;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Durable home of the whole-store snapshot.
///
/// `commit` must either replace the stored snapshot completely or leave the
/// previous one untouched.
pub trait SnapshotStore: Send + Sync {
    /// Returns `None` when nothing has been committed yet.
    fn load(&self) -> PersistenceResult<Option<Snapshot>>;
    fn commit(&self, snapshot: &Snapshot) -> PersistenceResult<()>;
    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{JsonFileStore, export_lessons_csv};
pub use memory::MemorySnapshotStore;
