pub mod catalog;
pub mod config;
pub mod error;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod lesson;
pub mod persistence;
pub mod query;
pub mod snapshot;
pub mod store;
pub mod timetable;

pub use catalog::{Catalog, CatalogRecord, Classroom, Group, Subject, Teacher};
pub use config::{BackendKind, ConfigError, TimetableConfig};
pub use error::{EntityKind, ErrorKind, StoreError, StoreResult};
pub use lesson::{DayOfWeek, LESSON_NUMBER_MAX, LESSON_NUMBER_MIN, LessonFields, LessonSlot};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteSnapshotStore;
pub use persistence::{
    JsonFileStore, MemorySnapshotStore, PersistenceError, PersistenceResult, SnapshotStore,
    export_lessons_csv,
};
pub use query::{LessonFilter, LessonView};
pub use snapshot::{SNAPSHOT_FORMAT_VERSION, Sequences, Snapshot};
pub use store::{CatalogSlot, Tables};
pub use timetable::Timetable;
