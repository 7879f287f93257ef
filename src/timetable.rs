use crate::catalog::{Classroom, Group, Subject, Teacher};
use crate::config::{BackendKind, TimetableConfig};
use crate::error::{StoreError, StoreResult};
use crate::lesson::{LessonFields, LessonSlot};
use crate::persistence::{JsonFileStore, MemorySnapshotStore, SnapshotStore};
use crate::query::{self, LessonFilter, LessonView};
use crate::snapshot::Snapshot;
use crate::store::{CatalogSlot, Tables};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

/// Handle to one timetable: the live tables plus the snapshot store they are
/// committed to.
///
/// Reads share the lock. Every mutation holds the write lock across its whole
/// check-then-commit sequence and is applied to a staged copy of the tables,
/// which replaces the live copy only after the snapshot commit succeeds.
pub struct Timetable {
    tables: RwLock<Tables>,
    backend: Box<dyn SnapshotStore>,
}

impl Timetable {
    /// Loads the latest snapshot from `backend`, or starts empty when there is
    /// none.
    pub fn open<S: SnapshotStore + 'static>(backend: S) -> StoreResult<Self> {
        let tables = match backend.load() {
            Ok(Some(snapshot)) => {
                let saved_at = snapshot.saved_at;
                let tables = snapshot.into_tables().inspect_err(|err| {
                    warn!(store = %backend.describe(), error = %err, "rejected timetable snapshot");
                })?;
                info!(
                    store = %backend.describe(),
                    %saved_at,
                    groups = tables.groups().len(),
                    teachers = tables.teachers().len(),
                    subjects = tables.subjects().len(),
                    classrooms = tables.classrooms().len(),
                    lessons = tables.lesson_count(),
                    "loaded timetable snapshot"
                );
                tables
            }
            Ok(None) => {
                info!(store = %backend.describe(), "no snapshot found, starting empty");
                Tables::new()
            }
            Err(err) => {
                warn!(store = %backend.describe(), error = %err, "failed to load timetable snapshot");
                return Err(err.into());
            }
        };
        Ok(Self {
            tables: RwLock::new(tables),
            backend: Box::new(backend),
        })
    }

    pub fn open_with_config(config: &TimetableConfig) -> StoreResult<Self> {
        match config.backend {
            BackendKind::Json => Self::open(JsonFileStore::new(&config.snapshot_path)),
            #[cfg(feature = "sqlite")]
            BackendKind::Sqlite => Self::open(crate::persistence::sqlite::SqliteSnapshotStore::new(
                &config.snapshot_path,
            )?),
            #[cfg(not(feature = "sqlite"))]
            BackendKind::Sqlite => Err(StoreError::validation(
                "the sqlite backend requires the `sqlite` feature",
            )),
        }
    }

    /// An empty timetable whose commits stay in memory.
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::new()),
            backend: Box::new(MemorySnapshotStore::new()),
        }
    }

    pub fn describe_backend(&self) -> String {
        self.backend.describe()
    }

    /// The snapshot the live state would commit right now.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_tables(&self.tables.read())
    }

    fn read<R>(&self, op: impl FnOnce(&Tables) -> StoreResult<R>) -> StoreResult<R> {
        let guard = self.tables.read();
        op(&guard)
    }

    fn mutate<R>(
        &self,
        action: &'static str,
        op: impl FnOnce(&mut Tables) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut guard = self.tables.write();
        let mut staged = guard.clone();
        let value = op(&mut staged).inspect_err(|err| {
            debug!(action, error = %err, "mutation rejected");
        })?;
        let snapshot = Snapshot::from_tables(&staged);
        self.backend.commit(&snapshot).map_err(|err| {
            warn!(action, store = %self.backend.describe(), error = %err, "snapshot commit failed");
            StoreError::from(err)
        })?;
        *guard = staged;
        info!(action, "committed timetable snapshot");
        Ok(value)
    }

    // Catalogs, generic over the four row kinds.

    pub fn create_entry<T: CatalogSlot>(&self, key: &str) -> StoreResult<T> {
        self.mutate("create", |tables| tables.create_entry::<T>(key))
    }

    pub fn list_entries<T: CatalogSlot>(&self) -> StoreResult<Vec<T>> {
        self.read(|tables| Ok(T::catalog(tables).list()))
    }

    pub fn get_entry<T: CatalogSlot>(&self, id: i64) -> StoreResult<T> {
        self.read(|tables| T::catalog(tables).get(id).cloned())
    }

    pub fn update_entry<T: CatalogSlot>(&self, id: i64, key: &str) -> StoreResult<T> {
        self.mutate("update", |tables| tables.update_entry::<T>(id, key))
    }

    /// Deletes a catalog row. Returns how many lessons the cascade removed.
    pub fn delete_entry<T: CatalogSlot>(&self, id: i64) -> StoreResult<usize> {
        self.mutate("delete", |tables| tables.delete_entry::<T>(id))
    }

    pub fn create_group(&self, name: &str) -> StoreResult<Group> {
        self.create_entry(name)
    }

    pub fn list_groups(&self) -> StoreResult<Vec<Group>> {
        self.list_entries()
    }

    pub fn get_group(&self, id: i64) -> StoreResult<Group> {
        self.get_entry(id)
    }

    pub fn update_group(&self, id: i64, name: &str) -> StoreResult<Group> {
        self.update_entry(id, name)
    }

    pub fn delete_group(&self, id: i64) -> StoreResult<usize> {
        self.delete_entry::<Group>(id)
    }

    pub fn create_teacher(&self, full_name: &str) -> StoreResult<Teacher> {
        self.create_entry(full_name)
    }

    pub fn list_teachers(&self) -> StoreResult<Vec<Teacher>> {
        self.list_entries()
    }

    pub fn get_teacher(&self, id: i64) -> StoreResult<Teacher> {
        self.get_entry(id)
    }

    pub fn update_teacher(&self, id: i64, full_name: &str) -> StoreResult<Teacher> {
        self.update_entry(id, full_name)
    }

    pub fn delete_teacher(&self, id: i64) -> StoreResult<usize> {
        self.delete_entry::<Teacher>(id)
    }

    pub fn create_subject(&self, name: &str) -> StoreResult<Subject> {
        self.create_entry(name)
    }

    pub fn list_subjects(&self) -> StoreResult<Vec<Subject>> {
        self.list_entries()
    }

    pub fn get_subject(&self, id: i64) -> StoreResult<Subject> {
        self.get_entry(id)
    }

    pub fn update_subject(&self, id: i64, name: &str) -> StoreResult<Subject> {
        self.update_entry(id, name)
    }

    pub fn delete_subject(&self, id: i64) -> StoreResult<usize> {
        self.delete_entry::<Subject>(id)
    }

    pub fn create_classroom(&self, room_number: &str) -> StoreResult<Classroom> {
        self.create_entry(room_number)
    }

    pub fn list_classrooms(&self) -> StoreResult<Vec<Classroom>> {
        self.list_entries()
    }

    pub fn get_classroom(&self, id: i64) -> StoreResult<Classroom> {
        self.get_entry(id)
    }

    pub fn update_classroom(&self, id: i64, room_number: &str) -> StoreResult<Classroom> {
        self.update_entry(id, room_number)
    }

    pub fn delete_classroom(&self, id: i64) -> StoreResult<usize> {
        self.delete_entry::<Classroom>(id)
    }

    // Schedule

    pub fn create_lesson(&self, fields: LessonFields) -> StoreResult<LessonSlot> {
        self.mutate("create_lesson", |tables| tables.create_lesson(fields))
    }

    pub fn get_lesson(&self, id: i64) -> StoreResult<LessonSlot> {
        self.read(|tables| tables.get_lesson(id).copied())
    }

    pub fn update_lesson(&self, id: i64, fields: LessonFields) -> StoreResult<LessonSlot> {
        self.mutate("update_lesson", |tables| tables.update_lesson(id, fields))
    }

    pub fn delete_lesson(&self, id: i64) -> StoreResult<()> {
        self.mutate("delete_lesson", |tables| tables.delete_lesson(id).map(|_| ()))
    }

    pub fn list_lessons(&self, filter: &LessonFilter) -> StoreResult<Vec<LessonView>> {
        self.read(|tables| {
            let lessons = query::list_lessons(tables, filter)?;
            debug!(?filter, count = lessons.len(), "listed lessons");
            Ok(lessons)
        })
    }
}
