use super::{PersistenceResult, SnapshotStore};
use crate::snapshot::Snapshot;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};

/// Snapshot stored as a single JSON row inside a SQLite database. Each commit
/// replaces the row in one transaction.
pub struct SqliteSnapshotStore {
    connection: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteSnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let path = path.as_ref().to_path_buf();
        let connection = Connection::open(&path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            path,
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS timetable_snapshot (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                format_version INTEGER NOT NULL,
                saved_at TEXT NOT NULL,
                snapshot_json TEXT NOT NULL
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn load(&self) -> PersistenceResult<Option<Snapshot>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare("SELECT snapshot_json FROM timetable_snapshot WHERE id = 1")?;
        let json: Option<String> = stmt.query_row([], |row| row.get(0)).optional()?;
        let Some(json) = json else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn commit(&self, snapshot: &Snapshot) -> PersistenceResult<()> {
        let json = serde_json::to_string(snapshot)?;
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM timetable_snapshot", [])?;
        tx.execute(
            "INSERT INTO timetable_snapshot (id, format_version, saved_at, snapshot_json) VALUES (1, ?1, ?2, ?3)",
            params![
                snapshot.format_version,
                snapshot.saved_at.to_rfc3339(),
                json
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}
