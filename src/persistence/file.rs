use super::{PersistenceResult, SnapshotStore};
use crate::query::LessonView;
use crate::snapshot::Snapshot;
use serde::Serialize;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Snapshot stored as a pretty-printed JSON file.
///
/// Commits write a sibling `<path>.tmp`, sync it, and rename it over the
/// snapshot, so a crash mid-write never leaves a torn file behind.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn temp_path(&self) -> PathBuf {
        let mut path: OsString = self.path.as_os_str().to_os_string();
        path.push(".tmp");
        PathBuf::from(path)
    }

    fn write_temp(&self, temp_path: &Path, snapshot: &Snapshot) -> PersistenceResult<()> {
        let file = File::create(temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, snapshot)?;
        writer.flush()?;
        let file = writer.into_inner().map_err(|err| err.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> PersistenceResult<Option<Snapshot>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let snapshot: Snapshot = serde_json::from_reader(file)?;
        Ok(Some(snapshot))
    }

    fn commit(&self, snapshot: &Snapshot) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.temp_path();
        let result = self
            .write_temp(&temp_path, snapshot)
            .and_then(|()| fs::rename(&temp_path, &self.path).map_err(Into::into));
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
            return result;
        }
        // The rename already published the snapshot, so the commit stands.
        if let Err(err) = sync_parent_dir(&self.path) {
            warn!(path = %self.path.display(), error = %err, "failed to sync snapshot directory");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// Flushes the directory entry written by a rename.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> PersistenceResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

// Directories cannot be opened as files here.
#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> PersistenceResult<()> {
    Ok(())
}

#[derive(Serialize)]
struct LessonCsvRecord<'a> {
    id: i64,
    day_of_week: &'static str,
    lesson_number: u8,
    group_id: i64,
    group_name: &'a str,
    subject_id: i64,
    subject_name: &'a str,
    teacher_id: i64,
    teacher_name: &'a str,
    classroom_id: i64,
    classroom_number: &'a str,
}

impl<'a> From<&'a LessonView> for LessonCsvRecord<'a> {
    fn from(view: &'a LessonView) -> Self {
        Self {
            id: view.id,
            day_of_week: view.day_of_week.as_str(),
            lesson_number: view.lesson_number,
            group_id: view.group_id,
            group_name: &view.group_name,
            subject_id: view.subject_id,
            subject_name: &view.subject_name,
            teacher_id: view.teacher_id,
            teacher_name: &view.teacher_name,
            classroom_id: view.classroom_id,
            classroom_number: &view.classroom_number,
        }
    }
}

/// Writes an enriched lesson listing as CSV, one row per lesson in the given
/// order.
pub fn export_lessons_csv<P: AsRef<Path>>(path: P, lessons: &[LessonView]) -> PersistenceResult<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for lesson in lessons {
        writer.serialize(LessonCsvRecord::from(lesson))?;
    }
    writer.flush()?;
    Ok(())
}
