use crate::catalog::{Catalog, Classroom, Group, Subject, Teacher};
use crate::error::EntityKind;
use crate::lesson::{LessonSlot, validate_lesson_number};
use crate::persistence::{PersistenceError, PersistenceResult};
use crate::store::Tables;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Next identifier to hand out per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequences {
    pub group: i64,
    pub teacher: i64,
    pub subject: i64,
    pub classroom: i64,
    pub lesson: i64,
}

/// Whole-store durable image: every catalog, every lesson, and the id
/// sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub saved_at: DateTime<Utc>,
    pub sequences: Sequences,
    pub groups: Vec<Group>,
    pub teachers: Vec<Teacher>,
    pub subjects: Vec<Subject>,
    pub classrooms: Vec<Classroom>,
    pub lessons: Vec<LessonSlot>,
}

impl Snapshot {
    pub fn from_tables(tables: &Tables) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            saved_at: Utc::now(),
            sequences: Sequences {
                group: tables.groups().next_id(),
                teacher: tables.teachers().next_id(),
                subject: tables.subjects().next_id(),
                classroom: tables.classrooms().next_id(),
                lesson: tables.next_lesson_id(),
            },
            groups: tables.groups().rows().cloned().collect(),
            teachers: tables.teachers().rows().cloned().collect(),
            subjects: tables.subjects().rows().cloned().collect(),
            classrooms: tables.classrooms().rows().cloned().collect(),
            lessons: tables.lessons().copied().collect(),
        }
    }

    /// Rebuilds the in-memory tables, rejecting any snapshot that breaks a
    /// store invariant.
    pub fn into_tables(self) -> PersistenceResult<Tables> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(invalid(format!(
                "unsupported snapshot format version {} (expected {SNAPSHOT_FORMAT_VERSION})",
                self.format_version
            )));
        }
        if self.sequences.lesson < 1 {
            return Err(invalid(format!(
                "lesson sequence {} is below 1",
                self.sequences.lesson
            )));
        }
        let mut tables = Tables {
            groups: Catalog::from_rows(self.groups, self.sequences.group).map_err(invalid)?,
            teachers: Catalog::from_rows(self.teachers, self.sequences.teacher)
                .map_err(invalid)?,
            subjects: Catalog::from_rows(self.subjects, self.sequences.subject)
                .map_err(invalid)?,
            classrooms: Catalog::from_rows(self.classrooms, self.sequences.classroom)
                .map_err(invalid)?,
            lessons: BTreeMap::new(),
            next_lesson_id: self.sequences.lesson,
        };

        for lesson in self.lessons {
            let id = lesson.id;
            if id < 1 || id >= tables.next_lesson_id {
                return Err(invalid(format!(
                    "lesson id {id} is outside 1..{}",
                    tables.next_lesson_id
                )));
            }
            if tables.lessons.contains_key(&id) {
                return Err(invalid(format!("duplicate lesson id {id}")));
            }
            validate_lesson_number(lesson.fields.lesson_number)
                .map_err(|err| invalid(format!("lesson {id}: {err}")))?;
            for kind in [
                EntityKind::Group,
                EntityKind::Subject,
                EntityKind::Teacher,
                EntityKind::Classroom,
            ] {
                if let Some(target) = lesson.reference(kind)
                    && !tables.catalog_contains(kind, target)
                {
                    return Err(invalid(format!(
                        "lesson {id} references missing {kind} {target}"
                    )));
                }
            }
            if let Some((resource, occupant)) = tables.find_conflict(&lesson.fields, None) {
                return Err(invalid(format!(
                    "lesson {id} double-books {resource} with lesson {} on {} lesson {}",
                    occupant.id, lesson.fields.day_of_week, lesson.fields.lesson_number
                )));
            }
            tables.lessons.insert(id, lesson);
        }
        Ok(tables)
    }
}

fn invalid(message: String) -> PersistenceError {
    PersistenceError::InvalidSnapshot(message)
}
