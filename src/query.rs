use crate::error::{StoreError, StoreResult};
use crate::lesson::{DayOfWeek, LessonSlot};
use crate::store::Tables;
use serde::{Deserialize, Serialize};

/// Optional equality filters for lesson listings. Unset fields match
/// everything; set fields are combined with AND.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<DayOfWeek>,
}

impl LessonFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_group(group_id: i64) -> Self {
        Self {
            group_id: Some(group_id),
            ..Self::default()
        }
    }

    pub fn on_day(day: DayOfWeek) -> Self {
        Self {
            day_of_week: Some(day),
            ..Self::default()
        }
    }

    pub fn with_group(mut self, group_id: i64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_day(mut self, day: DayOfWeek) -> Self {
        self.day_of_week = Some(day);
        self
    }

    pub fn matches(&self, lesson: &LessonSlot) -> bool {
        self.group_id
            .is_none_or(|group_id| lesson.fields.group_id == group_id)
            && self
                .day_of_week
                .is_none_or(|day| lesson.fields.day_of_week == day)
    }
}

/// A lesson joined with the names of everything it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonView {
    pub id: i64,
    pub day_of_week: DayOfWeek,
    pub lesson_number: u8,
    pub group_id: i64,
    pub group_name: String,
    pub subject_id: i64,
    pub subject_name: String,
    pub teacher_id: i64,
    pub teacher_name: String,
    pub classroom_id: i64,
    pub classroom_number: String,
}

impl LessonView {
    fn join(tables: &Tables, lesson: &LessonSlot) -> StoreResult<Self> {
        let fields = &lesson.fields;
        let dangling = |what: &str, id: i64| {
            StoreError::InternalInconsistency(format!(
                "lesson {} references missing {what} {id}",
                lesson.id
            ))
        };
        let group = tables
            .groups()
            .get(fields.group_id)
            .map_err(|_| dangling("group", fields.group_id))?;
        let subject = tables
            .subjects()
            .get(fields.subject_id)
            .map_err(|_| dangling("subject", fields.subject_id))?;
        let teacher = tables
            .teachers()
            .get(fields.teacher_id)
            .map_err(|_| dangling("teacher", fields.teacher_id))?;
        let classroom = tables
            .classrooms()
            .get(fields.classroom_id)
            .map_err(|_| dangling("classroom", fields.classroom_id))?;
        Ok(Self {
            id: lesson.id,
            day_of_week: fields.day_of_week,
            lesson_number: fields.lesson_number,
            group_id: group.id,
            group_name: group.name.clone(),
            subject_id: subject.id,
            subject_name: subject.name.clone(),
            teacher_id: teacher.id,
            teacher_name: teacher.full_name.clone(),
            classroom_id: classroom.id,
            classroom_number: classroom.room_number.clone(),
        })
    }
}

/// Lessons matching `filter`, ordered by week day, lesson number, then id.
pub fn list_lessons(tables: &Tables, filter: &LessonFilter) -> StoreResult<Vec<LessonView>> {
    let mut lessons: Vec<&LessonSlot> = tables
        .lessons()
        .filter(|lesson| filter.matches(lesson))
        .collect();
    lessons.sort_by_key(|lesson| {
        (
            lesson.fields.day_of_week,
            lesson.fields.lesson_number,
            lesson.id,
        )
    });
    lessons
        .into_iter()
        .map(|lesson| LessonView::join(tables, lesson))
        .collect()
}
