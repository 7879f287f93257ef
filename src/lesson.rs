use crate::error::{EntityKind, StoreError, StoreResult};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const LESSON_NUMBER_MIN: u8 = 1;
pub const LESSON_NUMBER_MAX: u8 = 8;

/// Teaching days. The derived ordering is the canonical week order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    #[serde(alias = "Понедельник")]
    Monday,
    #[serde(alias = "Вторник")]
    Tuesday,
    #[serde(alias = "Среда")]
    Wednesday,
    #[serde(alias = "Четверг")]
    Thursday,
    #[serde(alias = "Пятница")]
    Friday,
    #[serde(alias = "Суббота")]
    Saturday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 6] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
        }
    }

    pub fn russian_name(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Понедельник",
            DayOfWeek::Tuesday => "Вторник",
            DayOfWeek::Wednesday => "Среда",
            DayOfWeek::Thursday => "Четверг",
            DayOfWeek::Friday => "Пятница",
            DayOfWeek::Saturday => "Суббота",
        }
    }

    pub fn weekday(&self) -> Weekday {
        match self {
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
        }
    }

    /// Returns `None` for Sunday, which is never a teaching day.
    pub fn from_weekday(weekday: Weekday) -> Option<Self> {
        Self::ALL.into_iter().find(|day| day.weekday() == weekday)
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| {
                needle == day.as_str().to_lowercase()
                    || needle == day.as_str()[..3].to_lowercase()
                    || needle == day.russian_name().to_lowercase()
            })
            .ok_or_else(|| {
                StoreError::validation(format!(
                    "invalid day_of_week '{}' (expected Monday through Saturday)",
                    s.trim()
                ))
            })
    }
}

pub fn validate_lesson_number(lesson_number: u8) -> StoreResult<()> {
    if !(LESSON_NUMBER_MIN..=LESSON_NUMBER_MAX).contains(&lesson_number) {
        return Err(StoreError::validation(format!(
            "lesson_number {lesson_number} is out of range {LESSON_NUMBER_MIN}..={LESSON_NUMBER_MAX}"
        )));
    }
    Ok(())
}

/// The caller-supplied part of a lesson slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonFields {
    pub group_id: i64,
    pub subject_id: i64,
    pub teacher_id: i64,
    pub classroom_id: i64,
    pub day_of_week: DayOfWeek,
    pub lesson_number: u8,
}

impl LessonFields {
    pub fn validate(&self) -> StoreResult<()> {
        validate_lesson_number(self.lesson_number)
    }

    /// The id this lesson holds for `kind`, if it references that catalog.
    pub fn reference(&self, kind: EntityKind) -> Option<i64> {
        match kind {
            EntityKind::Group => Some(self.group_id),
            EntityKind::Subject => Some(self.subject_id),
            EntityKind::Teacher => Some(self.teacher_id),
            EntityKind::Classroom => Some(self.classroom_id),
            EntityKind::Lesson => None,
        }
    }

    pub fn occupies(&self, day: DayOfWeek, lesson_number: u8) -> bool {
        self.day_of_week == day && self.lesson_number == lesson_number
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonSlot {
    pub id: i64,
    #[serde(flatten)]
    pub fields: LessonFields,
}

impl LessonSlot {
    pub fn new(id: i64, fields: LessonFields) -> Self {
        Self { id, fields }
    }

    pub fn reference(&self, kind: EntityKind) -> Option<i64> {
        self.fields.reference(kind)
    }
}
