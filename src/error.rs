use crate::lesson::DayOfWeek;
use crate::persistence::PersistenceError;
use std::fmt;
use thiserror::Error;

/// The kinds of record the store keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Group,
    Teacher,
    Subject,
    Classroom,
    Lesson,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Group => "group",
            EntityKind::Teacher => "teacher",
            EntityKind::Subject => "subject",
            EntityKind::Classroom => "classroom",
            EntityKind::Lesson => "lesson",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable error classification handed to callers at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Reference,
    Conflict,
    DuplicateKey,
    NotFound,
    IoFailure,
    InternalInconsistency,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Reference => "reference_error",
            ErrorKind::Conflict => "conflict",
            ErrorKind::DuplicateKey => "duplicate_key",
            ErrorKind::NotFound => "not_found",
            ErrorKind::IoFailure => "io_failure",
            ErrorKind::InternalInconsistency => "internal_inconsistency",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{entity} {id} does not exist")]
    Reference { entity: EntityKind, id: i64 },

    /// A (resource, day, lesson number) triple is already occupied.
    #[error(
        "{resource} '{resource_label}' is already booked on {day}, lesson {lesson_number} (lesson #{occupant})"
    )]
    Conflict {
        resource: EntityKind,
        resource_id: i64,
        resource_label: String,
        day: DayOfWeek,
        lesson_number: u8,
        occupant: i64,
    },

    #[error("{entity} with {field} '{value}' already exists (id {existing})")]
    DuplicateKey {
        entity: EntityKind,
        field: &'static str,
        value: String,
        existing: i64,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: i64 },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    pub fn not_found(entity: EntityKind, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::Reference { .. } => ErrorKind::Reference,
            StoreError::Conflict { .. } => ErrorKind::Conflict,
            StoreError::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Persistence(_) => ErrorKind::IoFailure,
            StoreError::InternalInconsistency(_) => ErrorKind::InternalInconsistency,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
