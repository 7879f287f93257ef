use crate::catalog::{
    Catalog, CatalogRecord, Classroom, Group, Subject, Teacher, advance_sequence,
};
use crate::error::{EntityKind, StoreError, StoreResult};
use crate::lesson::{LessonFields, LessonSlot};
use std::collections::BTreeMap;

/// Order in which occupied triples are checked. The first hit is reported.
pub const CONFLICT_ORDER: [EntityKind; 3] =
    [EntityKind::Group, EntityKind::Teacher, EntityKind::Classroom];

/// Order in which lesson references are resolved.
const REFERENCE_ORDER: [EntityKind; 4] = [
    EntityKind::Group,
    EntityKind::Subject,
    EntityKind::Teacher,
    EntityKind::Classroom,
];

/// The in-memory relational state: four catalogs and the lesson table.
///
/// `Tables` is purely synchronous and knows nothing about locking or
/// persistence; [`crate::Timetable`] wraps it with both.
#[derive(Debug, Clone)]
pub struct Tables {
    pub(crate) groups: Catalog<Group>,
    pub(crate) teachers: Catalog<Teacher>,
    pub(crate) subjects: Catalog<Subject>,
    pub(crate) classrooms: Catalog<Classroom>,
    pub(crate) lessons: BTreeMap<i64, LessonSlot>,
    pub(crate) next_lesson_id: i64,
}

/// Gives the store typed access to the catalog holding `Self`.
pub trait CatalogSlot: CatalogRecord {
    fn catalog(tables: &Tables) -> &Catalog<Self>;
    fn catalog_mut(tables: &mut Tables) -> &mut Catalog<Self>;
}

macro_rules! catalog_slot {
    ($ty:ty, $field:ident) => {
        impl CatalogSlot for $ty {
            fn catalog(tables: &Tables) -> &Catalog<Self> {
                &tables.$field
            }

            fn catalog_mut(tables: &mut Tables) -> &mut Catalog<Self> {
                &mut tables.$field
            }
        }
    };
}

catalog_slot!(Group, groups);
catalog_slot!(Teacher, teachers);
catalog_slot!(Subject, subjects);
catalog_slot!(Classroom, classrooms);

impl Default for Tables {
    fn default() -> Self {
        Self {
            groups: Catalog::default(),
            teachers: Catalog::default(),
            subjects: Catalog::default(),
            classrooms: Catalog::default(),
            lessons: BTreeMap::new(),
            next_lesson_id: 1,
        }
    }
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &Catalog<Group> {
        &self.groups
    }

    pub fn teachers(&self) -> &Catalog<Teacher> {
        &self.teachers
    }

    pub fn subjects(&self) -> &Catalog<Subject> {
        &self.subjects
    }

    pub fn classrooms(&self) -> &Catalog<Classroom> {
        &self.classrooms
    }

    /// Lessons in id order.
    pub fn lessons(&self) -> impl Iterator<Item = &LessonSlot> {
        self.lessons.values()
    }

    pub fn lesson_count(&self) -> usize {
        self.lessons.len()
    }

    pub fn next_lesson_id(&self) -> i64 {
        self.next_lesson_id
    }

    pub fn create_entry<T: CatalogSlot>(&mut self, key: &str) -> StoreResult<T> {
        T::catalog_mut(self).create(key)
    }

    pub fn update_entry<T: CatalogSlot>(&mut self, id: i64, key: &str) -> StoreResult<T> {
        T::catalog_mut(self).update(id, key)
    }

    /// Removes a catalog row and every lesson referencing it. Returns the
    /// number of lessons removed by the cascade.
    pub fn delete_entry<T: CatalogSlot>(&mut self, id: i64) -> StoreResult<usize> {
        T::catalog_mut(self).remove(id)?;
        let before = self.lessons.len();
        self.lessons
            .retain(|_, lesson| lesson.reference(T::ENTITY) != Some(id));
        Ok(before - self.lessons.len())
    }

    pub fn get_lesson(&self, id: i64) -> StoreResult<&LessonSlot> {
        self.lessons
            .get(&id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Lesson, id))
    }

    pub fn create_lesson(&mut self, fields: LessonFields) -> StoreResult<LessonSlot> {
        fields.validate()?;
        self.check_references(&fields)?;
        self.check_conflicts(&fields, None)?;
        let next_lesson_id = advance_sequence(EntityKind::Lesson, self.next_lesson_id)?;
        let lesson = LessonSlot::new(self.next_lesson_id, fields);
        self.lessons.insert(lesson.id, lesson);
        self.next_lesson_id = next_lesson_id;
        Ok(lesson)
    }

    pub fn update_lesson(&mut self, id: i64, fields: LessonFields) -> StoreResult<LessonSlot> {
        fields.validate()?;
        if !self.lessons.contains_key(&id) {
            return Err(StoreError::not_found(EntityKind::Lesson, id));
        }
        self.check_references(&fields)?;
        self.check_conflicts(&fields, Some(id))?;
        let lesson = LessonSlot::new(id, fields);
        self.lessons.insert(id, lesson);
        Ok(lesson)
    }

    pub fn delete_lesson(&mut self, id: i64) -> StoreResult<LessonSlot> {
        self.lessons
            .remove(&id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Lesson, id))
    }

    pub(crate) fn catalog_contains(&self, kind: EntityKind, id: i64) -> bool {
        match kind {
            EntityKind::Group => self.groups.contains(id),
            EntityKind::Teacher => self.teachers.contains(id),
            EntityKind::Subject => self.subjects.contains(id),
            EntityKind::Classroom => self.classrooms.contains(id),
            EntityKind::Lesson => self.lessons.contains_key(&id),
        }
    }

    /// Display label of a catalog row, used in conflict messages.
    pub(crate) fn label(&self, kind: EntityKind, id: i64) -> Option<&str> {
        match kind {
            EntityKind::Group => self.groups.get(id).ok().map(|row| row.name.as_str()),
            EntityKind::Teacher => self
                .teachers
                .get(id)
                .ok()
                .map(|row| row.full_name.as_str()),
            EntityKind::Subject => self.subjects.get(id).ok().map(|row| row.name.as_str()),
            EntityKind::Classroom => self
                .classrooms
                .get(id)
                .ok()
                .map(|row| row.room_number.as_str()),
            EntityKind::Lesson => None,
        }
    }

    fn check_references(&self, fields: &LessonFields) -> StoreResult<()> {
        for kind in REFERENCE_ORDER {
            let Some(id) = fields.reference(kind) else {
                continue;
            };
            if !self.catalog_contains(kind, id) {
                return Err(StoreError::Reference { entity: kind, id });
            }
        }
        Ok(())
    }

    /// Finds the first lesson (other than `exclude`) that already occupies one
    /// of the three triples `fields` would claim.
    pub fn find_conflict(
        &self,
        fields: &LessonFields,
        exclude: Option<i64>,
    ) -> Option<(EntityKind, &LessonSlot)> {
        CONFLICT_ORDER.into_iter().find_map(|kind| {
            let resource = fields.reference(kind)?;
            self.lessons
                .values()
                .find(|lesson| {
                    Some(lesson.id) != exclude
                        && lesson
                            .fields
                            .occupies(fields.day_of_week, fields.lesson_number)
                        && lesson.reference(kind) == Some(resource)
                })
                .map(|lesson| (kind, lesson))
        })
    }

    fn check_conflicts(&self, fields: &LessonFields, exclude: Option<i64>) -> StoreResult<()> {
        let Some((resource, occupant)) = self.find_conflict(fields, exclude) else {
            return Ok(());
        };
        let resource_id = fields.reference(resource).unwrap_or_default();
        let resource_label = self
            .label(resource, resource_id)
            .map(str::to_string)
            .unwrap_or_else(|| resource_id.to_string());
        Err(StoreError::Conflict {
            resource,
            resource_id,
            resource_label,
            day: fields.day_of_week,
            lesson_number: fields.lesson_number,
            occupant: occupant.id,
        })
    }
}
