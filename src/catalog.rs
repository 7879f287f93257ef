//! Reference catalogs: groups, teachers, subjects, and classrooms.
//!
//! Every catalog row is an identifier plus one text field (its display key).
//! [`Catalog`] owns the rows of one kind together with the id sequence, and
//! enforces the per-kind rules: non-empty keys, and uniqueness where the kind
//! demands it. Catalogs know nothing about lessons; cascading deletes are the
//! schedule store's concern.

use crate::error::{EntityKind, StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A row kind that can live in a [`Catalog`].
pub trait CatalogRecord: Clone + Serialize + DeserializeOwned {
    const ENTITY: EntityKind;
    /// Name of the display key field in payloads and snapshots.
    const KEY_FIELD: &'static str;
    /// Whether two rows may share the same display key.
    const UNIQUE_KEY: bool;

    fn from_parts(id: i64, key: String) -> Self;
    fn id(&self) -> i64;
    fn key(&self) -> &str;
    fn set_key(&mut self, key: String);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: i64,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classroom {
    pub id: i64,
    pub room_number: String,
}

macro_rules! catalog_record {
    ($ty:ident, $entity:expr, $field:ident, $unique:expr) => {
        impl CatalogRecord for $ty {
            const ENTITY: EntityKind = $entity;
            const KEY_FIELD: &'static str = stringify!($field);
            const UNIQUE_KEY: bool = $unique;

            fn from_parts(id: i64, key: String) -> Self {
                Self { id, $field: key }
            }

            fn id(&self) -> i64 {
                self.id
            }

            fn key(&self) -> &str {
                &self.$field
            }

            fn set_key(&mut self, key: String) {
                self.$field = key;
            }
        }
    };
}

catalog_record!(Group, EntityKind::Group, name, true);
catalog_record!(Teacher, EntityKind::Teacher, full_name, false);
catalog_record!(Subject, EntityKind::Subject, name, true);
catalog_record!(Classroom, EntityKind::Classroom, room_number, true);

/// The sequence value after `current`, or an error once the id space is spent.
pub(crate) fn advance_sequence(entity: EntityKind, current: i64) -> StoreResult<i64> {
    current.checked_add(1).ok_or_else(|| {
        StoreError::InternalInconsistency(format!("{entity} id sequence is exhausted"))
    })
}

/// Trims `raw` and rejects an empty result.
pub fn normalize_key<T: CatalogRecord>(raw: &str) -> StoreResult<String> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(StoreError::validation(format!(
            "{} {} must not be empty",
            T::ENTITY,
            T::KEY_FIELD
        )));
    }
    Ok(key.to_string())
}

#[derive(Debug, Clone)]
pub struct Catalog<T> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

impl<T: CatalogRecord> Default for Catalog<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T: CatalogRecord> Catalog<T> {
    /// Rebuilds a catalog from persisted rows, checking ids, keys, and the
    /// sequence counter.
    pub fn from_rows(rows: Vec<T>, next_id: i64) -> Result<Self, String> {
        if next_id < 1 {
            return Err(format!("{} sequence {next_id} is below 1", T::ENTITY));
        }
        let mut catalog = Self {
            rows: BTreeMap::new(),
            next_id,
        };
        for row in rows {
            let id = row.id();
            if id < 1 {
                return Err(format!("{} has non-positive id {id}", T::ENTITY));
            }
            if id >= next_id {
                return Err(format!(
                    "{} id {id} is not below the sequence counter {next_id}",
                    T::ENTITY
                ));
            }
            if row.key().trim().is_empty() {
                return Err(format!("{} {id} has an empty {}", T::ENTITY, T::KEY_FIELD));
            }
            if let Some(existing) = catalog.key_holder(row.key(), None) {
                return Err(format!(
                    "{} {id} duplicates {} '{}' of {} {existing}",
                    T::ENTITY,
                    T::KEY_FIELD,
                    row.key(),
                    T::ENTITY
                ));
            }
            if catalog.rows.insert(id, row).is_some() {
                return Err(format!("duplicate {} id {id}", T::ENTITY));
            }
        }
        Ok(catalog)
    }

    pub fn next_id(&self) -> i64 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn get(&self, id: i64) -> StoreResult<&T> {
        self.rows
            .get(&id)
            .ok_or_else(|| StoreError::not_found(T::ENTITY, id))
    }

    /// Rows in id order.
    pub fn rows(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    /// Rows sorted by display key, ties broken by id.
    pub fn list(&self) -> Vec<T> {
        let mut rows: Vec<T> = self.rows.values().cloned().collect();
        rows.sort_by(|a, b| a.key().cmp(b.key()).then(a.id().cmp(&b.id())));
        rows
    }

    pub fn create(&mut self, raw_key: &str) -> StoreResult<T> {
        let key = normalize_key::<T>(raw_key)?;
        self.ensure_key_available(&key, None)?;
        let id = self.next_id;
        let next_id = advance_sequence(T::ENTITY, id)?;
        let row = T::from_parts(id, key);
        self.rows.insert(id, row.clone());
        self.next_id = next_id;
        Ok(row)
    }

    pub fn update(&mut self, id: i64, raw_key: &str) -> StoreResult<T> {
        let key = normalize_key::<T>(raw_key)?;
        if !self.contains(id) {
            return Err(StoreError::not_found(T::ENTITY, id));
        }
        self.ensure_key_available(&key, Some(id))?;
        let row = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(T::ENTITY, id))?;
        row.set_key(key);
        Ok(row.clone())
    }

    pub fn remove(&mut self, id: i64) -> StoreResult<T> {
        self.rows
            .remove(&id)
            .ok_or_else(|| StoreError::not_found(T::ENTITY, id))
    }

    fn key_holder(&self, key: &str, exclude: Option<i64>) -> Option<i64> {
        if !T::UNIQUE_KEY {
            return None;
        }
        self.rows
            .values()
            .find(|row| Some(row.id()) != exclude && row.key() == key)
            .map(CatalogRecord::id)
    }

    fn ensure_key_available(&self, key: &str, exclude: Option<i64>) -> StoreResult<()> {
        match self.key_holder(key, exclude) {
            Some(existing) => Err(StoreError::DuplicateKey {
                entity: T::ENTITY,
                field: T::KEY_FIELD,
                value: key.to_string(),
                existing,
            }),
            None => Ok(()),
        }
    }
}
