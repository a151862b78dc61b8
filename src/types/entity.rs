//! Entities and the in-memory entity store.

use std::collections::{HashMap, HashSet};

use crate::traits::EntityStore;

use super::{EntityUid, Record, Value};

/// A named object with attributes and direct parents.
///
/// Parent links may form any directed graph, cycles included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    uid: EntityUid,
    attrs: Record,
    parents: HashSet<EntityUid>,
}

impl Entity {
    pub fn new(uid: EntityUid, attrs: Record, parents: HashSet<EntityUid>) -> Self {
        Self {
            uid,
            attrs,
            parents,
        }
    }

    pub fn with_uid(uid: EntityUid) -> Self {
        Self::new(uid, Record::new(), HashSet::new())
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn with_parent(mut self, parent: EntityUid) -> Self {
        self.parents.insert(parent);
        self
    }

    pub fn uid(&self) -> &EntityUid {
        &self.uid
    }

    pub fn attrs(&self) -> &Record {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn parents(&self) -> &HashSet<EntityUid> {
        &self.parents
    }
}

/// Entities keyed by UID. Inserting an entity replaces any previous entity with the same UID.
#[derive(Debug, Clone, Default)]
pub struct Entities(HashMap<EntityUid, Entity>);

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: Entity) -> Option<Entity> {
        self.0.insert(entity.uid.clone(), entity)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.0.values()
    }
}

impl EntityStore for Entities {
    fn get(&self, uid: &EntityUid) -> Option<&Entity> {
        self.0.get(uid)
    }
}

impl FromIterator<Entity> for Entities {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        let mut entities = Entities::new();
        for entity in iter {
            entities.insert(entity);
        }
        entities
    }
}
