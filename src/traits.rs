use std::collections::{HashMap, HashSet};

use crate::types::{Entity, EntityUid, Record};

/// Read-only access to the entities a request is evaluated against.
///
/// The store is consulted for attribute access, `has`, and `in`. A missing
/// entity is an error only for direct attribute access.
pub trait EntityStore: Send + Sync {
    /// Look up an entity by UID.
    fn get(&self, uid: &EntityUid) -> Option<&Entity>;

    /// The attributes of an entity, if it exists.
    fn attrs(&self, uid: &EntityUid) -> Option<&Record> {
        self.get(uid).map(Entity::attrs)
    }

    /// The direct parents of an entity, if it exists.
    fn parents(&self, uid: &EntityUid) -> Option<&HashSet<EntityUid>> {
        self.get(uid).map(Entity::parents)
    }
}

impl EntityStore for HashMap<EntityUid, Entity> {
    fn get(&self, uid: &EntityUid) -> Option<&Entity> {
        HashMap::get(self, uid)
    }
}
