//! Entity hierarchy membership (`in`).

use std::collections::HashSet;

use crate::traits::EntityStore;
use crate::types::EntityUid;

/// True when `candidate` is one of `targets` or reaches one of them through parent links.
///
/// The walk is iterative and visits each reachable entity at most once, so
/// cycles terminate and converging ancestry (diamonds) stays linear in the
/// number of distinct entities. Entities missing from the store have no parents.
pub fn entity_in<S>(candidate: &EntityUid, targets: &HashSet<EntityUid>, store: &S) -> bool
where
    S: EntityStore + ?Sized,
{
    if targets.is_empty() {
        return false;
    }

    let mut visited: HashSet<&EntityUid> = HashSet::new();
    let mut pending: Vec<&EntityUid> = vec![candidate];

    while let Some(uid) = pending.pop() {
        if !visited.insert(uid) {
            continue;
        }
        if targets.contains(uid) {
            return true;
        }
        if let Some(parents) = store.parents(uid) {
            pending.extend(parents.iter().filter(|p| !visited.contains(*p)));
        }
    }

    false
}
