//! Compiled policies and the sets the authorizer evaluates.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::debug;

use crate::ast::{self, Effect};
use crate::compiler::compile;
use crate::error::{EvalError, PolicyError};
use crate::eval::{EvalContext, EvalNode};
use crate::types::{PolicyId, Position};

/// A policy together with its evaluator tree.
///
/// Compiling cannot fail; see [`crate::compiler`] for how malformed calls
/// are handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    ast: ast::Policy,
    node: EvalNode,
}

impl Policy {
    pub fn new(ast: ast::Policy) -> Self {
        let node = compile(&ast);
        Self { ast, node }
    }

    pub fn effect(&self) -> Effect {
        self.ast.effect
    }

    pub fn position(&self) -> &Position {
        &self.ast.position
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.ast.annotations.get(key).map(String::as_str)
    }

    pub fn ast(&self) -> &ast::Policy {
        &self.ast
    }

    /// Whether the policy applies to the request in `ctx`.
    ///
    /// A condition that produces anything but a boolean is a type error.
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<bool, EvalError> {
        self.node.eval(ctx)?.as_bool()
    }
}

impl From<ast::Policy> for Policy {
    fn from(ast: ast::Policy) -> Self {
        Policy::new(ast)
    }
}

/// Policies keyed by id, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    policies: BTreeMap<PolicyId, Policy>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: PolicyId, policy: impl Into<Policy>) -> Result<(), PolicyError> {
        match self.policies.entry(id) {
            Entry::Occupied(entry) => Err(PolicyError::DuplicatePolicyId(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(event = "PolicySet", phase = "Add", policy = entry.key().to_string());
                entry.insert(policy.into());
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, id: &PolicyId) -> Option<Policy> {
        self.policies.remove(id)
    }

    pub fn get(&self, id: &PolicyId) -> Option<&Policy> {
        self.policies.get(id)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PolicyId, &Policy)> {
        self.policies.iter()
    }
}

/// Collecting keeps the last policy seen for a repeated id.
impl<P: Into<Policy>> FromIterator<(PolicyId, P)> for PolicySet {
    fn from_iter<I: IntoIterator<Item = (PolicyId, P)>>(iter: I) -> Self {
        Self {
            policies: iter
                .into_iter()
                .map(|(id, policy)| (id, policy.into()))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PolicySet {
    type Item = (&'a PolicyId, &'a Policy);
    type IntoIter = std::collections::btree_map::Iter<'a, PolicyId, Policy>;

    fn into_iter(self) -> Self::IntoIter {
        self.policies.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, ScopeConstraint};
    use crate::types::{Entities, EntityUid, Request};

    fn request() -> Request {
        Request::new(
            EntityUid::new("User", "alice"),
            EntityUid::new("Action", "view"),
            EntityUid::new("Photo", "beach.jpg"),
        )
    }

    #[test]
    fn test_policy_accessors() {
        let position = Position::new("photos.cedar", 10, 2, 1);
        let policy = Policy::new(
            ast::Policy::forbid()
                .with_annotation("id", "no-photos")
                .at(position.clone()),
        );
        assert_eq!(policy.effect(), Effect::Forbid);
        assert_eq!(policy.position(), &position);
        assert_eq!(policy.annotation("id"), Some("no-photos"));
        assert_eq!(policy.annotation("other"), None);
        assert_eq!(policy.ast().conditions.len(), 0);
    }

    #[test]
    fn test_policy_evaluate() {
        let entities = Entities::new();
        let request = request();
        let ctx = EvalContext::new(&request, &entities);

        let alice = Policy::new(
            ast::Policy::permit()
                .with_principal(ScopeConstraint::Eq(EntityUid::new("User", "alice"))),
        );
        assert_eq!(alice.evaluate(&ctx), Ok(true));

        let bob = Policy::new(
            ast::Policy::permit().with_principal(ScopeConstraint::Eq(EntityUid::new("User", "bob"))),
        );
        assert_eq!(bob.evaluate(&ctx), Ok(false));

        let missing = Policy::new(
            ast::Policy::permit().when(Expr::get_attr(Expr::principal(), "department")),
        );
        assert_eq!(
            missing.evaluate(&ctx),
            Err(EvalError::EntityNotExist(EntityUid::new("User", "alice")))
        );
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut set = PolicySet::new();
        set.add(PolicyId::new("p0"), ast::Policy::permit()).unwrap();
        let err = set.add(PolicyId::new("p0"), ast::Policy::forbid()).unwrap_err();
        assert!(matches!(err, PolicyError::DuplicatePolicyId(id) if id.as_str() == "p0"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&PolicyId::new("p0")).map(Policy::effect), Some(Effect::Permit));
    }

    #[test]
    fn test_remove() {
        let mut set: PolicySet = [(PolicyId::new("p0"), ast::Policy::permit())]
            .into_iter()
            .collect();
        assert!(set.remove(&PolicyId::new("p0")).is_some());
        assert!(set.remove(&PolicyId::new("p0")).is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn test_iteration_is_sorted_by_id() {
        let set: PolicySet = ["c", "a", "b"]
            .into_iter()
            .map(|id| (PolicyId::new(id), ast::Policy::permit()))
            .collect();
        let ids: Vec<&str> = set.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }
}
