// src/lib.rs
pub use authorizer::Authorizer;
pub use error::{EvalError, PolicyError};
pub use hierarchy::entity_in;
pub use pattern::Pattern;
pub use policy::{Policy, PolicySet};
pub use traits::EntityStore;
pub use types::{
    Decimal, Decision, DiagnosticError, Diagnostics, Entities, Entity, EntityUid, IpAddr,
    PolicyId, Position, Reason, Record, Request, Response, Set, Value,
};

pub mod ast;
mod authorizer;
pub mod compiler;
mod error;
pub mod eval;
mod hierarchy;
mod pattern;
mod policy;
mod traits;
pub mod types;

#[cfg(test)]
mod tests;
