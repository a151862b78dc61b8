//! Authorization request type.

use super::{EntityUid, Record, Value};

/// A concrete access request: who (principal) wants to do what (action) to
/// which resource, with an attached context record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub principal: EntityUid,
    pub action: EntityUid,
    pub resource: EntityUid,
    pub context: Record,
}

impl Request {
    pub fn new(principal: EntityUid, action: EntityUid, resource: EntityUid) -> Self {
        Self {
            principal,
            action,
            resource,
            context: Record::new(),
        }
    }

    pub fn with_context(mut self, context: Record) -> Self {
        self.context = context;
        self
    }

    pub fn with_context_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}
