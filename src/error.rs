use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{EntityUid, PolicyId};

/// Errors raised while evaluating a single policy.
///
/// Every variant is scoped to one policy evaluation; the authorizer records
/// the message in the diagnostics and carries on with the next policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("type error: expected {expected}, got {actual}")]
    Type { expected: String, actual: String },

    #[error("integer overflow while attempting to {op} `{lhs}` and `{rhs}`")]
    Overflow { op: &'static str, lhs: i64, rhs: i64 },

    #[error("integer overflow while attempting to negate `{operand}`")]
    NegationOverflow { operand: i64 },

    #[error("function `{0}` does not exist")]
    UnknownExtensionFunction(String),

    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    #[error("`{name}` takes {expected} parameter(s), got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("{target} does not have the attribute `{attr}`")]
    AttributeAccess { target: String, attr: String },

    #[error("entity `{0}` does not exist")]
    EntityNotExist(EntityUid),

    #[error("cannot access attribute `{0}` of unspecified entity")]
    UnspecifiedEntity(String),

    #[error("error parsing decimal value: {0}")]
    DecimalParse(String),

    #[error("error parsing ip value: {0}")]
    IpParse(String),
}

impl EvalError {
    pub(crate) fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        EvalError::Type {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Errors raised while managing a policy set.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum PolicyError {
    #[error("duplicate policy id: {0}")]
    DuplicatePolicyId(PolicyId),
}
