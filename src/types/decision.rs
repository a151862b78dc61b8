//! Authorization decision types with per-policy diagnostics.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumString};
use utoipa::ToSchema;

use super::{PolicyId, Position};

/// Allow or deny.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    StrumDisplay,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

/// A policy whose scope and conditions all held for the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Reason {
    pub policy: PolicyId,
    pub position: Position,
}

/// A policy whose evaluation failed, with the error rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct DiagnosticError {
    pub policy: PolicyId,
    pub position: Position,
    pub message: String,
}

impl Display for DiagnosticError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "while evaluating policy `{}` ({}): {}",
            self.policy, self.position, self.message
        )
    }
}

/// What each policy contributed to one authorization call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Diagnostics {
    pub reasons: Vec<Reason>,
    pub errors: Vec<DiagnosticError>,
}

impl Diagnostics {
    /// The ids of the policies that determined the decision.
    pub fn reason(&self) -> impl Iterator<Item = &PolicyId> {
        self.reasons.iter().map(|r| &r.policy)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticError> {
        self.errors.iter()
    }
}

/// The result of an authorization call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Response {
    pub decision: Decision,
    pub diagnostics: Diagnostics,
}

impl Response {
    pub fn new(decision: Decision, diagnostics: Diagnostics) -> Self {
        Self {
            decision,
            diagnostics,
        }
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_parts(self) -> (Decision, Diagnostics) {
        (self.decision, self.diagnostics)
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}(reasons={}; errors={})",
            self.decision,
            self.diagnostics.reasons.len(),
            self.diagnostics.errors.len()
        )
    }
}
