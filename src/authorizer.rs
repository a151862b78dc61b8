use tracing::{debug, info, warn};

use crate::ast::Effect;
use crate::eval::EvalContext;
use crate::policy::{Policy, PolicySet};
use crate::traits::EntityStore;
use crate::types::{Decision, DiagnosticError, Diagnostics, PolicyId, Reason, Request, Response};

/// Deny-overrides authorization over a set of compiled policies.
///
/// Stateless: one instance can serve any number of concurrent requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authorizer;

impl Authorizer {
    pub fn new() -> Self {
        Authorizer
    }

    /// Authorize `request` against every policy in `policies`, in id order.
    pub fn is_authorized(
        &self,
        request: &Request,
        policies: &PolicySet,
        entities: &dyn EntityStore,
    ) -> Response {
        self.authorize(policies, entities, request)
    }

    /// Authorize `request` against `policies` in the order given.
    ///
    /// Every policy is evaluated. A failing policy is recorded as an error
    /// and contributes nothing to the decision. Any matching forbid denies;
    /// otherwise any matching permit allows; otherwise the request is denied.
    /// The order only affects the order of reasons and errors.
    pub fn authorize<'p>(
        &self,
        policies: impl IntoIterator<Item = (&'p PolicyId, &'p Policy)>,
        entities: &dyn EntityStore,
        request: &Request,
    ) -> Response {
        debug!(
            event = "Request",
            phase = "Evaluation",
            principal = request.principal.to_string(),
            action = request.action.to_string(),
            resource = request.resource.to_string()
        );

        let ctx = EvalContext::new(request, entities);
        let mut forbids = Vec::new();
        let mut permits = Vec::new();
        let mut errors = Vec::new();

        for (id, policy) in policies {
            match policy.evaluate(&ctx) {
                Ok(true) => {
                    let reason = Reason {
                        policy: id.clone(),
                        position: policy.position().clone(),
                    };
                    match policy.effect() {
                        Effect::Forbid => forbids.push(reason),
                        Effect::Permit => permits.push(reason),
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        event = "Request",
                        phase = "Policy",
                        policy = id.to_string(),
                        error = err.to_string()
                    );
                    errors.push(DiagnosticError {
                        policy: id.clone(),
                        position: policy.position().clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let (decision, reasons) = if !forbids.is_empty() {
            (Decision::Deny, forbids)
        } else if !permits.is_empty() {
            (Decision::Allow, permits)
        } else {
            (Decision::Deny, Vec::new())
        };

        for reason in &reasons {
            info!(
                event = "Request",
                phase = "Policy",
                reason = reason.policy.to_string(),
                position = reason.position.to_string()
            );
        }
        debug!(event = "Request", phase = "Result", result = ?decision, errors = errors.len());

        Response::new(decision, Diagnostics { reasons, errors })
    }
}
