use crate::ast::{self, Expr, ScopeConstraint};
use crate::{
    Authorizer, Decision, Entities, Entity, EntityUid, PolicyId, PolicySet, Position, Request,
    Response,
};


fn uid(ty: &str, id: &str) -> EntityUid {
    EntityUid::new(ty, id)
}

fn policies<const N: usize>(items: [(&str, ast::Policy); N]) -> PolicySet {
    items
        .into_iter()
        .enumerate()
        .map(|(line, (id, policy))| {
            let position = Position::new("policies.cedar", line * 100, line + 1, 1);
            (PolicyId::new(id), policy.at(position))
        })
        .collect()
}

fn alice_views_photo() -> Request {
    Request::new(
        uid("User", "alice"),
        uid("Action", "view"),
        uid("Photo", "VacationPhoto94.jpg"),
    )
}

fn authorize(request: &Request, policies: &PolicySet, entities: &Entities) -> Response {
    Authorizer::new().is_authorized(request, policies, entities)
}

fn reasons(response: &Response) -> Vec<&str> {
    response.diagnostics().reason().map(PolicyId::as_str).collect()
}

fn errors(response: &Response) -> Vec<&str> {
    response
        .diagnostics()
        .errors()
        .map(|e| e.policy.as_str())
        .collect()
}

#[test]
fn test_permit_all() {
    let set = policies([("policy0", ast::Policy::permit())]);
    let response = authorize(&alice_views_photo(), &set, &Entities::new());
    assert_eq!(response.decision(), Decision::Allow);
    assert_eq!(reasons(&response), ["policy0"]);
    assert!(errors(&response).is_empty());
}

#[test]
fn test_forbid_alone() {
    let set = policies([("policy0", ast::Policy::forbid())]);
    let response = authorize(&alice_views_photo(), &set, &Entities::new());
    assert_eq!(response.decision(), Decision::Deny);
    assert_eq!(reasons(&response), ["policy0"]);
}

#[test]
fn test_erroring_permit_does_not_block_other_permits() {
    let set = policies([
        (
            "policy0",
            ast::Policy::permit().when(Expr::is_eq(
                Expr::get_attr(Expr::principal(), "department"),
                Expr::val("photography"),
            )),
        ),
        ("policy1", ast::Policy::permit()),
    ]);
    let entities: Entities = [Entity::with_uid(uid("User", "alice"))].into_iter().collect();
    let response = authorize(&alice_views_photo(), &set, &entities);

    assert_eq!(response.decision(), Decision::Allow);
    assert_eq!(reasons(&response), ["policy1"]);
    assert_eq!(errors(&response), ["policy0"]);
    insta::assert_json_snapshot!(response, @r#"
    {
      "decision": "allow",
      "diagnostics": {
        "reasons": [
          {
            "policy": "policy1",
            "position": {
              "filename": "policies.cedar",
              "offset": 100,
              "line": 2,
              "column": 1
            }
          }
        ],
        "errors": [
          {
            "policy": "policy0",
            "position": {
              "filename": "policies.cedar",
              "offset": 0,
              "line": 1,
              "column": 1
            },
            "message": "entity `User::\"alice\"` does not have the attribute `department`"
          }
        ]
      }
    }
    "#);
}

#[test]
fn test_context_condition() {
    let set = policies([(
        "policy0",
        ast::Policy::permit().when(Expr::is_eq(
            Expr::get_attr(Expr::context(), "x"),
            Expr::val(42),
        )),
    )]);

    let request = alice_views_photo().with_context_value("x", 42);
    let response = authorize(&request, &set, &Entities::new());
    assert_eq!(response.decision(), Decision::Allow);

    let request = alice_views_photo().with_context_value("x", 43);
    let response = authorize(&request, &set, &Entities::new());
    assert_eq!(response.decision(), Decision::Deny);
    assert!(reasons(&response).is_empty());
    assert!(errors(&response).is_empty());
}

#[test]
fn test_malformed_call_fails_only_its_policy() {
    let set = policies([
        (
            "policy0",
            ast::Policy::permit().when(Expr::call_extension_fn(
                "decimal",
                vec![Expr::val("1.0"), Expr::val("2.0")],
            )),
        ),
        (
            "policy1",
            ast::Policy::permit()
                .with_principal(ScopeConstraint::Eq(uid("User", "bob")))
                .when(Expr::method(Expr::context(), "frobnicate", vec![])),
        ),
    ]);
    assert_eq!(set.len(), 2);

    let response = authorize(&alice_views_photo(), &set, &Entities::new());
    assert_eq!(response.decision(), Decision::Deny);
    assert!(reasons(&response).is_empty());
    // policy1 never reaches its condition for alice.
    assert_eq!(errors(&response), ["policy0"]);
    let error = response.diagnostics().errors().next().unwrap();
    assert_eq!(error.message, "`decimal` takes 1 parameter(s), got 2");
}
