//! Lowering of parsed policies into evaluator trees.
//!
//! Compilation never fails. Calls to unknown functions or methods and calls
//! with the wrong number of arguments become [`EvalNode::Error`] nodes, so a
//! policy with such a mistake still loads and reports the error only when
//! the offending subtree is evaluated.

use crate::ast::{BinaryOp, ConditionKind, Expr, Policy, ScopeConstraint, UnaryOp, Var};
use crate::error::EvalError;
use crate::eval::{ArithOp, CompareOp, EvalNode, IpTest};
use crate::pattern::Pattern;
use crate::types::{EntityUid, Value};

/// Compile a policy's scope and conditions into a single boolean tree.
///
/// The pieces are joined with `&&` in source order: principal, action,
/// resource, then each condition (`unless` bodies negated).
pub fn compile(policy: &Policy) -> EvalNode {
    let mut node = and(
        and(
            scope_node(Var::Principal, &policy.principal),
            scope_node(Var::Action, &policy.action),
        ),
        scope_node(Var::Resource, &policy.resource),
    );

    for condition in &policy.conditions {
        let body = compile_expr(&condition.body);
        let body = match condition.kind {
            ConditionKind::When => body,
            ConditionKind::Unless => EvalNode::Not(Box::new(body)),
        };
        node = and(node, body);
    }

    node
}

/// Compile a single expression.
pub fn compile_expr(expr: &Expr) -> EvalNode {
    match expr {
        Expr::Literal(value) => EvalNode::Literal(value.clone()),
        Expr::Var(var) => EvalNode::Var(*var),
        Expr::ExtensionCall { name, args } => {
            extension_call(name, args.iter().map(compile_expr).collect())
        }
        Expr::Set(items) => EvalNode::Set(items.iter().map(compile_expr).collect()),
        Expr::Record(fields) => EvalNode::Record(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), compile_expr(value)))
                .collect(),
        ),
        Expr::Unary { op, arg } => {
            let arg = boxed(arg);
            match op {
                UnaryOp::Not => EvalNode::Not(arg),
                UnaryOp::Neg => EvalNode::Negate(arg),
            }
        }
        Expr::Binary { op, left, right } => binary(*op, boxed(left), boxed(right)),
        Expr::If {
            cond,
            then_expr,
            else_expr,
        } => EvalNode::If {
            cond: boxed(cond),
            then_node: boxed(then_expr),
            else_node: boxed(else_expr),
        },
        Expr::GetAttr { expr, attr } => EvalNode::GetAttr {
            object: boxed(expr),
            attr: attr.clone(),
        },
        Expr::Has { expr, attr } => EvalNode::HasAttr {
            object: boxed(expr),
            attr: attr.clone(),
        },
        Expr::Like { expr, pattern } => EvalNode::Like {
            arg: boxed(expr),
            pattern: Pattern::parse(pattern),
        },
        Expr::Is {
            expr,
            entity_type,
            in_expr,
        } => {
            let is = EvalNode::Is {
                arg: boxed(expr),
                entity_type: entity_type.clone(),
            };
            match in_expr {
                Some(parent) => and(is, EvalNode::In(boxed(expr), boxed(parent))),
                None => is,
            }
        }
        Expr::MethodCall {
            receiver,
            method,
            args,
        } => method_call(
            method,
            compile_expr(receiver),
            args.iter().map(compile_expr).collect(),
        ),
    }
}

fn boxed(expr: &Expr) -> Box<EvalNode> {
    Box::new(compile_expr(expr))
}

fn and(lhs: EvalNode, rhs: EvalNode) -> EvalNode {
    EvalNode::And(Box::new(lhs), Box::new(rhs))
}

fn scope_node(var: Var, constraint: &ScopeConstraint) -> EvalNode {
    let subject = || Box::new(EvalNode::Var(var));
    let entity = |uid: &EntityUid| Box::new(EvalNode::Literal(Value::EntityUid(uid.clone())));

    match constraint {
        ScopeConstraint::All => EvalNode::Literal(Value::Bool(true)),
        ScopeConstraint::Eq(uid) => EvalNode::Equal(subject(), entity(uid)),
        ScopeConstraint::In(uid) => EvalNode::In(subject(), entity(uid)),
        ScopeConstraint::InSet(uids) => EvalNode::In(
            subject(),
            Box::new(EvalNode::Literal(
                uids.iter().cloned().map(Value::EntityUid).collect(),
            )),
        ),
        ScopeConstraint::Is(entity_type) => EvalNode::Is {
            arg: subject(),
            entity_type: entity_type.clone(),
        },
        ScopeConstraint::IsIn(entity_type, uid) => and(
            EvalNode::Is {
                arg: subject(),
                entity_type: entity_type.clone(),
            },
            EvalNode::In(subject(), entity(uid)),
        ),
    }
}

fn binary(op: BinaryOp, lhs: Box<EvalNode>, rhs: Box<EvalNode>) -> EvalNode {
    match op {
        BinaryOp::Or => EvalNode::Or(lhs, rhs),
        BinaryOp::And => EvalNode::And(lhs, rhs),
        BinaryOp::Eq => EvalNode::Equal(lhs, rhs),
        BinaryOp::NotEq => EvalNode::NotEqual(lhs, rhs),
        BinaryOp::In => EvalNode::In(lhs, rhs),
        BinaryOp::Add => EvalNode::Arith { op: ArithOp::Add, lhs, rhs },
        BinaryOp::Sub => EvalNode::Arith { op: ArithOp::Sub, lhs, rhs },
        BinaryOp::Mul => EvalNode::Arith { op: ArithOp::Mul, lhs, rhs },
        BinaryOp::Less => EvalNode::Compare { op: CompareOp::Less, lhs, rhs },
        BinaryOp::LessEq => EvalNode::Compare { op: CompareOp::LessEq, lhs, rhs },
        BinaryOp::Greater => EvalNode::Compare { op: CompareOp::Greater, lhs, rhs },
        BinaryOp::GreaterEq => EvalNode::Compare { op: CompareOp::GreaterEq, lhs, rhs },
    }
}

/// Operations invoked on a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Contains,
    ContainsAll,
    ContainsAny,
    IsEmpty,
    DecimalCompare(CompareOp),
    IpTest(IpTest),
    IsInRange,
}

impl Builtin {
    fn lookup(name: &str) -> Option<Self> {
        let builtin = match name {
            "contains" => Builtin::Contains,
            "containsAll" => Builtin::ContainsAll,
            "containsAny" => Builtin::ContainsAny,
            "isEmpty" => Builtin::IsEmpty,
            "lessThan" => Builtin::DecimalCompare(CompareOp::Less),
            "lessThanOrEqual" => Builtin::DecimalCompare(CompareOp::LessEq),
            "greaterThan" => Builtin::DecimalCompare(CompareOp::Greater),
            "greaterThanOrEqual" => Builtin::DecimalCompare(CompareOp::GreaterEq),
            "isIpv4" => Builtin::IpTest(IpTest::Ipv4),
            "isIpv6" => Builtin::IpTest(IpTest::Ipv6),
            "isLoopback" => Builtin::IpTest(IpTest::Loopback),
            "isMulticast" => Builtin::IpTest(IpTest::Multicast),
            "isInRange" => Builtin::IsInRange,
            _ => return None,
        };
        Some(builtin)
    }

    /// Arguments expected after the receiver.
    fn arity(self) -> usize {
        match self {
            Builtin::IsEmpty | Builtin::IpTest(_) => 0,
            _ => 1,
        }
    }

    /// Extension methods may also be called as functions, receiver first.
    fn is_extension(self) -> bool {
        matches!(
            self,
            Builtin::DecimalCompare(_) | Builtin::IpTest(_) | Builtin::IsInRange
        )
    }

    /// Build the node, or return the number of arguments supplied when it is wrong.
    fn apply(self, receiver: EvalNode, args: Vec<EvalNode>) -> Result<EvalNode, usize> {
        let receiver = Box::new(receiver);
        let supplied = args.len();
        let mut args = args.into_iter().map(Box::new);
        let node = match (self, args.next(), args.next()) {
            (Builtin::IsEmpty, None, None) => EvalNode::IsEmpty(receiver),
            (Builtin::IpTest(test), None, None) => EvalNode::IpTest {
                test,
                arg: receiver,
            },
            (Builtin::Contains, Some(arg), None) => EvalNode::Contains(receiver, arg),
            (Builtin::ContainsAll, Some(arg), None) => EvalNode::ContainsAll(receiver, arg),
            (Builtin::ContainsAny, Some(arg), None) => EvalNode::ContainsAny(receiver, arg),
            (Builtin::DecimalCompare(op), Some(rhs), None) => EvalNode::DecimalCompare {
                op,
                lhs: receiver,
                rhs,
            },
            (Builtin::IsInRange, Some(range), None) => EvalNode::IsInRange(receiver, range),
            _ => return Err(supplied),
        };
        Ok(node)
    }
}

fn arity_error(name: &str, expected: usize, actual: usize) -> EvalNode {
    EvalNode::Error(EvalError::Arity {
        name: name.to_string(),
        expected,
        actual,
    })
}

fn method_call(name: &str, receiver: EvalNode, args: Vec<EvalNode>) -> EvalNode {
    let Some(builtin) = Builtin::lookup(name) else {
        return EvalNode::Error(EvalError::UnknownMethod(name.to_string()));
    };
    builtin
        .apply(receiver, args)
        .unwrap_or_else(|actual| arity_error(name, builtin.arity(), actual))
}

fn extension_call(name: &str, args: Vec<EvalNode>) -> EvalNode {
    let constructor: Option<fn(Box<EvalNode>) -> EvalNode> = match name {
        "decimal" => Some(EvalNode::Decimal),
        "ip" => Some(EvalNode::Ip),
        _ => None,
    };

    if let Some(constructor) = constructor {
        return match <[EvalNode; 1]>::try_from(args) {
            Ok([arg]) => constructor(Box::new(arg)),
            Err(args) => arity_error(name, 1, args.len()),
        };
    }

    let Some(builtin) = Builtin::lookup(name).filter(|b| b.is_extension()) else {
        return EvalNode::Error(EvalError::UnknownExtensionFunction(name.to_string()));
    };
    let expected = builtin.arity() + 1;
    let mut args = args.into_iter();
    match args.next() {
        Some(receiver) => builtin
            .apply(receiver, args.collect())
            .unwrap_or_else(|actual| arity_error(name, expected, actual + 1)),
        None => arity_error(name, expected, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Effect;
    use crate::eval::EvalContext;
    use crate::types::{Entities, Entity, Request};
    use yare::parameterized;

    fn uid(ty: &str, id: &str) -> EntityUid {
        EntityUid::new(ty, id)
    }

    fn run(node: &EvalNode) -> Result<Value, EvalError> {
        let entities: Entities = [
            Entity::with_uid(uid("User", "alice")).with_parent(uid("Group", "admins")),
            Entity::with_uid(uid("Photo", "beach.jpg"))
                .with_attr("owner", uid("User", "alice"))
                .with_parent(uid("Album", "vacation")),
        ]
        .into_iter()
        .collect();
        let request = Request::new(
            uid("User", "alice"),
            uid("Action", "view"),
            uid("Photo", "beach.jpg"),
        )
        .with_context_value("x", 42);
        node.eval(&EvalContext::new(&request, &entities))
    }

    fn run_expr(expr: Expr) -> Result<Value, EvalError> {
        run(&compile_expr(&expr))
    }

    fn run_policy(policy: Policy) -> Result<Value, EvalError> {
        run(&compile(&policy))
    }

    #[test]
    fn test_unconstrained_scope() {
        let node = compile(&Policy::new(Effect::Permit));
        let t = || Box::new(EvalNode::Literal(Value::Bool(true)));
        assert_eq!(node, EvalNode::And(Box::new(EvalNode::And(t(), t())), t()));
        assert_eq!(run(&node), Ok(Value::Bool(true)));
    }

    #[parameterized(
        principal_eq = { ScopeConstraint::Eq(uid("User", "alice")), true },
        principal_eq_other = { ScopeConstraint::Eq(uid("User", "bob")), false },
        principal_in = { ScopeConstraint::In(uid("Group", "admins")), true },
        principal_in_self = { ScopeConstraint::In(uid("User", "alice")), true },
        principal_in_other = { ScopeConstraint::In(uid("Group", "users")), false },
        principal_in_set = { ScopeConstraint::InSet(vec![uid("Group", "users"), uid("Group", "admins")]), true },
        principal_is = { ScopeConstraint::Is("User".into()), true },
        principal_is_other = { ScopeConstraint::Is("Group".into()), false },
        principal_is_in = { ScopeConstraint::IsIn("User".into(), uid("Group", "admins")), true },
        principal_is_in_wrong_type = { ScopeConstraint::IsIn("Group".into(), uid("Group", "admins")), false },
    )]
    fn test_principal_scope(constraint: ScopeConstraint, expected: bool) {
        let policy = Policy::permit().with_principal(constraint);
        assert_eq!(run_policy(policy), Ok(Value::Bool(expected)));
    }

    #[test]
    fn test_action_and_resource_scope() {
        let policy = Policy::permit()
            .with_action(ScopeConstraint::InSet(vec![
                uid("Action", "view"),
                uid("Action", "edit"),
            ]))
            .with_resource(ScopeConstraint::In(uid("Album", "vacation")));
        assert_eq!(run_policy(policy), Ok(Value::Bool(true)));

        let policy = Policy::permit().with_action(ScopeConstraint::Eq(uid("Action", "edit")));
        assert_eq!(run_policy(policy), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_conditions() {
        let x_is = |n: i64| Expr::is_eq(Expr::get_attr(Expr::context(), "x"), Expr::val(n));
        assert_eq!(run_policy(Policy::permit().when(x_is(42))), Ok(Value::Bool(true)));
        assert_eq!(run_policy(Policy::permit().when(x_is(43))), Ok(Value::Bool(false)));
        assert_eq!(run_policy(Policy::permit().unless(x_is(43))), Ok(Value::Bool(true)));
        assert_eq!(
            run_policy(Policy::permit().when(x_is(42)).unless(x_is(42))),
            Ok(Value::Bool(false))
        );
    }

    #[test]
    fn test_scope_mismatch_skips_conditions() {
        let policy = Policy::permit()
            .with_principal(ScopeConstraint::Eq(uid("User", "bob")))
            .when(Expr::get_attr(Expr::context(), "missing"));
        assert_eq!(run_policy(policy), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_non_boolean_condition_is_a_type_error() {
        let policy = Policy::permit().when(Expr::val(1));
        assert_eq!(run_policy(policy), Err(EvalError::type_mismatch("bool", "long")));
    }

    #[test]
    fn test_is_in_expression() {
        let expr = Expr::is_entity_type_in(
            Expr::resource(),
            "Photo",
            Expr::entity("Album", "vacation"),
        );
        assert_eq!(run_expr(expr), Ok(Value::Bool(true)));
        let expr = Expr::is_entity_type_in(Expr::resource(), "Photo", Expr::entity("Album", "work"));
        assert_eq!(run_expr(expr), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_unknown_extension_function_is_deferred() {
        let node = compile_expr(&Expr::call_extension_fn("decimol", vec![Expr::val("1.0")]));
        assert_eq!(
            node,
            EvalNode::Error(EvalError::UnknownExtensionFunction("decimol".into()))
        );
    }

    #[test]
    fn test_set_methods_are_not_functions() {
        let node = compile_expr(&Expr::call_extension_fn(
            "contains",
            vec![Expr::set([]), Expr::val(1)],
        ));
        assert_eq!(
            node,
            EvalNode::Error(EvalError::UnknownExtensionFunction("contains".into()))
        );
    }

    #[test]
    fn test_unknown_method_is_deferred() {
        let node = compile_expr(&Expr::method(Expr::set([]), "containz", vec![Expr::val(1)]));
        assert_eq!(node, EvalNode::Error(EvalError::UnknownMethod("containz".into())));
    }

    #[parameterized(
        decimal_no_args = { Expr::call_extension_fn("decimal", vec![]), "decimal", 1, 0 },
        ip_two_args = { Expr::call_extension_fn("ip", vec![Expr::val("a"), Expr::val("b")]), "ip", 1, 2 },
        contains_no_args = { Expr::method(Expr::set([]), "contains", vec![]), "contains", 1, 0 },
        is_ipv4_with_arg = { Expr::method(Expr::val("x"), "isIpv4", vec![Expr::val(1)]), "isIpv4", 0, 1 },
        less_than_two_args = { Expr::method(Expr::val("x"), "lessThan", vec![Expr::val(1), Expr::val(2)]), "lessThan", 1, 2 },
        less_than_function_one_arg = { Expr::call_extension_fn("lessThan", vec![Expr::val(1)]), "lessThan", 2, 1 },
        is_loopback_function_no_args = { Expr::call_extension_fn("isLoopback", vec![]), "isLoopback", 1, 0 },
    )]
    fn test_arity_errors_are_deferred(expr: Expr, name: &str, expected: usize, actual: usize) {
        assert_eq!(
            compile_expr(&expr),
            EvalNode::Error(EvalError::Arity {
                name: name.into(),
                expected,
                actual,
            })
        );
    }

    #[test]
    fn test_deferred_error_only_raised_when_reached() {
        let broken = Expr::call_extension_fn("nope", vec![]);
        assert_eq!(run_expr(Expr::or(Expr::val(true), broken.clone())), Ok(Value::Bool(true)));
        assert_eq!(
            run_expr(Expr::or(Expr::val(false), broken)),
            Err(EvalError::UnknownExtensionFunction("nope".into()))
        );
    }

    #[test]
    fn test_extension_methods_both_call_styles() {
        let dec = |s: &str| Expr::call_extension_fn("decimal", vec![Expr::val(s)]);
        let method = Expr::method(dec("1.5"), "lessThan", vec![dec("2.0")]);
        assert_eq!(run_expr(method), Ok(Value::Bool(true)));
        let function = Expr::call_extension_fn("greaterThanOrEqual", vec![dec("1.5"), dec("2.0")]);
        assert_eq!(run_expr(function), Ok(Value::Bool(false)));

        let ip = |s: &str| Expr::call_extension_fn("ip", vec![Expr::val(s)]);
        let in_range = Expr::method(ip("192.0.1.7"), "isInRange", vec![ip("192.0.1.0/24")]);
        assert_eq!(run_expr(in_range), Ok(Value::Bool(true)));
        let multicast = Expr::call_extension_fn("isMulticast", vec![ip("224.0.0.1")]);
        assert_eq!(run_expr(multicast), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_relational_operators_on_decimals() {
        let dec = |s: &str| Expr::call_extension_fn("decimal", vec![Expr::val(s)]);
        assert_eq!(run_expr(Expr::less(dec("1.5"), dec("2.0"))), Ok(Value::Bool(true)));
        assert_eq!(run_expr(Expr::greatereq(dec("1.5"), dec("2.0"))), Ok(Value::Bool(false)));
        assert_eq!(
            run_expr(Expr::less(dec("1.5"), Expr::val(2))),
            Err(EvalError::type_mismatch("decimal", "long"))
        );
    }

    #[test]
    fn test_operators() {
        let two_plus_three = Expr::add(Expr::val(2), Expr::val(3));
        assert_eq!(run_expr(two_plus_three.clone()), Ok(Value::Long(5)));
        assert_eq!(
            run_expr(Expr::mul(Expr::sub(two_plus_three, Expr::val(1)), Expr::neg(Expr::val(2)))),
            Ok(Value::Long(-8))
        );
        assert_eq!(
            run_expr(Expr::lesseq(Expr::val(2), Expr::val(2))),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            run_expr(Expr::noteq(Expr::val(1), Expr::val("1"))),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            run_expr(Expr::ite(Expr::val(false), Expr::val(1), Expr::val(2))),
            Ok(Value::Long(2))
        );
        assert_eq!(
            run_expr(Expr::like(Expr::val("eggs and ham"), "*ham")),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            run_expr(Expr::has_attr(Expr::resource(), "owner")),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            run_expr(Expr::is_eq(
                Expr::get_attr(Expr::resource(), "owner"),
                Expr::principal()
            )),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            run_expr(Expr::record([("a", Expr::val(1)), ("a", Expr::val(2))])),
            Ok(Value::record([("a", Value::Long(2))]))
        );
        assert_eq!(
            run_expr(Expr::set([Expr::val(1), Expr::val(1)])),
            Ok(Value::set([Value::Long(1)]))
        );
        assert_eq!(
            run_expr(Expr::method(Expr::set([]), "isEmpty", vec![])),
            Ok(Value::Bool(true))
        );
    }
}
