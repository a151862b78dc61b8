//! Parsed policies, as handed over by a policy parser.
//!
//! The tree is already syntactically valid. Nothing here checks that
//! function names, method names or argument counts make sense; the compiler
//! turns such mistakes into errors that surface when the policy is evaluated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::{EntityUid, Position, Value};

/// Whether a matching policy allows or denies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Effect {
    Permit,
    Forbid,
}

/// The four request variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Var {
    Principal,
    Action,
    Resource,
    Context,
}

/// A scope matcher for one of principal, action or resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeConstraint {
    /// `principal`
    All,
    /// `principal == User::"alice"`
    Eq(EntityUid),
    /// `principal in Group::"admins"`
    In(EntityUid),
    /// `action in [Action::"view", Action::"edit"]`
    InSet(Vec<EntityUid>),
    /// `resource is Photo`
    Is(String),
    /// `resource is Photo in Album::"vacation"`
    IsIn(String, EntityUid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConditionKind {
    When,
    Unless,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub kind: ConditionKind,
    pub body: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    In,
    Add,
    Sub,
    Mul,
}

/// A policy expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Boolean, long, string or entity literal.
    Literal(Value),
    Var(Var),
    /// Function-style call such as `ip("10.0.0.1")`.
    ExtensionCall { name: String, args: Vec<Expr> },
    Set(Vec<Expr>),
    /// Record literal; a repeated key keeps its last value.
    Record(Vec<(String, Expr)>),
    Unary { op: UnaryOp, arg: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    If { cond: Box<Expr>, then_expr: Box<Expr>, else_expr: Box<Expr> },
    /// `e.attr` and `e["attr"]`
    GetAttr { expr: Box<Expr>, attr: String },
    Has { expr: Box<Expr>, attr: String },
    /// `e like "pat"`, with the pattern as written between the quotes, escapes
    /// still encoded.
    Like { expr: Box<Expr>, pattern: String },
    /// `e is T` and `e is T in parent`
    Is {
        expr: Box<Expr>,
        entity_type: String,
        in_expr: Option<Box<Expr>>,
    },
    /// `receiver.method(args)`
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn val(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn entity(ty: impl Into<String>, id: impl Into<String>) -> Self {
        Expr::Literal(Value::EntityUid(EntityUid::new(ty, id)))
    }

    pub fn var(var: Var) -> Self {
        Expr::Var(var)
    }

    pub fn principal() -> Self {
        Expr::Var(Var::Principal)
    }

    pub fn action() -> Self {
        Expr::Var(Var::Action)
    }

    pub fn resource() -> Self {
        Expr::Var(Var::Resource)
    }

    pub fn context() -> Self {
        Expr::Var(Var::Context)
    }

    pub fn set(items: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Set(items.into_iter().collect())
    }

    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Expr)>) -> Self {
        Expr::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn call_extension_fn(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::ExtensionCall {
            name: name.into(),
            args,
        }
    }

    pub fn method(receiver: Expr, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::MethodCall {
            receiver: Box::new(receiver),
            method: method.into(),
            args,
        }
    }

    pub fn ite(cond: Expr, then_expr: Expr, else_expr: Expr) -> Self {
        Expr::If {
            cond: Box::new(cond),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        }
    }

    fn unary(op: UnaryOp, arg: Expr) -> Self {
        Expr::Unary {
            op,
            arg: Box::new(arg),
        }
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn not(arg: Expr) -> Self {
        Self::unary(UnaryOp::Not, arg)
    }

    pub fn neg(arg: Expr) -> Self {
        Self::unary(UnaryOp::Neg, arg)
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::And, left, right)
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Or, left, right)
    }

    pub fn is_eq(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Eq, left, right)
    }

    pub fn noteq(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::NotEq, left, right)
    }

    pub fn less(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Less, left, right)
    }

    pub fn lesseq(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::LessEq, left, right)
    }

    pub fn greater(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Greater, left, right)
    }

    pub fn greatereq(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::GreaterEq, left, right)
    }

    pub fn add(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Add, left, right)
    }

    pub fn sub(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Sub, left, right)
    }

    pub fn mul(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Mul, left, right)
    }

    pub fn is_in(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::In, left, right)
    }

    pub fn get_attr(expr: Expr, attr: impl Into<String>) -> Self {
        Expr::GetAttr {
            expr: Box::new(expr),
            attr: attr.into(),
        }
    }

    pub fn has_attr(expr: Expr, attr: impl Into<String>) -> Self {
        Expr::Has {
            expr: Box::new(expr),
            attr: attr.into(),
        }
    }

    pub fn like(expr: Expr, pattern: impl Into<String>) -> Self {
        Expr::Like {
            expr: Box::new(expr),
            pattern: pattern.into(),
        }
    }

    pub fn is_entity_type(expr: Expr, entity_type: impl Into<String>) -> Self {
        Expr::Is {
            expr: Box::new(expr),
            entity_type: entity_type.into(),
            in_expr: None,
        }
    }

    pub fn is_entity_type_in(expr: Expr, entity_type: impl Into<String>, parent: Expr) -> Self {
        Expr::Is {
            expr: Box::new(expr),
            entity_type: entity_type.into(),
            in_expr: Some(Box::new(parent)),
        }
    }
}

/// A parsed `permit` or `forbid` policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub effect: Effect,
    pub principal: ScopeConstraint,
    pub action: ScopeConstraint,
    pub resource: ScopeConstraint,
    pub conditions: Vec<Condition>,
    /// `@key("value")` annotations; carried along but never evaluated.
    pub annotations: BTreeMap<String, String>,
    pub position: Position,
}

impl Policy {
    /// An unconstrained policy: `permit(principal, action, resource);` or its forbid twin.
    pub fn new(effect: Effect) -> Self {
        Self {
            effect,
            principal: ScopeConstraint::All,
            action: ScopeConstraint::All,
            resource: ScopeConstraint::All,
            conditions: Vec::new(),
            annotations: BTreeMap::new(),
            position: Position::default(),
        }
    }

    pub fn permit() -> Self {
        Self::new(Effect::Permit)
    }

    pub fn forbid() -> Self {
        Self::new(Effect::Forbid)
    }

    pub fn with_principal(mut self, constraint: ScopeConstraint) -> Self {
        self.principal = constraint;
        self
    }

    pub fn with_action(mut self, constraint: ScopeConstraint) -> Self {
        self.action = constraint;
        self
    }

    pub fn with_resource(mut self, constraint: ScopeConstraint) -> Self {
        self.resource = constraint;
        self
    }

    pub fn when(mut self, body: Expr) -> Self {
        self.conditions.push(Condition {
            kind: ConditionKind::When,
            body,
        });
        self
    }

    pub fn unless(mut self, body: Expr) -> Self {
        self.conditions.push(Condition {
            kind: ConditionKind::Unless,
            body,
        });
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}
