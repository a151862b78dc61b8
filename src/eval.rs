//! The evaluator tree a compiled policy runs on.
//!
//! Nodes are immutable once built and hold no state beyond their children,
//! so one tree can be evaluated against many requests at once.

use std::collections::HashSet;

use crate::ast::Var;
use crate::error::EvalError;
use crate::hierarchy::entity_in;
use crate::pattern::Pattern;
use crate::traits::EntityStore;
use crate::types::{
    ANY_ENTITY_TYPE, DECIMAL_TYPE, Decimal, EntityUid, IpAddr, LONG_TYPE, RECORD_TYPE, Record,
    Request, SET_TYPE, Set, Value,
};

/// The request being evaluated together with the entities it refers to.
pub struct EvalContext<'e> {
    entities: &'e dyn EntityStore,
    principal: Value,
    action: Value,
    resource: Value,
    context: Value,
}

impl<'e> EvalContext<'e> {
    pub fn new(request: &Request, entities: &'e dyn EntityStore) -> Self {
        Self {
            entities,
            principal: Value::EntityUid(request.principal.clone()),
            action: Value::EntityUid(request.action.clone()),
            resource: Value::EntityUid(request.resource.clone()),
            context: Value::Record(request.context.clone()),
        }
    }

    fn var(&self, var: Var) -> &Value {
        match var {
            Var::Principal => &self.principal,
            Var::Action => &self.action,
            Var::Resource => &self.resource,
            Var::Context => &self.context,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
}

impl ArithOp {
    fn verb(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "subtract",
            ArithOp::Mul => "multiply",
        }
    }

    fn apply(self, lhs: i64, rhs: i64) -> Result<i64, EvalError> {
        let result = match self {
            ArithOp::Add => lhs.checked_add(rhs),
            ArithOp::Sub => lhs.checked_sub(rhs),
            ArithOp::Mul if lhs == 0 || rhs == 0 => Some(0),
            ArithOp::Mul => lhs.checked_mul(rhs),
        };
        result.ok_or(EvalError::Overflow {
            op: self.verb(),
            lhs,
            rhs,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl CompareOp {
    fn holds<T: Ord>(self, lhs: T, rhs: T) -> bool {
        match self {
            CompareOp::Less => lhs < rhs,
            CompareOp::LessEq => lhs <= rhs,
            CompareOp::Greater => lhs > rhs,
            CompareOp::GreaterEq => lhs >= rhs,
        }
    }
}

/// The zero-argument IP address predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpTest {
    Ipv4,
    Ipv6,
    Loopback,
    Multicast,
}

impl IpTest {
    fn holds(self, ip: &IpAddr) -> bool {
        match self {
            IpTest::Ipv4 => ip.is_ipv4(),
            IpTest::Ipv6 => ip.is_ipv6(),
            IpTest::Loopback => ip.is_loopback(),
            IpTest::Multicast => ip.is_multicast(),
        }
    }
}

type Node = Box<EvalNode>;

/// One operator in a compiled policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalNode {
    Literal(Value),
    Var(Var),
    /// Raises the stored error when reached; produced for malformed calls.
    Error(EvalError),
    Or(Node, Node),
    And(Node, Node),
    Not(Node),
    Negate(Node),
    Arith { op: ArithOp, lhs: Node, rhs: Node },
    Compare { op: CompareOp, lhs: Node, rhs: Node },
    Equal(Node, Node),
    NotEqual(Node, Node),
    If { cond: Node, then_node: Node, else_node: Node },
    Set(Vec<EvalNode>),
    Record(Vec<(String, EvalNode)>),
    Contains(Node, Node),
    ContainsAll(Node, Node),
    ContainsAny(Node, Node),
    IsEmpty(Node),
    GetAttr { object: Node, attr: String },
    HasAttr { object: Node, attr: String },
    Like { arg: Node, pattern: Pattern },
    In(Node, Node),
    Is { arg: Node, entity_type: String },
    Decimal(Node),
    Ip(Node),
    DecimalCompare { op: CompareOp, lhs: Node, rhs: Node },
    IpTest { test: IpTest, arg: Node },
    IsInRange(Node, Node),
}

impl EvalNode {
    pub fn eval(&self, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
        match self {
            EvalNode::Literal(value) => Ok(value.clone()),
            EvalNode::Var(var) => Ok(ctx.var(*var).clone()),
            EvalNode::Error(err) => Err(err.clone()),
            EvalNode::Or(lhs, rhs) => {
                if lhs.eval_bool(ctx)? {
                    return Ok(Value::Bool(true));
                }
                rhs.eval_bool(ctx).map(Value::Bool)
            }
            EvalNode::And(lhs, rhs) => {
                if !lhs.eval_bool(ctx)? {
                    return Ok(Value::Bool(false));
                }
                rhs.eval_bool(ctx).map(Value::Bool)
            }
            EvalNode::Not(arg) => Ok(Value::Bool(!arg.eval_bool(ctx)?)),
            EvalNode::Negate(arg) => {
                let operand = arg.eval_long(ctx)?;
                operand
                    .checked_neg()
                    .map(Value::Long)
                    .ok_or(EvalError::NegationOverflow { operand })
            }
            EvalNode::Arith { op, lhs, rhs } => {
                let lhs = lhs.eval_long(ctx)?;
                let rhs = rhs.eval_long(ctx)?;
                op.apply(lhs, rhs).map(Value::Long)
            }
            EvalNode::Compare { op, lhs, rhs } => compare(*op, lhs.eval(ctx)?, rhs.eval(ctx)?),
            EvalNode::Equal(lhs, rhs) => Ok(Value::Bool(lhs.eval(ctx)? == rhs.eval(ctx)?)),
            EvalNode::NotEqual(lhs, rhs) => Ok(Value::Bool(lhs.eval(ctx)? != rhs.eval(ctx)?)),
            EvalNode::If {
                cond,
                then_node,
                else_node,
            } => {
                if cond.eval_bool(ctx)? {
                    then_node.eval(ctx)
                } else {
                    else_node.eval(ctx)
                }
            }
            EvalNode::Set(items) => items
                .iter()
                .map(|item| item.eval(ctx))
                .collect::<Result<Set, _>>()
                .map(Value::Set),
            EvalNode::Record(fields) => {
                let mut record = Record::new();
                for (key, node) in fields {
                    record.insert(key.clone(), node.eval(ctx)?);
                }
                Ok(Value::Record(record))
            }
            EvalNode::Contains(set, element) => {
                let set = set.eval(ctx)?;
                let set = set.as_set()?;
                let element = element.eval(ctx)?;
                Ok(Value::Bool(set.contains(&element)))
            }
            EvalNode::ContainsAll(lhs, rhs) => {
                let lhs = lhs.eval(ctx)?;
                let lhs = lhs.as_set()?;
                let rhs = rhs.eval(ctx)?;
                let rhs = rhs.as_set()?;
                Ok(Value::Bool(rhs.is_subset(lhs)))
            }
            EvalNode::ContainsAny(lhs, rhs) => {
                let lhs = lhs.eval(ctx)?;
                let lhs = lhs.as_set()?;
                let rhs = rhs.eval(ctx)?;
                let rhs = rhs.as_set()?;
                Ok(Value::Bool(!lhs.is_disjoint(rhs)))
            }
            EvalNode::IsEmpty(arg) => {
                let value = arg.eval(ctx)?;
                Ok(Value::Bool(value.as_set()?.is_empty()))
            }
            EvalNode::GetAttr { object, attr } => get_attr(ctx, object.eval(ctx)?, attr),
            EvalNode::HasAttr { object, attr } => has_attr(ctx, &object.eval(ctx)?, attr),
            EvalNode::Like { arg, pattern } => {
                let value = arg.eval(ctx)?;
                Ok(Value::Bool(pattern.matches(value.as_string()?)))
            }
            EvalNode::In(lhs, rhs) => {
                let lhs = lhs.eval(ctx)?;
                let candidate = lhs.as_entity()?;
                let targets = entity_targets(rhs.eval(ctx)?)?;
                Ok(Value::Bool(entity_in(candidate, &targets, ctx.entities)))
            }
            EvalNode::Is { arg, entity_type } => {
                let value = arg.eval(ctx)?;
                Ok(Value::Bool(value.as_entity()?.type_name() == entity_type))
            }
            EvalNode::Decimal(arg) => {
                let value = arg.eval(ctx)?;
                value.as_string()?.parse::<Decimal>().map(Value::Decimal)
            }
            EvalNode::Ip(arg) => {
                let value = arg.eval(ctx)?;
                value.as_string()?.parse::<IpAddr>().map(Value::Ip)
            }
            EvalNode::DecimalCompare { op, lhs, rhs } => {
                let lhs = lhs.eval(ctx)?.as_decimal()?;
                let rhs = rhs.eval(ctx)?.as_decimal()?;
                Ok(Value::Bool(op.holds(lhs, rhs)))
            }
            EvalNode::IpTest { test, arg } => {
                let ip = arg.eval(ctx)?.as_ip()?;
                Ok(Value::Bool(test.holds(&ip)))
            }
            EvalNode::IsInRange(lhs, rhs) => {
                let ip = lhs.eval(ctx)?.as_ip()?;
                let range = rhs.eval(ctx)?.as_ip()?;
                Ok(Value::Bool(ip.is_in_range(&range)))
            }
        }
    }

    fn eval_bool(&self, ctx: &EvalContext<'_>) -> Result<bool, EvalError> {
        self.eval(ctx)?.as_bool()
    }

    fn eval_long(&self, ctx: &EvalContext<'_>) -> Result<i64, EvalError> {
        self.eval(ctx)?.as_long()
    }
}

/// `<`, `<=`, `>` and `>=`: both operands long or both decimal.
fn compare(op: CompareOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    let holds = match (&lhs, &rhs) {
        (Value::Long(a), Value::Long(b)) => op.holds(a, b),
        (Value::Decimal(a), Value::Decimal(b)) => op.holds(a, b),
        (Value::Long(_), other) => return Err(EvalError::type_mismatch(LONG_TYPE, other.type_name())),
        (Value::Decimal(_), other) => {
            return Err(EvalError::type_mismatch(DECIMAL_TYPE, other.type_name()));
        }
        (other, _) => {
            return Err(EvalError::type_mismatch(
                format!("{LONG_TYPE} or {DECIMAL_TYPE}"),
                other.type_name(),
            ));
        }
    };
    Ok(Value::Bool(holds))
}

fn record_or_entity_mismatch(value: &Value) -> EvalError {
    EvalError::type_mismatch(
        format!("{RECORD_TYPE} or {ANY_ENTITY_TYPE}"),
        value.type_name(),
    )
}

fn get_attr(ctx: &EvalContext<'_>, object: Value, attr: &str) -> Result<Value, EvalError> {
    match object {
        Value::Record(mut fields) => fields.remove(attr).ok_or_else(|| EvalError::AttributeAccess {
            target: RECORD_TYPE.to_string(),
            attr: attr.to_string(),
        }),
        Value::EntityUid(uid) => {
            if uid.is_unspecified() {
                return Err(EvalError::UnspecifiedEntity(attr.to_string()));
            }
            let entity = ctx
                .entities
                .get(&uid)
                .ok_or_else(|| EvalError::EntityNotExist(uid.clone()))?;
            entity
                .attr(attr)
                .cloned()
                .ok_or_else(|| EvalError::AttributeAccess {
                    target: format!("entity `{uid}`"),
                    attr: attr.to_string(),
                })
        }
        other => Err(record_or_entity_mismatch(&other)),
    }
}

fn has_attr(ctx: &EvalContext<'_>, object: &Value, attr: &str) -> Result<Value, EvalError> {
    let present = match object {
        Value::Record(fields) => fields.contains_key(attr),
        Value::EntityUid(uid) => ctx
            .entities
            .attrs(uid)
            .is_some_and(|attrs| attrs.contains_key(attr)),
        other => return Err(record_or_entity_mismatch(other)),
    };
    Ok(Value::Bool(present))
}

/// The right-hand side of `in`: one entity or a set made only of entities.
fn entity_targets(value: Value) -> Result<HashSet<EntityUid>, EvalError> {
    match value {
        Value::EntityUid(uid) => Ok(HashSet::from([uid])),
        Value::Set(items) => items
            .into_iter()
            .map(|item| match item {
                Value::EntityUid(uid) => Ok(uid),
                other => Err(EvalError::type_mismatch(ANY_ENTITY_TYPE, other.type_name())),
            })
            .collect(),
        other => Err(EvalError::type_mismatch(
            format!("{SET_TYPE} or {ANY_ENTITY_TYPE}"),
            other.type_name(),
        )),
    }
}
