//! Runtime values produced by policy evaluation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter, Result as FmtResult};

use itertools::Itertools;

use crate::error::EvalError;

use super::{Decimal, EntityUid, IpAddr};

/// Attribute maps, used both for record values and entity attributes.
pub type Record = BTreeMap<String, Value>;

/// Set values; duplicates collapse on construction and order never matters.
pub type Set = BTreeSet<Value>;

pub(crate) const BOOL_TYPE: &str = "bool";
pub(crate) const LONG_TYPE: &str = "long";
pub(crate) const STRING_TYPE: &str = "string";
pub(crate) const SET_TYPE: &str = "set";
pub(crate) const RECORD_TYPE: &str = "record";
pub(crate) const DECIMAL_TYPE: &str = "decimal";
pub(crate) const IP_TYPE: &str = "IP";
pub(crate) const ANY_ENTITY_TYPE: &str = "(entity of type `any`)";

/// A Cedar runtime value.
///
/// Equality is deep and structural: values of different kinds are simply
/// unequal, and sets compare as mathematical sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Bool(bool),
    Long(i64),
    String(String),
    Set(Set),
    Record(Record),
    EntityUid(EntityUid),
    Decimal(Decimal),
    Ip(IpAddr),
}

impl Value {
    pub fn set(values: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(values.into_iter().collect())
    }

    pub fn record<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Record(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// The name used for this value's kind in type errors.
    pub fn type_name(&self) -> String {
        match self {
            Value::Bool(_) => BOOL_TYPE.to_string(),
            Value::Long(_) => LONG_TYPE.to_string(),
            Value::String(_) => STRING_TYPE.to_string(),
            Value::Set(_) => SET_TYPE.to_string(),
            Value::Record(_) => RECORD_TYPE.to_string(),
            Value::EntityUid(uid) => format!("(entity of type `{}`)", uid.type_name()),
            Value::Decimal(_) => DECIMAL_TYPE.to_string(),
            Value::Ip(_) => IP_TYPE.to_string(),
        }
    }

    /// Render the value as Cedar source text.
    pub fn to_cedar(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Long(n) => n.to_string(),
            Value::String(s) => quote(s),
            Value::Set(items) => format!("[{}]", items.iter().map(Value::to_cedar).join(", ")),
            Value::Record(fields) => format!(
                "{{{}}}",
                fields
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote(k), v.to_cedar()))
                    .join(", ")
            ),
            Value::EntityUid(uid) => uid.to_string(),
            Value::Decimal(d) => format!("decimal({})", quote(&d.to_string())),
            Value::Ip(ip) => format!("ip({})", quote(&ip.to_string())),
        }
    }

    fn mismatch(&self, expected: &str) -> EvalError {
        EvalError::type_mismatch(expected, self.type_name())
    }

    pub fn as_bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.mismatch(BOOL_TYPE)),
        }
    }

    pub fn as_long(&self) -> Result<i64, EvalError> {
        match self {
            Value::Long(n) => Ok(*n),
            other => Err(other.mismatch(LONG_TYPE)),
        }
    }

    pub fn as_string(&self) -> Result<&str, EvalError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch(STRING_TYPE)),
        }
    }

    pub fn as_set(&self) -> Result<&Set, EvalError> {
        match self {
            Value::Set(items) => Ok(items),
            other => Err(other.mismatch(SET_TYPE)),
        }
    }

    pub fn as_record(&self) -> Result<&Record, EvalError> {
        match self {
            Value::Record(fields) => Ok(fields),
            other => Err(other.mismatch(RECORD_TYPE)),
        }
    }

    pub fn as_entity(&self) -> Result<&EntityUid, EvalError> {
        match self {
            Value::EntityUid(uid) => Ok(uid),
            other => Err(other.mismatch(ANY_ENTITY_TYPE)),
        }
    }

    pub fn as_decimal(&self) -> Result<Decimal, EvalError> {
        match self {
            Value::Decimal(d) => Ok(*d),
            other => Err(other.mismatch(DECIMAL_TYPE)),
        }
    }

    pub fn as_ip(&self) -> Result<IpAddr, EvalError> {
        match self {
            Value::Ip(ip) => Ok(*ip),
            other => Err(other.mismatch(IP_TYPE)),
        }
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.escape_debug())
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Ip(ip) => write!(f, "{ip}"),
            other => f.write_str(&other.to_cedar()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Long(i64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<EntityUid> for Value {
    fn from(uid: EntityUid) -> Self {
        Value::EntityUid(uid)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<IpAddr> for Value {
    fn from(ip: IpAddr) -> Self {
        Value::Ip(ip)
    }
}

impl From<Record> for Value {
    fn from(fields: Record) -> Self {
        Value::Record(fields)
    }
}

impl From<Set> for Value {
    fn from(items: Set) -> Self {
        Value::Set(items)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Value::Set(iter.into_iter().collect())
    }
}
