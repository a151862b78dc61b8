//! Data model: runtime values, entities, requests and decisions.
//!
//! Canonical string forms:
//! - EntityUid: `User::"alice"` or `NS::User::"alice"`
//! - Decimal: `1.23` (at most four fractional digits)
//! - IpAddr: `10.0.0.1` or `10.0.0.0/8`, IPv6 in colon-hex form

mod decimal;
mod decision;
mod entity;
mod entity_uid;
mod ipaddr;
mod policy_id;
mod request;
mod value;

pub use decimal::Decimal;
pub use decision::{Decision, DiagnosticError, Diagnostics, Reason, Response};
pub use entity::{Entities, Entity};
pub use entity_uid::EntityUid;
pub use ipaddr::IpAddr;
pub use policy_id::{PolicyId, Position};
pub use request::Request;
pub use value::{Record, Set, Value};

pub(crate) use value::{ANY_ENTITY_TYPE, DECIMAL_TYPE, LONG_TYPE, RECORD_TYPE, SET_TYPE};
