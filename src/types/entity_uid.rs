//! Entity identifiers.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A Cedar entity identifier, e.g. `User::"alice"` or `Infra::Host::"web-01"`.
///
/// The type is the full, `::`-separated path. A UID with an empty type and an
/// empty id is the "unspecified" entity.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub struct EntityUid {
    #[serde(rename = "type")]
    ty: String,
    id: String,
}

impl EntityUid {
    pub fn new(ty: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            id: id.into(),
        }
    }

    /// The zero UID, used for request slots the caller left unspecified.
    pub fn unspecified() -> Self {
        Self::default()
    }

    pub fn is_unspecified(&self) -> bool {
        self.ty.is_empty() && self.id.is_empty()
    }

    pub fn type_name(&self) -> &str {
        &self.ty
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Display for EntityUid {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}::\"{}\"", self.ty, self.id.escape_debug())
    }
}
