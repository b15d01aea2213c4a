//! Intra-bundle references.
//!
//! A reference is a name, not a pointer: `<ResourceKind>/<Identifier>`. The
//! bundle assembler is the only component that resolves references to
//! concrete entries.

use serde::{Deserialize, Serialize};

use crate::resource::ResourceKind;

/// A `<ResourceKind>/<Identifier>` reference, or a declared external one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub kind: ResourceKind,
    pub id: String,
}

impl Reference {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Parse the `<Kind>/<id>` wire form.
    pub fn parse(raw: &str) -> Option<Self> {
        let (kind_str, id) = raw.split_once('/')?;
        let kind = ResourceKind::from_wire_name(kind_str)?;
        Some(Self {
            kind,
            id: id.to_string(),
        })
    }

    /// The short wire form used inside payloads: `Kind/id`.
    pub fn to_short_form(&self) -> String {
        format!("{}/{}", self.kind.wire_name(), self.id)
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_short_form())
    }
}

/// A resource reference as it appears on the wire inside a payload field:
/// `{"reference": "Kind/id"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceValue {
    pub reference: String,
}

impl From<&Reference> for ReferenceValue {
    fn from(r: &Reference) -> Self {
        Self {
            reference: r.to_short_form(),
        }
    }
}
