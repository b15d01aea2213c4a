//! The assembled bundle: an ordered sequence of (full-URL, payload) entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resource::ResourcePayload;

/// `transaction` bundles require atomic apply and a topological order;
/// `collection` bundles carry no ordering or atomicity guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleKind {
    Transaction,
    Collection,
}

/// One entry in an assembled bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleEntry {
    #[serde(rename = "fullUrl")]
    pub full_url: String,
    pub resource: ResourcePayload,
}

/// The final transactional or collection bundle.
///
/// Invariants (enforced by the assembler, not by this type): every internal
/// reference resolves to exactly one entry; entries are topologically sorted
/// for `transaction` bundles; no cycles exist in a `transaction` bundle's
/// reference graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BundleKind,
    pub timestamp: DateTime<Utc>,
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    pub fn new(kind: BundleKind, entries: Vec<BundleEntry>, timestamp: DateTime<Utc>) -> Self {
        Self {
            resource_type: "Bundle".to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            timestamp,
            entry: entries,
        }
    }
}
