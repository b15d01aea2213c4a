//! Request identity types.
//!
//! A `RequestCorrelationToken` ties together the extraction, assembly, and
//! validation phases of a single pipeline run without ever encoding
//! anything derived from patient-identifying input.

use serde::{Deserialize, Serialize};

/// Opaque identifier for one pipeline run.
///
/// Generated fresh per request; never derived from input content, so it is
/// safe to log and attach to audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestCorrelationToken(pub uuid::Uuid);

impl RequestCorrelationToken {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RequestCorrelationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestCorrelationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
