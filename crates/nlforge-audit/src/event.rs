//! Audit event and log types.
//!
//! Every event is categorical: no raw clinical text, no normalized entity
//! surface form, no patient-identifying field ever appears in a record.
//! `AuditEvent` wraps one categorical event in the hash chain, linking to
//! the previous event's hash so tampering with any field is detectable.
//! `AuditLog` is the sealed record produced when a request finalizes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nlforge_contracts::{
    resource::ResourceKind,
    safety::{SafetyFindingKind, SafetySeverity},
};

/// The categorical shape of one pipeline lifecycle event. No variant may
/// carry raw input text, an extracted normalized surface form, or a
/// patient-identifying field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuditEventKind {
    RequestReceived {
        input_length: usize,
    },
    TierEscalated {
        tier_ordinal: u8,
        cumulative_cost: f64,
        budget_halt: bool,
    },
    ResourceFactoryInvoked {
        kind: ResourceKind,
    },
    SafetyFindingRecorded {
        kind: SafetyFindingKind,
        severity: SafetySeverity,
    },
    ValidationCompleted {
        degraded: bool,
        issue_count: u32,
        blocking: bool,
    },
    BundleAssembled {
        entry_count: usize,
    },
    RequestCompleted,
    RequestFailed {
        error_kind: String,
    },
}

/// A single entry in the SHA-256 hash chain for one request.
///
/// Each event commits to the previous event via `prev_hash`, forming an
/// append-only chain. Modifying any field invalidates `this_hash` and every
/// subsequent `prev_hash`, which `verify_chain` detects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Monotonically increasing position in the chain, starting at 0.
    pub sequence: u64,

    /// The request this event belongs to.
    pub correlation: String,

    /// The categorical event payload.
    pub kind: AuditEventKind,

    /// Wall-clock time (UTC) the event was recorded.
    pub timestamp: DateTime<Utc>,

    /// SHA-256 hash (hex) of the previous event, or `GENESIS_HASH` for the
    /// first event.
    pub prev_hash: String,

    /// SHA-256 hash (hex) of this event's canonical content.
    ///
    /// Computed by `hash_event()` over (correlation, sequence, prev_hash,
    /// canonical JSON of kind, timestamp).
    pub this_hash: String,
}

impl AuditEvent {
    /// The sentinel `prev_hash` used for the first event in every chain.
    ///
    /// 64 hex zeros, a value that can never be the SHA-256 of real data.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A sealed, finalized audit log for a single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    /// The request whose lifecycle events are recorded here.
    pub correlation: String,

    /// All audit events in chain order (sequence 0 first).
    pub events: Vec<AuditEvent>,

    /// Wall-clock time (UTC) the log was exported / finalized.
    pub finalized_at: DateTime<Utc>,

    /// The `this_hash` of the last event. Empty string if the log is empty.
    pub terminal_hash: String,
}
