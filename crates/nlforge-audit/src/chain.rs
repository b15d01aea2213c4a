//! SHA-256 hash chaining for the audit log.
//!
//! Each event's hash commits to a fixed byte layout built from its own
//! fields plus the hash of the event before it, so tampering with any
//! stored event or reordering the log breaks the chain at that point and
//! every point after it.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::event::{AuditEvent, AuditEventKind};

/// Assembles the deterministic byte buffer a single event's hash commits
/// to: `correlation`, `sequence` (little-endian), `prev_hash`, then the
/// canonical JSON encoding of `(kind, timestamp)`.
fn canonical_bytes(correlation: &str, sequence: u64, kind: &AuditEventKind, timestamp: DateTime<Utc>, prev_hash: &str) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(correlation.len() + 8 + prev_hash.len() + 64);
    buffer.extend_from_slice(correlation.as_bytes());
    buffer.extend_from_slice(&sequence.to_le_bytes());
    buffer.extend_from_slice(prev_hash.as_bytes());
    buffer.extend(serde_json::to_vec(&(kind, timestamp)).expect("AuditEventKind always serializes"));
    buffer
}

/// Hashes one audit event down to a lowercase 64-character hex digest.
///
/// The digest binds the event's position (`sequence`), the request it
/// belongs to (`correlation`), the previous link in the chain
/// (`prev_hash`), and its categorical payload (`kind`, `timestamp`).
/// `AuditEventKind` is always JSON-serializable, so this never fails.
pub fn hash_event(correlation: &str, sequence: u64, kind: &AuditEventKind, timestamp: DateTime<Utc>, prev_hash: &str) -> String {
    let bytes = canonical_bytes(correlation, sequence, kind, timestamp, prev_hash);
    hex::encode(Sha256::digest(&bytes))
}

/// Checks one event's hashes against its predecessor's. `expected_prev` is
/// the `this_hash` the preceding event produced (or the genesis constant
/// for the first event in the chain).
fn is_correctly_linked(event: &AuditEvent, expected_prev: &str) -> bool {
    if event.prev_hash != expected_prev {
        return false;
    }
    let recomputed = hash_event(&event.correlation, event.sequence, &event.kind, event.timestamp, &event.prev_hash);
    event.this_hash == recomputed
}

/// Walks a sequence of events and confirms the chain has not been
/// tampered with: every event links to its predecessor's hash, and every
/// stored hash matches what its own fields recompute to.
///
/// An empty slice is trivially valid. Verification stops and returns
/// `false` at the first break found; it does not report how many links
/// past that point are also broken.
pub fn verify_chain(events: &[AuditEvent]) -> bool {
    let mut expected_prev = AuditEvent::GENESIS_HASH;
    for event in events {
        if !is_correctly_linked(event, expected_prev) {
            return false;
        }
        expected_prev = &event.this_hash;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AuditEventKind;

    fn sample_event(sequence: u64, prev_hash: &str) -> AuditEvent {
        let kind = AuditEventKind::RequestReceived { input_length: 42 };
        let timestamp = Utc::now();
        let this_hash = hash_event("corr-1", sequence, &kind, timestamp, prev_hash);
        AuditEvent {
            sequence,
            correlation: "corr-1".to_string(),
            kind,
            timestamp,
            prev_hash: prev_hash.to_string(),
            this_hash,
        }
    }

    #[test]
    fn empty_chain_is_valid() {
        assert!(verify_chain(&[]));
    }

    #[test]
    fn a_correctly_linked_chain_verifies() {
        let first = sample_event(0, AuditEvent::GENESIS_HASH);
        let second = sample_event(1, &first.this_hash);
        assert!(verify_chain(&[first, second]));
    }

    #[test]
    fn tampering_with_a_stored_hash_breaks_verification() {
        let first = sample_event(0, AuditEvent::GENESIS_HASH);
        let mut second = sample_event(1, &first.this_hash);
        second.this_hash = "0".repeat(64);
        assert!(!verify_chain(&[first, second]));
    }

    #[test]
    fn a_broken_prev_hash_link_breaks_verification() {
        let first = sample_event(0, AuditEvent::GENESIS_HASH);
        let mut second = sample_event(1, "not-the-right-prev-hash");
        second.this_hash = hash_event("corr-1", 1, &second.kind, second.timestamp, &second.prev_hash);
        assert!(!verify_chain(&[first, second]));
    }
}
