//! # nlforge-audit
//!
//! Immutable, append-only, SHA-256 hash-chained audit trail for the nlforge
//! clinical-text-to-bundle pipeline.
//!
//! ## Overview
//!
//! Every lifecycle event a pipeline run records is wrapped in an
//! `AuditEvent` that links to the previous event via its SHA-256 hash.
//! Tampering with any event, even a single byte, breaks the chain and is
//! detected by `verify_chain`. Events are categorical only: no variant of
//! `AuditEventKind` may carry raw clinical text or a patient-identifying
//! field.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nlforge_audit::{AuditSink, InMemoryAuditWriter, AuditEventKind};
//! use nlforge_contracts::request::RequestCorrelationToken;
//!
//! let writer = InMemoryAuditWriter::new(RequestCorrelationToken::new());
//! writer.record(AuditEventKind::RequestReceived { input_length: 128 })?;
//! writer.finalize()?;
//!
//! assert!(writer.verify_integrity());
//! let log = writer.export_log();
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_event, verify_chain};
pub use event::{AuditEvent, AuditEventKind, AuditLog};
pub use memory::{AuditSink, InMemoryAuditWriter};

#[cfg(test)]
mod tests {
    use nlforge_contracts::{request::RequestCorrelationToken, resource::ResourceKind};

    use super::{AuditEvent, AuditEventKind, AuditSink, InMemoryAuditWriter};

    fn tier_event(tier_ordinal: u8) -> AuditEventKind {
        AuditEventKind::TierEscalated {
            tier_ordinal,
            cumulative_cost: 0.1 * tier_ordinal as f64,
            budget_halt: false,
        }
    }

    /// Writing three events and verifying produces a valid chain.
    #[test]
    fn test_hash_chain_integrity() {
        let writer = InMemoryAuditWriter::new(RequestCorrelationToken::new());
        writer.record(AuditEventKind::RequestReceived { input_length: 42 }).unwrap();
        writer.record(tier_event(1)).unwrap();
        writer.record(AuditEventKind::RequestCompleted).unwrap();

        assert!(writer.verify_integrity(), "chain must be valid after sequential writes");
    }

    /// Mutating any event's payload field breaks the chain.
    #[test]
    fn test_tamper_detection() {
        let writer = InMemoryAuditWriter::new(RequestCorrelationToken::new());
        writer.record(AuditEventKind::RequestReceived { input_length: 10 }).unwrap();
        writer.record(tier_event(1)).unwrap();
        writer
            .record(AuditEventKind::ResourceFactoryInvoked { kind: ResourceKind::Patient })
            .unwrap();

        {
            let mut state = writer.state.lock().unwrap();
            state.events[0].kind = AuditEventKind::RequestReceived { input_length: 99999 };
        }

        assert!(
            !writer.verify_integrity(),
            "chain must detect tampering with a stored event"
        );
    }

    /// The first event's `prev_hash` must equal `AuditEvent::GENESIS_HASH`.
    #[test]
    fn test_genesis_hash() {
        let writer = InMemoryAuditWriter::new(RequestCorrelationToken::new());
        writer.record(AuditEventKind::RequestReceived { input_length: 7 }).unwrap();

        let log = writer.export_log();
        assert_eq!(log.events.len(), 1);
        assert_eq!(
            log.events[0].prev_hash,
            AuditEvent::GENESIS_HASH,
            "first event must link to the genesis sentinel hash"
        );
    }

    /// Sequence numbers must be 0, 1, 2, … with no gaps or skips.
    #[test]
    fn test_sequence_monotonic() {
        let writer = InMemoryAuditWriter::new(RequestCorrelationToken::new());
        writer.record(AuditEventKind::RequestReceived { input_length: 1 }).unwrap();
        writer.record(tier_event(1)).unwrap();
        writer.record(tier_event(2)).unwrap();

        let log = writer.export_log();
        for (idx, event) in log.events.iter().enumerate() {
            assert_eq!(
                event.sequence, idx as u64,
                "sequence at position {} should be {}",
                idx, idx
            );
        }
    }

    /// `export_log()` contains every written event in order.
    #[test]
    fn test_export_log() {
        let writer = InMemoryAuditWriter::new(RequestCorrelationToken::new());
        writer.record(AuditEventKind::RequestReceived { input_length: 3 }).unwrap();
        writer.record(tier_event(1)).unwrap();
        writer
            .record(AuditEventKind::BundleAssembled { entry_count: 4 })
            .unwrap();

        let log = writer.export_log();

        assert_eq!(log.events.len(), 3, "log must contain all written events");
        assert_eq!(
            log.terminal_hash,
            log.events.last().unwrap().this_hash,
            "terminal_hash must equal the last event's this_hash"
        );
        assert!(
            super::verify_chain(&log.events),
            "exported log must pass chain verification"
        );
    }

    /// An empty chain is trivially valid, there is nothing to verify.
    #[test]
    fn test_verify_empty() {
        let writer = InMemoryAuditWriter::new(RequestCorrelationToken::new());
        assert!(
            writer.verify_integrity(),
            "an empty chain must be considered valid"
        );
        assert!(
            super::verify_chain(&[]),
            "verify_chain on empty slice must return true"
        );
    }
}
