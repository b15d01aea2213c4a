//! The in-process `AuditSink`: an append-only hash chain kept in memory.
//!
//! `InMemoryAuditWriter` is what every pipeline request is wired to today.
//! A durable sink (writing to a database or object store) would implement
//! the same `AuditSink` trait and reuse `chain::hash_event`/`verify_chain`
//! unchanged; only the storage for `events` would differ.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::info;

use nlforge_contracts::{
    error::{PipelineError, PipelineResult},
    request::RequestCorrelationToken,
};

use crate::{
    chain::{hash_event, verify_chain},
    event::{AuditEvent, AuditEventKind, AuditLog},
};

/// A sink for categorical pipeline lifecycle events.
///
/// An implementation appends events to a hash chain scoped to one
/// request's correlation token. No variant of `AuditEventKind` carries raw
/// clinical text or a patient-identifying field, so no implementation can
/// leak one through this trait regardless of how it stores events.
pub trait AuditSink: Send + Sync {
    fn record(&self, kind: AuditEventKind) -> PipelineResult<()>;
    fn finalize(&self) -> PipelineResult<()>;
}

/// Accumulated chain state for one writer, guarded by a `Mutex` so the
/// writer can be shared across threads handling the same request.
pub(crate) struct InMemoryState {
    pub(crate) events: Vec<AuditEvent>,
    pub(crate) next_sequence: u64,
    pub(crate) last_hash: String,
}

impl InMemoryState {
    fn new() -> Self {
        Self { events: Vec::new(), next_sequence: 0, last_hash: AuditEvent::GENESIS_HASH.to_string() }
    }

    /// Hashes `kind` into the chain and appends the resulting event,
    /// advancing `next_sequence` and `last_hash` in the same step.
    fn append(&mut self, correlation: &str, kind: AuditEventKind) -> &AuditEvent {
        let sequence = self.next_sequence;
        let prev_hash = self.last_hash.clone();
        let timestamp = Utc::now();
        let this_hash = hash_event(correlation, sequence, &kind, timestamp, &prev_hash);

        self.events.push(AuditEvent {
            sequence,
            correlation: correlation.to_string(),
            kind,
            timestamp,
            prev_hash,
            this_hash: this_hash.clone(),
        });
        self.next_sequence += 1;
        self.last_hash = this_hash;

        self.events.last().expect("just pushed")
    }
}

/// An `AuditSink` that keeps its hash chain in a `Vec` behind a `Mutex`,
/// scoped to a single request's correlation token for its whole lifetime.
pub struct InMemoryAuditWriter {
    correlation: RequestCorrelationToken,
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryAuditWriter {
    pub fn new(correlation: RequestCorrelationToken) -> Self {
        Self { correlation, state: Arc::new(Mutex::new(InMemoryState::new())) }
    }

    fn lock(&self) -> PipelineResult<MutexGuard<'_, InMemoryState>> {
        self.state.lock().map_err(|e| PipelineError::AuditWriteFailed { reason: format!("audit state lock poisoned: {}", e) })
    }

    /// Seals everything written so far into an `AuditLog`. Callable at any
    /// point, not only after `finalize()`; the terminal hash is empty for a
    /// writer that has recorded nothing yet.
    pub fn export_log(&self) -> AuditLog {
        let state = self.state.lock().expect("audit state lock poisoned");
        let terminal_hash = state.events.last().map(|e| e.this_hash.clone()).unwrap_or_default();
        AuditLog { correlation: self.correlation.to_string(), events: state.events.clone(), finalized_at: Utc::now(), terminal_hash }
    }

    /// Recomputes and checks every link in the chain built so far.
    pub fn verify_integrity(&self) -> bool {
        let state = self.state.lock().expect("audit state lock poisoned");
        verify_chain(&state.events)
    }
}

impl AuditSink for InMemoryAuditWriter {
    fn record(&self, kind: AuditEventKind) -> PipelineResult<()> {
        let correlation = self.correlation.to_string();
        let mut state = self.lock()?;
        state.append(&correlation, kind);
        Ok(())
    }

    fn finalize(&self) -> PipelineResult<()> {
        let state = self.lock()?;
        info!(
            correlation = %self.correlation,
            event_count = state.events.len(),
            terminal_hash = %state.last_hash,
            "audit log finalized"
        );
        Ok(())
    }
}
