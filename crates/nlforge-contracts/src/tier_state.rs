//! Per-request tier-escalation state.
//!
//! Mutable only for the lifetime of a single extraction phase; destroyed
//! once extraction completes. `nlforge-core::TierExecutor` is the only
//! writer, but the shape lives here so other crates (audit, tests) can read
//! a finished escalation log without depending on the executor crate.

use serde::{Deserialize, Serialize};

use crate::entity::{ClinicalEntity, Tier};

/// One step of the escalation decision log: which tier ran, what confidence
/// it produced, and whether the state machine advanced past it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationStep {
    pub tier: Tier,
    pub weighted_min_confidence: f64,
    pub escalated: bool,
    /// Set when this step is the point the pipeline stopped due to the cost
    /// ceiling rather than confidence (spec: `budget-halt` provenance note).
    pub budget_halt: bool,
}

/// Per-request mutable state carried across the four extraction tiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierState {
    pub entities: Vec<ClinicalEntity>,
    pub cumulative_cost: f64,
    pub steps: Vec<EscalationStep>,
}

impl TierState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_step(&mut self, step: EscalationStep) {
        self.steps.push(step);
    }

    pub fn extend_entities(&mut self, new_entities: impl IntoIterator<Item = ClinicalEntity>) {
        self.entities.extend(new_entities);
    }

    pub fn had_budget_halt(&self) -> bool {
        self.steps.iter().any(|s| s.budget_halt)
    }

    pub fn tier4_invocation_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.tier == Tier::Tier4External)
            .count()
    }
}
