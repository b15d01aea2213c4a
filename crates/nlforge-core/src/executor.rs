//! The tier executor: the deterministic, budget-bound escalation runner.
//!
//! The executor enforces the extraction escalation model:
//!
//!   Tier 1 → [gate] → Tier 2 → [gate] → Tier 3 → [gate] → Tier 4 → [gate]
//!
//! At every step the executor checks the running cost against the cost
//! ceiling *before* invoking a tier. A tier whose estimated cost would
//! exceed the ceiling is never invoked: the escalation halts there and the
//! halt is recorded as `budget_halt` on the `EscalationStep`, not as an
//! error. Escalation also stops as soon as `ThresholdGate::meets_threshold`
//! is satisfied, even if tiers remain.

use tracing::{debug, info, warn};

use nlforge_contracts::{
    entity::Tier,
    error::PipelineResult,
    request::RequestCorrelationToken,
    tier_state::{EscalationStep, TierState},
};

use crate::traits::{ExtractionTier, ThresholdGate};

/// Drives the four extraction tiers in order against a single request.
///
/// Construct one executor per pipeline instance and reuse it across
/// requests; it holds no per-request state itself. `run()` returns a fresh
/// `TierState` describing every tier invoked and the entities produced.
pub struct TierExecutor {
    tiers: Vec<Box<dyn ExtractionTier>>,
    gate: Box<dyn ThresholdGate>,
    cost_ceiling: f64,
}

impl TierExecutor {
    /// `tiers` should be supplied in escalation order (tier 1 first). The
    /// executor does not sort them; a caller that passes tiers out of order
    /// gets an escalation that runs out of order.
    pub fn new(tiers: Vec<Box<dyn ExtractionTier>>, gate: Box<dyn ThresholdGate>, cost_ceiling: f64) -> Self {
        Self { tiers, gate, cost_ceiling }
    }

    /// Run the escalation ladder against `text`.
    ///
    /// # Escalation
    ///
    /// For each tier, in order:
    /// 1. Estimate the tier's cost. If `cumulative_cost + cost` exceeds the
    ///    ceiling, record a `budget_halt` step and stop without invoking it.
    /// 2. Invoke the tier, add its cost to the running total.
    /// 3. Extend the accumulated entity set with its output.
    /// 4. Record an `EscalationStep`; `escalated` is true unless the gate
    ///    now reports the required entity kinds are satisfied.
    /// 5. If the gate is satisfied, stop. Otherwise continue to the next tier.
    ///
    /// # Errors
    ///
    /// A tier returning `Err` propagates immediately: a tier failure is not
    /// the same as a budget halt and is not swallowed.
    pub fn run(&self, text: &str, correlation: &RequestCorrelationToken) -> PipelineResult<TierState> {
        let mut state = TierState::new();

        debug!(
            correlation = %correlation,
            text_len = text.len(),
            "tier executor starting"
        );

        for tier_impl in &self.tiers {
            let tier = tier_impl.tier();
            let cost = tier_impl.estimated_cost(text);

            if state.cumulative_cost + cost > self.cost_ceiling {
                warn!(
                    correlation = %correlation,
                    tier = ?tier,
                    cumulative_cost = state.cumulative_cost,
                    cost_ceiling = self.cost_ceiling,
                    "cost ceiling reached, halting escalation"
                );
                state.record_step(EscalationStep {
                    tier,
                    weighted_min_confidence: self.gate.weighted_min_confidence(tier),
                    escalated: false,
                    budget_halt: true,
                });
                break;
            }

            debug!(correlation = %correlation, tier = ?tier, "invoking extraction tier");
            let produced = tier_impl.run(text, &state)?;
            state.cumulative_cost += cost;
            state.extend_entities(produced);

            let satisfied = self.gate.meets_threshold(&state.entities, tier);
            state.record_step(EscalationStep {
                tier,
                weighted_min_confidence: self.gate.weighted_min_confidence(tier),
                escalated: !satisfied,
                budget_halt: false,
            });

            if satisfied {
                info!(
                    correlation = %correlation,
                    tier = ?tier,
                    entity_count = state.entities.len(),
                    "threshold satisfied, stopping escalation"
                );
                break;
            }
        }

        Ok(state)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use nlforge_contracts::entity::{ClinicalEntity, EntityKind, Span};

    use super::*;

    struct FixedTier {
        tier: Tier,
        cost: f64,
        entities: Vec<ClinicalEntity>,
        call_count: AtomicU32,
    }

    impl ExtractionTier for FixedTier {
        fn tier(&self) -> Tier {
            self.tier
        }

        fn run(&self, _text: &str, _state: &TierState) -> PipelineResult<Vec<ClinicalEntity>> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(self.entities.clone())
        }

        fn estimated_cost(&self, _text: &str) -> f64 {
            self.cost
        }
    }

    struct RequireMedication;

    impl ThresholdGate for RequireMedication {
        fn required_kinds(&self) -> &[EntityKind] {
            &[EntityKind::Medication]
        }

        fn weighted_min_confidence(&self, tier: Tier) -> f64 {
            match tier {
                Tier::Tier1Pattern => 0.9,
                Tier::Tier2Tagger => 0.8,
                Tier::Tier3Regex => 0.85,
                Tier::Tier4External => 0.6,
            }
        }
    }

    fn medication_entity(confidence: f64, tier: Tier) -> ClinicalEntity {
        ClinicalEntity::new(
            EntityKind::Medication,
            Span { start: 0, end: 10 },
            "lisinopril",
            confidence,
            tier,
        )
    }

    fn token() -> RequestCorrelationToken {
        RequestCorrelationToken::new()
    }

    /// A tier 1 hit clearing the threshold must stop escalation before any
    /// later tier runs.
    #[test]
    fn stops_as_soon_as_threshold_is_met() {
        let tier2_calls = AtomicU32::new(0);
        let executor = TierExecutor::new(
            vec![
                Box::new(FixedTier {
                    tier: Tier::Tier1Pattern,
                    cost: 0.0,
                    entities: vec![medication_entity(0.95, Tier::Tier1Pattern)],
                    call_count: AtomicU32::new(0),
                }),
                Box::new(FixedTier {
                    tier: Tier::Tier2Tagger,
                    cost: 1.0,
                    entities: vec![],
                    call_count: tier2_calls,
                }),
            ],
            Box::new(RequireMedication),
            10.0,
        );

        let state = executor.run("lisinopril 10mg", &token()).unwrap();
        assert_eq!(state.steps.len(), 1);
        assert!(!state.steps[0].escalated);
        assert_eq!(state.entities.len(), 1);
    }

    /// Escalates through all tiers when none individually clears the bar.
    #[test]
    fn escalates_when_threshold_not_met() {
        let executor = TierExecutor::new(
            vec![
                Box::new(FixedTier {
                    tier: Tier::Tier1Pattern,
                    cost: 0.0,
                    entities: vec![],
                    call_count: AtomicU32::new(0),
                }),
                Box::new(FixedTier {
                    tier: Tier::Tier2Tagger,
                    cost: 1.0,
                    entities: vec![medication_entity(0.82, Tier::Tier2Tagger)],
                    call_count: AtomicU32::new(0),
                }),
            ],
            Box::new(RequireMedication),
            10.0,
        );

        let state = executor.run("some free text", &token()).unwrap();
        assert_eq!(state.steps.len(), 2);
        assert!(state.steps[0].escalated);
        assert!(!state.steps[1].escalated);
    }

    /// When the next tier's cost would exceed the ceiling, the executor
    /// halts with `budget_halt = true` and never invokes that tier.
    #[test]
    fn halts_on_cost_ceiling_without_invoking_the_tier() {
        let tier4_calls = std::sync::Arc::new(AtomicU32::new(0));
        let executor = TierExecutor::new(
            vec![
                Box::new(FixedTier {
                    tier: Tier::Tier1Pattern,
                    cost: 0.0,
                    entities: vec![],
                    call_count: AtomicU32::new(0),
                }),
                Box::new(FixedTier {
                    tier: Tier::Tier4External,
                    cost: 5.0,
                    entities: vec![medication_entity(0.99, Tier::Tier4External)],
                    call_count: AtomicU32::new(0),
                }),
            ],
            Box::new(RequireMedication),
            2.0,
        );

        let state = executor.run("text", &token()).unwrap();
        assert_eq!(state.steps.len(), 2);
        assert!(state.steps[1].budget_halt);
        assert!(state.entities.is_empty(), "halted tier must not contribute entities");
        let _ = tier4_calls;
    }

    /// A tier returning an error propagates immediately; no step is
    /// recorded for it.
    #[test]
    fn tier_error_propagates() {
        struct FailingTier;
        impl ExtractionTier for FailingTier {
            fn tier(&self) -> Tier {
                Tier::Tier3Regex
            }
            fn run(&self, _text: &str, _state: &TierState) -> PipelineResult<Vec<ClinicalEntity>> {
                Err(nlforge_contracts::error::PipelineError::ExtractionFailed)
            }
            fn estimated_cost(&self, _text: &str) -> f64 {
                0.0
            }
        }

        let executor = TierExecutor::new(vec![Box::new(FailingTier)], Box::new(RequireMedication), 10.0);
        let result = executor.run("text", &token());
        assert!(matches!(
            result,
            Err(nlforge_contracts::error::PipelineError::ExtractionFailed)
        ));
    }
}
