//! Core trait definitions for the nlforge extraction and assembly pipeline.
//!
//! Four traits define the seams the executor wires together:
//!
//! - `ExtractionTier`  : one of the four escalating entity extractors
//! - `ThresholdGate`   : decides whether accumulated entities clear the bar
//! - `TerminologyCoder`: resolves free text against a fixed ontology
//! - `ResourceFactory` : builds one FHIR resource kind from coded entities
//!
//! The executor calls `ExtractionTier::run` in tier order and consults
//! `ThresholdGate` after every tier to decide whether to stop or escalate.

use nlforge_contracts::{
    coding::{CodedConcept, OntologyIntent},
    entity::{ClinicalEntity, EntityKind, Tier},
    error::PipelineResult,
    reference::Reference,
    resource::{ResourceKind, ResourcePayload},
    tier_state::TierState,
};

/// A single extraction tier.
///
/// Tiers 1 and 3 must be deterministic: the same input text always produces
/// the same entities in the same order. Tiers 2 and 4 are not required to
/// be, which is why every entity carries its originating tier for
/// downstream evidence weighting.
pub trait ExtractionTier: Send + Sync {
    /// Which tier this implementation represents.
    fn tier(&self) -> Tier;

    /// Extract entities from `text`, given everything accumulated by
    /// earlier tiers in `state`. Implementations should avoid re-proposing
    /// spans already covered by `state.entities`.
    fn run(&self, text: &str, state: &TierState) -> PipelineResult<Vec<ClinicalEntity>>;

    /// Estimated cost of invoking this tier on `text`, in the same unit as
    /// the per-request cost ceiling. Tiers 1 and 3 are typically near-zero;
    /// tier 4 carries the bulk of the budget.
    fn estimated_cost(&self, text: &str) -> f64;
}

/// Decides whether accumulated entities clear the bar required to stop
/// escalating, and what that bar is for a given tier.
pub trait ThresholdGate: Send + Sync {
    /// Entity kinds the pipeline must find at least one confident instance
    /// of before it can stop escalating.
    fn required_kinds(&self) -> &[EntityKind];

    /// Weighted minimum confidence a required entity kind must clear when
    /// the gate is consulted after `tier`. Later tiers may carry a lower
    /// bar: they represent more expensive, higher-effort evidence.
    fn weighted_min_confidence(&self, tier: Tier) -> f64;

    /// Per-kind override of `weighted_min_confidence`. Defaults to the
    /// tier-wide value; a gate backed by a configured threshold table
    /// overrides this to answer per entity kind instead.
    fn weighted_min_confidence_for_kind(&self, _kind: EntityKind, tier: Tier) -> f64 {
        self.weighted_min_confidence(tier)
    }

    /// True if `entities` (the full accumulated set, not just the latest
    /// tier's output) satisfies every required kind once the escalation has
    /// just completed `current_tier`.
    ///
    /// For each required kind this takes the best confidence seen across
    /// every entity of that kind accumulated so far, regardless of which
    /// tier produced it, and compares that single value against the
    /// threshold for `current_tier`. A low-confidence tier 1 hit does not
    /// get stuck comparing against tier 1's (stricter) bar forever: once
    /// tier 2 runs, the same entity is re-measured against tier 2's bar.
    fn meets_threshold(&self, entities: &[ClinicalEntity], current_tier: Tier) -> bool {
        self.required_kinds().iter().all(|kind| {
            let best_confidence = entities
                .iter()
                .filter(|e| e.kind == *kind)
                .map(|e| e.confidence)
                .fold(0.0_f64, f64::max);
            best_confidence >= self.weighted_min_confidence_for_kind(*kind, current_tier)
        })
    }
}

/// Resolves a free-text term against a fixed ontology.
///
/// Implementations never fail: an unresolvable term falls back to a
/// text-only `CodedConcept` rather than an error.
pub trait TerminologyCoder: Send + Sync {
    fn code(&self, intent: OntologyIntent, term: &str) -> CodedConcept;
}

/// Builds one FHIR resource kind from coded clinical entities.
///
/// One factory instance exists per resource kind in the registry.
pub trait ResourceFactory: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Build a resource from `entities`. `subject` is the patient (or other
    /// principal) reference every clinical resource attaches to.
    /// `allocate_reference` mints a fresh internal reference of the given
    /// kind for any resource this factory needs to create as a side effect
    /// (e.g. a `MedicationRequest` factory minting a `Medication` entry).
    fn build(
        &self,
        entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload>;
}

#[cfg(test)]
mod tests {
    use nlforge_contracts::entity::Span;

    use super::*;

    struct FixedGate;

    impl ThresholdGate for FixedGate {
        fn required_kinds(&self) -> &[EntityKind] {
            &[EntityKind::Medication]
        }

        fn weighted_min_confidence(&self, tier: Tier) -> f64 {
            match tier {
                Tier::Tier1Pattern => 0.85,
                Tier::Tier2Tagger => 0.75,
                Tier::Tier3Regex => 0.70,
                Tier::Tier4External => 0.0,
            }
        }
    }

    fn medication(confidence: f64, provenance: Tier) -> ClinicalEntity {
        ClinicalEntity::new(EntityKind::Medication, Span { start: 0, end: 4 }, "drug", confidence, provenance)
    }

    /// A tier 1 hit that missed tier 1's bar must still clear once the
    /// escalation reaches a later, laxer tier: the comparison is against
    /// the tier that just ran, not the tier that produced the entity.
    #[test]
    fn low_confidence_entity_clears_once_a_later_tier_runs() {
        let gate = FixedGate;
        let entities = vec![medication(0.78, Tier::Tier1Pattern)];

        assert!(!gate.meets_threshold(&entities, Tier::Tier1Pattern));
        assert!(gate.meets_threshold(&entities, Tier::Tier2Tagger));
    }

    /// When the same kind has been seen at several confidences across
    /// tiers, the gate compares the best of them, not the most recent.
    #[test]
    fn best_confidence_across_tiers_is_used() {
        let gate = FixedGate;
        let entities = vec![medication(0.60, Tier::Tier1Pattern), medication(0.90, Tier::Tier2Tagger)];

        assert!(gate.meets_threshold(&entities, Tier::Tier1Pattern));
    }
}
