//! The escalation gate: per-tier confidence thresholds and per-kind
//! evidence weights.
//!
//! `nlforge_core::traits::ThresholdGate` compares the best confidence seen
//! for a required kind against a single per-tier threshold. The
//! weighted-minimum formula in the component design folds the per-kind
//! weight into that comparison by scaling confidence at extraction time
//! (see `weighted_confidence` below) rather than by re-deriving a second
//! threshold axis the trait has no room for. A deployment may additionally
//! narrow that per-tier bar down to a specific kind via
//! `PipelineConfig::tier_thresholds`; `ClinicalThresholdGate` consults that
//! table first and only falls back to the built-in per-tier defaults when
//! it names nothing for the kind in question.

use nlforge_config::RequiredEntity;
use nlforge_contracts::entity::{EntityKind, Tier};
use nlforge_core::traits::ThresholdGate;

/// Required-kind evidence weight. Kinds outside the named table (e.g.
/// `VitalSign`, `Observation`) carry a neutral weight of `1.0`.
pub fn kind_weight(kind: EntityKind) -> f64 {
    match kind {
        EntityKind::Medication => 1.0,
        EntityKind::Dosage => 0.9,
        EntityKind::Frequency => 0.7,
        EntityKind::Route => 0.5,
        EntityKind::Condition => 0.6,
        _ => 1.0,
    }
}

/// Scales a raw detection confidence by its kind's evidence weight, so the
/// single-threshold comparison `ThresholdGate::meets_threshold` performs
/// already reflects the weighted-minimum formula.
pub fn weighted_confidence(kind: EntityKind, raw_confidence: f64) -> f64 {
    (raw_confidence * kind_weight(kind)).clamp(0.0, 1.0)
}

/// The gate used for every extraction run. `required_kinds` is fixed per
/// request by the pipeline's intent detection (a prescription order
/// requires different evidence than a vitals observation). `overrides`
/// carries the operator-configured per-kind threshold table, if any; an
/// empty table means every kind falls back to the built-in per-tier
/// defaults.
pub struct ClinicalThresholdGate {
    required_kinds: Vec<EntityKind>,
    overrides: Vec<RequiredEntity>,
}

impl ClinicalThresholdGate {
    pub fn new(required_kinds: Vec<EntityKind>) -> Self {
        Self { required_kinds, overrides: Vec::new() }
    }

    /// Builds a gate whose per-kind thresholds are drawn from a deployment's
    /// `tier_thresholds` configuration, falling back to the built-in
    /// defaults for any kind/tier pair the table leaves unspecified.
    pub fn with_overrides(required_kinds: Vec<EntityKind>, overrides: Vec<RequiredEntity>) -> Self {
        Self { required_kinds, overrides }
    }

    fn default_weighted_min_confidence(tier: Tier) -> f64 {
        match tier {
            Tier::Tier1Pattern => 0.85,
            Tier::Tier2Tagger => 0.75,
            Tier::Tier3Regex => 0.70,
            Tier::Tier4External => 0.0,
        }
    }
}

impl ThresholdGate for ClinicalThresholdGate {
    fn required_kinds(&self) -> &[EntityKind] {
        &self.required_kinds
    }

    fn weighted_min_confidence(&self, tier: Tier) -> f64 {
        Self::default_weighted_min_confidence(tier)
    }

    fn weighted_min_confidence_for_kind(&self, kind: EntityKind, tier: Tier) -> f64 {
        self.overrides
            .iter()
            .find(|row| EntityKind::from(row.kind) == kind)
            .and_then(|row| row.thresholds.iter().find(|t| Tier::from(t.tier) == tier).map(|t| t.weighted_min_confidence))
            .unwrap_or_else(|| self.weighted_min_confidence(tier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medication_carries_full_weight() {
        assert_eq!(kind_weight(EntityKind::Medication), 1.0);
    }

    #[test]
    fn weighted_confidence_is_clamped() {
        assert_eq!(weighted_confidence(EntityKind::Medication, 1.2), 1.0);
    }

    #[test]
    fn unconfigured_kind_falls_back_to_the_builtin_tier_default() {
        let gate = ClinicalThresholdGate::new(vec![EntityKind::Medication]);
        assert_eq!(gate.weighted_min_confidence_for_kind(EntityKind::Medication, Tier::Tier2Tagger), 0.75);
    }

    #[test]
    fn configured_kind_overrides_the_builtin_default() {
        use nlforge_config::TierThreshold;

        let gate = ClinicalThresholdGate::with_overrides(
            vec![EntityKind::Medication],
            vec![RequiredEntity {
                kind: nlforge_config::EntityKindName::Medication,
                thresholds: vec![TierThreshold { tier: nlforge_config::TierName::Tier2Tagger, weighted_min_confidence: 0.5 }],
            }],
        );

        assert_eq!(gate.weighted_min_confidence_for_kind(EntityKind::Medication, Tier::Tier2Tagger), 0.5);
        // A tier this config doesn't name still falls back to the default.
        assert_eq!(gate.weighted_min_confidence_for_kind(EntityKind::Medication, Tier::Tier1Pattern), 0.85);
    }
}
