//! Tiered entity extraction: the escalation gate and the four tiers
//! (`Tier1Pattern` through `Tier4External`) the executor drives in order.

pub mod gate;
pub mod tier1_patterns;
pub mod tier2_tagger;
pub mod tier3_regex;
pub mod tier4_external;

pub use gate::{kind_weight, weighted_confidence, ClinicalThresholdGate};
pub use tier1_patterns::PatternMatcherTier;
pub use tier2_tagger::{HeuristicCapitalizedTagger, SequenceTagger, SequenceTaggerTier};
pub use tier3_regex::RegexFallbackTier;
pub use tier4_external::{ExternalEntityModel, ExternalModelTier, StubExternalModel};

use nlforge_contracts::entity::EntityKind;

/// Which required entity kinds a request needs, inferred from a coarse
/// keyword scan of the order text. Two shapes cover every scenario this
/// runtime handles: a medication order, or a vitals observation.
pub fn detect_required_kinds(text: &str) -> Vec<EntityKind> {
    let lower = text.to_lowercase();
    let prescribing_verbs = ["prescribe", "administer", "dispense", "give"];
    if prescribing_verbs.iter().any(|v| lower.contains(v)) {
        return vec![
            EntityKind::Medication,
            EntityKind::Dosage,
            EntityKind::Frequency,
            EntityKind::Condition,
        ];
    }
    vec![EntityKind::VitalSign]
}
