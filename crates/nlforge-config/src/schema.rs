//! Pipeline configuration schema.
//!
//! A `PipelineConfig` is deserialized from TOML and carries every tunable
//! named in the component design: extraction budget, tier confidence
//! thresholds, validator connectivity, and concurrency limits.

use serde::{Deserialize, Serialize};

use nlforge_contracts::entity::{EntityKind, Tier};

/// Per-tier weighted minimum confidence for one required entity kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierThreshold {
    pub tier: TierName,
    pub weighted_min_confidence: f64,
}

/// TOML-friendly mirror of `nlforge_contracts::entity::Tier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TierName {
    Tier1Pattern,
    Tier2Tagger,
    Tier3Regex,
    Tier4External,
}

impl From<TierName> for Tier {
    fn from(name: TierName) -> Self {
        match name {
            TierName::Tier1Pattern => Tier::Tier1Pattern,
            TierName::Tier2Tagger => Tier::Tier2Tagger,
            TierName::Tier3Regex => Tier::Tier3Regex,
            TierName::Tier4External => Tier::Tier4External,
        }
    }
}

/// TOML-friendly mirror of `nlforge_contracts::entity::EntityKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKindName {
    Medication,
    Dosage,
    Frequency,
    Route,
    Condition,
    LabTest,
    Procedure,
    Observation,
    VitalSign,
    Device,
    AllergySubstance,
    Person,
    Vaccine,
}

impl From<EntityKindName> for EntityKind {
    fn from(name: EntityKindName) -> Self {
        match name {
            EntityKindName::Medication => EntityKind::Medication,
            EntityKindName::Dosage => EntityKind::Dosage,
            EntityKindName::Frequency => EntityKind::Frequency,
            EntityKindName::Route => EntityKind::Route,
            EntityKindName::Condition => EntityKind::Condition,
            EntityKindName::LabTest => EntityKind::LabTest,
            EntityKindName::Procedure => EntityKind::Procedure,
            EntityKindName::Observation => EntityKind::Observation,
            EntityKindName::VitalSign => EntityKind::VitalSign,
            EntityKindName::Device => EntityKind::Device,
            EntityKindName::AllergySubstance => EntityKind::AllergySubstance,
            EntityKindName::Person => EntityKind::Person,
            EntityKindName::Vaccine => EntityKind::Vaccine,
        }
    }
}

/// Per-entity-kind threshold table, keyed by the kind it gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredEntity {
    pub kind: EntityKindName,
    pub thresholds: Vec<TierThreshold>,
}

/// The top-level structure deserialized from a TOML pipeline configuration
/// file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Whether tier 4 (the external probabilistic model) may be invoked at
    /// all. When false, escalation stops after tier 3 regardless of cost
    /// budget remaining.
    #[serde(default = "default_tier4_enabled")]
    pub tier4_enabled: bool,

    /// Maximum order-text length, in characters, the extractor will accept
    /// before refusing with `InputTooLarge`.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Maximum cumulative extraction cost allowed for a single request.
    pub per_request_cost_ceiling: f64,

    /// Wall-clock budget for a single request, in milliseconds.
    pub per_request_timeout_ms: u64,

    /// Base URL of the external FHIR schema validator.
    pub external_validator_url: String,

    /// When true, a validator outage degrades to the local structural
    /// fallback instead of failing the request.
    #[serde(default)]
    pub tolerant_mode: bool,

    /// Maximum number of requests the pipeline will process concurrently
    /// before rejecting with a back-pressure error.
    pub max_concurrent_requests: usize,

    /// Capacity of each terminology ontology's LRU cache shard.
    pub cache_capacity: usize,

    /// Weighted minimum confidence per required entity kind per tier.
    #[serde(default)]
    pub tier_thresholds: Vec<RequiredEntity>,
}

fn default_tier4_enabled() -> bool {
    true
}

fn default_max_input_chars() -> usize {
    20_000
}

impl PipelineConfig {
    /// Look up the weighted minimum confidence configured for `kind` at
    /// `tier`. Returns `None` if the kind is not a required kind under this
    /// configuration, or if no threshold row names that tier.
    pub fn threshold_for(&self, kind: EntityKind, tier: Tier) -> Option<f64> {
        self.tier_thresholds
            .iter()
            .find(|row| EntityKind::from(row.kind) == kind)
            .and_then(|row| {
                row.thresholds
                    .iter()
                    .find(|t| Tier::from(t.tier) == tier)
                    .map(|t| t.weighted_min_confidence)
            })
    }

    /// The full set of required entity kinds named by this configuration.
    pub fn required_kinds(&self) -> Vec<EntityKind> {
        self.tier_thresholds
            .iter()
            .map(|row| EntityKind::from(row.kind))
            .collect()
    }
}
