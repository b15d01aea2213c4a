//! Clinical entities extracted from free text.
//!
//! Entities are created by the extractor tiers and are immutable thereafter:
//! downstream components read them but never mutate them in place.

use serde::{Deserialize, Serialize};

/// The kind of clinical concept an extracted span represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
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

/// Which extraction tier produced an entity.
///
/// Tiers 1 and 3 are deterministic; tiers 2 and 4 may not be, which is why
/// every entity carries its producing tier for downstream evidence weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Tier1Pattern,
    Tier2Tagger,
    Tier3Regex,
    Tier4External,
}

impl Tier {
    /// 1-based ordinal matching the tier numbering in the component design.
    pub fn ordinal(self) -> u8 {
        match self {
            Tier::Tier1Pattern => 1,
            Tier::Tier2Tagger => 2,
            Tier::Tier3Regex => 3,
            Tier::Tier4External => 4,
        }
    }
}

/// A byte-offset span into the source text.
///
/// Never logged or placed in an audit event: only used internally (e.g. to
/// re-derive a normalized surface form or to explain a safety finding to the
/// caller who already holds the original text).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A single clinical concept extracted from text.
///
/// Created by an extractor tier and never mutated afterward; later tiers add
/// new entities, they do not overwrite earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalEntity {
    pub kind: EntityKind,
    pub raw_span: Span,
    pub normalized: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub provenance: Tier,
}

impl ClinicalEntity {
    pub fn new(
        kind: EntityKind,
        raw_span: Span,
        normalized: impl Into<String>,
        confidence: f64,
        provenance: Tier,
    ) -> Self {
        Self {
            kind,
            raw_span,
            normalized: normalized.into(),
            confidence: confidence.clamp(0.0, 1.0),
            provenance,
        }
    }
}
