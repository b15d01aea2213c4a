//! Cross-resource safety findings produced during bundle assembly.

use serde::{Deserialize, Serialize};

use crate::reference::Reference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SafetyFindingKind {
    AllergyContraindication,
    DrugInteraction,
    DoseOutOfRange,
    PediatricContraindication,
    GeriatricCaution,
    PregnancyContraindication,
    /// Not in the spec's named finding-kind list but required by the
    /// "two medications identical by code" boundary behaviour: a same-drug
    /// duplicate is a warning, never an interaction.
    DuplicateTherapy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetySeverity {
    Informational,
    Caution,
    Relative,
    Absolute,
}

/// A cross-resource check result, attached to the validation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyFinding {
    pub kind: SafetyFindingKind,
    pub severity: SafetySeverity,
    pub involved: Vec<Reference>,
    pub explanation: String,
}
