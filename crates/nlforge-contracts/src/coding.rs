//! Coded concepts and the fixed ontology system URIs.
//!
//! The terminology coder is the only producer of `CodedConcept`; every other
//! component treats coded concepts as opaque, already-resolved data.

use serde::{Deserialize, Serialize};

/// Selects which ontology the terminology coder searches for a given term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OntologyIntent {
    Drug,
    Lab,
    Condition,
    Procedure,
    Vaccine,
    Unit,
    FacilityType,
    Relationship,
    Allergen,
    Anatomy,
}

/// Fixed code-system URIs. One wire constant per ontology the coder consults.
pub mod system_uri {
    pub const DRUG: &str = "http://www.nlm.nih.gov/research/umls/rxnorm";
    pub const LAB: &str = "http://loinc.org";
    pub const CLINICAL: &str = "http://snomed.info/sct";
    pub const DIAGNOSIS: &str = "http://hl7.org/fhir/sid/icd-10";
    pub const VACCINE: &str = "http://hl7.org/fhir/sid/cvx";
    pub const UNIT: &str = "http://unitsofmeasure.org";
}

/// A single (system, code, display) triple on the wire `coding` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coding {
    pub system: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// A coded concept: zero or more codings plus an optional free-text fallback.
///
/// Invariant: at least one coding is present, or `text` is non-empty. The
/// terminology coder never fails to produce a `CodedConcept`: it falls back
/// to a text-only concept when no ontology match is found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodedConcept {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodedConcept {
    pub fn coded(coding: Coding) -> Self {
        Self {
            coding: vec![coding],
            text: None,
        }
    }

    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            coding: Vec::new(),
            text: Some(text.into()),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.coding.is_empty() || self.text.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// The primary (first) code, if any coding is present.
    pub fn primary_code(&self) -> Option<&str> {
        self.coding.first().map(|c| c.code.as_str())
    }
}
