//! Ontology tables: one entry list per intent, loaded once from the
//! embedded TOML and kept read-only for the lifetime of the process, per
//! the shared-resource rule that terminology tables never mutate after
//! construction.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use nlforge_contracts::coding::OntologyIntent;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyEntry {
    pub code: String,
    pub canonical: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawTables {
    #[serde(default)]
    drug: Vec<OntologyEntry>,
    #[serde(default)]
    condition: Vec<OntologyEntry>,
    #[serde(default)]
    lab: Vec<OntologyEntry>,
    #[serde(default)]
    vaccine: Vec<OntologyEntry>,
    #[serde(default)]
    unit: Vec<OntologyEntry>,
}

pub struct OntologyTables {
    raw: RawTables,
}

const EMBEDDED_TERMINOLOGY_TOML: &str = include_str!("../../data/terminology.toml");

impl OntologyTables {
    fn load() -> Self {
        let raw: RawTables =
            toml::from_str(EMBEDDED_TERMINOLOGY_TOML).expect("embedded terminology.toml is well-formed");
        Self { raw }
    }

    /// The process-wide table set. Loaded once, on first access.
    pub fn shared() -> &'static OntologyTables {
        static TABLES: OnceLock<OntologyTables> = OnceLock::new();
        TABLES.get_or_init(OntologyTables::load)
    }

    /// Entries available for `intent`. Intents with no dedicated table
    /// (procedure, facility-type, relationship, allergen, anatomy) fall
    /// back to the clinical/condition table, which is the closest general
    /// SNOMED-coded vocabulary this reference runtime carries.
    pub fn entries_for(&self, intent: OntologyIntent) -> &[OntologyEntry] {
        use OntologyIntent::*;
        match intent {
            Drug | Allergen => &self.raw.drug,
            Condition | Procedure | FacilityType | Relationship | Anatomy => &self.raw.condition,
            Lab => &self.raw.lab,
            Vaccine => &self.raw.vaccine,
            Unit => &self.raw.unit,
        }
    }
}
