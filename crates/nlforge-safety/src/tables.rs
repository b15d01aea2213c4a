//! Interaction, contraindication, dose-range, and pregnancy-category
//! reference tables.
//!
//! The safety layer is a pure function of (entries, this reference data).
//! Tables are data, not code: they ship as a TOML file embedded in the
//! binary at compile time and are immutable for the lifetime of the
//! process.

use serde::{Deserialize, Serialize};

use nlforge_contracts::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugClass {
    pub class_code: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionSeverity {
    Contraindicated,
    Major,
    Moderate,
    Minor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRow {
    pub drug_a: String,
    pub drug_b: String,
    pub severity: InteractionSeverity,
    pub mechanism: String,
}

impl InteractionRow {
    fn matches(&self, a: &str, b: &str) -> bool {
        (self.drug_a == a && self.drug_b == b) || (self.drug_a == b && self.drug_b == a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Population {
    Pediatric,
    Geriatric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContraindicationSeverity {
    Absolute,
    Relative,
    Caution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContraindicationRow {
    pub drug: String,
    pub population: Population,
    #[serde(default)]
    pub min_age_years: Option<f64>,
    #[serde(default)]
    pub max_age_years: Option<f64>,
    pub severity: ContraindicationSeverity,
    pub explanation: String,
}

impl ContraindicationRow {
    fn applies_to_age(&self, age_years: f64) -> bool {
        let above_min = self.min_age_years.map_or(true, |min| age_years >= min);
        let below_max = self.max_age_years.map_or(true, |max| age_years <= max);
        above_min && below_max
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseRangeRow {
    pub drug: String,
    pub unit: String,
    pub adult_min: f64,
    pub adult_max: f64,
    #[serde(default)]
    pub pediatric_max_age_years: Option<f64>,
    #[serde(default)]
    pub pediatric_max: Option<f64>,
    /// Per-kilogram floor, in `unit` per kilogram of body weight. Narrows
    /// the age-derived band upward when the subject's weight is known.
    #[serde(default)]
    pub mg_per_kg_min: Option<f64>,
    /// Per-kilogram ceiling, in `unit` per kilogram of body weight. Narrows
    /// the age-derived band downward when the subject's weight is known.
    #[serde(default)]
    pub mg_per_kg_max: Option<f64>,
}

impl DoseRangeRow {
    /// The applicable (min, max) band for a subject of `age_years` and
    /// `weight_kg`, either of which may be unknown. Age picks the pediatric
    /// or adult band; weight then narrows that band further wherever a
    /// per-kilogram bound is configured and tighter than the age-derived
    /// one. Falls back to the adult band when both are unknown.
    pub fn band_for(&self, age_years: Option<f64>, weight_kg: Option<f64>) -> (f64, f64) {
        let (age_min, age_max) = match (age_years, self.pediatric_max_age_years, self.pediatric_max) {
            (Some(age), Some(cutoff), Some(ped_max)) if age < cutoff => (0.0, ped_max),
            _ => (self.adult_min, self.adult_max),
        };

        let Some(weight) = weight_kg else {
            return (age_min, age_max);
        };

        let min = self.mg_per_kg_min.map_or(age_min, |per_kg| age_min.max(per_kg * weight));
        let max = self.mg_per_kg_max.map_or(age_max, |per_kg| age_max.min(per_kg * weight));
        (min, max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PregnancySeverity {
    Absolute,
    Relative,
    Caution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PregnancyCategoryRow {
    pub drug: String,
    pub category: String,
    pub severity: PregnancySeverity,
    pub explanation: String,
}

/// The full set of reference tables the safety layer consults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SafetyTables {
    #[serde(default)]
    pub drug_classes: Vec<DrugClass>,
    #[serde(default)]
    pub interactions: Vec<InteractionRow>,
    #[serde(default)]
    pub contraindications: Vec<ContraindicationRow>,
    #[serde(default)]
    pub dose_ranges: Vec<DoseRangeRow>,
    #[serde(default)]
    pub pregnancy_categories: Vec<PregnancyCategoryRow>,
}

const EMBEDDED_TABLES_TOML: &str = include_str!("../data/tables.toml");

impl SafetyTables {
    /// Load the tables shipped with the crate.
    pub fn embedded() -> PipelineResult<Self> {
        Self::from_toml_str(EMBEDDED_TABLES_TOML)
    }

    pub fn from_toml_str(s: &str) -> PipelineResult<Self> {
        toml::from_str(s).map_err(|e| PipelineError::ConfigError {
            reason: format!("failed to parse safety tables TOML: {}", e),
        })
    }

    /// True if `code_a` and `code_b` share a drug class (and are not the
    /// same code: identical codes are duplicate therapy, not a class
    /// cross-reaction).
    pub fn share_drug_class(&self, code_a: &str, code_b: &str) -> bool {
        if code_a == code_b {
            return false;
        }
        self.drug_classes
            .iter()
            .any(|c| c.members.iter().any(|m| m == code_a) && c.members.iter().any(|m| m == code_b))
    }

    pub fn interaction_for(&self, code_a: &str, code_b: &str) -> Option<&InteractionRow> {
        self.interactions.iter().find(|row| row.matches(code_a, code_b))
    }

    pub fn contraindications_for(&self, code: &str, age_years: f64) -> Vec<&ContraindicationRow> {
        self.contraindications
            .iter()
            .filter(|row| row.drug == code && row.applies_to_age(age_years))
            .collect()
    }

    pub fn dose_range_for(&self, code: &str) -> Option<&DoseRangeRow> {
        self.dose_ranges.iter().find(|row| row.drug == code)
    }

    pub fn pregnancy_category_for(&self, code: &str) -> Option<&PregnancyCategoryRow> {
        self.pregnancy_categories.iter().find(|row| row.drug == code)
    }
}
