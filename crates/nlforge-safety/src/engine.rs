//! The cross-resource safety layer.
//!
//! `SafetyEngine::evaluate` is a pure function of (entries, reference
//! tables, as-of date): given the same bundle entry set and the same
//! tables it always produces the same findings.

use chrono::{DateTime, NaiveDate, Utc};

use nlforge_contracts::{
    reference::{Reference, ReferenceValue},
    resource::ResourcePayload,
    safety::{SafetyFinding, SafetyFindingKind, SafetySeverity},
};

use crate::tables::{ContraindicationSeverity, InteractionSeverity, Population, PregnancySeverity, SafetyTables};

/// SNOMED CT code for "patient currently pregnant (finding)".
const PREGNANCY_CONDITION_CODE: &str = "77386006";

/// LOINC code for "body weight", the observation dose-range narrowing
/// reads from. A bundle with no such observation leaves dosing checked on
/// age alone.
const BODY_WEIGHT_OBSERVATION_CODE: &str = "29463-7";

struct MedicationEntry {
    reference: Reference,
    code: Option<String>,
    dose: Option<(f64, String)>,
}

struct AllergyEntry {
    reference: Reference,
    code: Option<String>,
}

pub struct SafetyEngine {
    tables: SafetyTables,
}

impl SafetyEngine {
    pub fn new(tables: SafetyTables) -> Self {
        Self { tables }
    }

    /// Run every required cross-resource check over `entries` for `subject`.
    pub fn evaluate(&self, entries: &[ResourcePayload], subject: &Reference, as_of: DateTime<Utc>) -> Vec<SafetyFinding> {
        let medications = self.medication_entries(entries, subject);
        let allergies = self.allergy_entries(entries, subject);
        let age_years = self.subject_age_years(entries, subject, as_of);
        let weight_kg = self.subject_weight_kg(entries, subject);
        let pregnant = self.subject_is_pregnant(entries, subject);

        let mut findings = Vec::new();
        findings.extend(self.check_allergy_vs_medication(&medications, &allergies));
        findings.extend(self.check_drug_interactions(&medications));
        findings.extend(self.check_dose_range(&medications, age_years, weight_kg));
        if let Some(age) = age_years {
            findings.extend(self.check_age_contraindications(&medications, age));
        }
        if pregnant {
            findings.extend(self.check_pregnancy(&medications));
        }
        findings
    }

    fn medication_entries(&self, entries: &[ResourcePayload], subject: &Reference) -> Vec<MedicationEntry> {
        entries
            .iter()
            .filter_map(|entry| {
                let (subject_ref, coded, dose): (&ReferenceValue, _, Option<(f64, String)>) = match entry {
                    ResourcePayload::MedicationRequest(r) => (
                        &r.subject,
                        &r.medication_codeable_concept,
                        r.dosage_instruction
                            .first()
                            .and_then(|d| d.dose_quantity.as_ref())
                            .map(|q| (q.value, q.unit.clone())),
                    ),
                    ResourcePayload::MedicationAdministration(r) => {
                        (&r.subject, &r.medication_codeable_concept, None)
                    }
                    ResourcePayload::MedicationDispense(r) => (
                        &r.subject,
                        &r.medication_codeable_concept,
                        r.quantity.as_ref().map(|q| (q.value, q.unit.clone())),
                    ),
                    ResourcePayload::MedicationStatement(r) => (&r.subject, &r.medication_codeable_concept, None),
                    _ => return None,
                };
                if !references_subject(subject_ref, subject) {
                    return None;
                }
                Some(MedicationEntry {
                    reference: Reference::new(entry.kind(), entry.id().to_string()),
                    code: coded.primary_code().map(|c| c.to_string()),
                    dose,
                })
            })
            .collect()
    }

    fn allergy_entries(&self, entries: &[ResourcePayload], subject: &Reference) -> Vec<AllergyEntry> {
        entries
            .iter()
            .filter_map(|entry| match entry {
                ResourcePayload::AllergyIntolerance(r) if references_subject(&r.patient, subject) => Some(AllergyEntry {
                    reference: Reference::new(entry.kind(), entry.id().to_string()),
                    code: r.code.primary_code().map(|c| c.to_string()),
                }),
                _ => None,
            })
            .collect()
    }

    fn subject_age_years(&self, entries: &[ResourcePayload], subject: &Reference, as_of: DateTime<Utc>) -> Option<f64> {
        entries.iter().find_map(|entry| match entry {
            ResourcePayload::Patient(p) if p.id == subject.id => {
                let birth_date = p.birth_date.as_deref()?;
                let birth = NaiveDate::parse_from_str(birth_date, "%Y-%m-%d").ok()?;
                let today = as_of.date_naive();
                let days = (today - birth).num_days();
                if days < 0 {
                    None
                } else {
                    Some(days as f64 / 365.25)
                }
            }
            _ => None,
        })
    }

    /// The subject's recorded body weight in kilograms, if a body-weight
    /// observation for them is present in the bundle. A `lb`/`lbs` unit is
    /// converted; any other unit is treated as already being kilograms.
    fn subject_weight_kg(&self, entries: &[ResourcePayload], subject: &Reference) -> Option<f64> {
        entries.iter().find_map(|entry| match entry {
            ResourcePayload::Observation(o)
                if references_subject(&o.subject, subject) && o.code.primary_code() == Some(BODY_WEIGHT_OBSERVATION_CODE) =>
            {
                let quantity = o.value_quantity.as_ref()?;
                match quantity.unit.to_lowercase().as_str() {
                    "lb" | "lbs" | "[lb_av]" => Some(quantity.value * 0.453_592),
                    _ => Some(quantity.value),
                }
            }
            _ => None,
        })
    }

    fn subject_is_pregnant(&self, entries: &[ResourcePayload], subject: &Reference) -> bool {
        entries.iter().any(|entry| match entry {
            ResourcePayload::Condition(c) => {
                references_subject(&c.subject, subject) && c.code.primary_code() == Some(PREGNANCY_CONDITION_CODE)
            }
            _ => false,
        })
    }

    /// Check 1: allergy vs medication.
    fn check_allergy_vs_medication(&self, medications: &[MedicationEntry], allergies: &[AllergyEntry]) -> Vec<SafetyFinding> {
        let mut findings = Vec::new();
        for med in medications {
            let Some(med_code) = &med.code else { continue };
            for allergy in allergies {
                let Some(allergy_code) = &allergy.code else { continue };
                if med_code == allergy_code {
                    findings.push(SafetyFinding {
                        kind: SafetyFindingKind::AllergyContraindication,
                        severity: SafetySeverity::Absolute,
                        involved: vec![med.reference.clone(), allergy.reference.clone()],
                        explanation: format!(
                            "medication {} matches a recorded allergy to the same substance",
                            med_code
                        ),
                    });
                } else if self.tables.share_drug_class(med_code, allergy_code) {
                    findings.push(SafetyFinding {
                        kind: SafetyFindingKind::AllergyContraindication,
                        severity: SafetySeverity::Relative,
                        involved: vec![med.reference.clone(), allergy.reference.clone()],
                        explanation: format!(
                            "medication {} shares a drug class with a recorded allergy to {}",
                            med_code, allergy_code
                        ),
                    });
                }
            }
        }
        findings
    }

    /// Check 2: drug-drug interaction, including the duplicate-therapy
    /// boundary case (same code twice is a warning, never an interaction).
    fn check_drug_interactions(&self, medications: &[MedicationEntry]) -> Vec<SafetyFinding> {
        let mut findings = Vec::new();
        for i in 0..medications.len() {
            for j in (i + 1)..medications.len() {
                let (a, b) = (&medications[i], &medications[j]);
                let (Some(code_a), Some(code_b)) = (&a.code, &b.code) else { continue };

                if code_a == code_b {
                    findings.push(SafetyFinding {
                        kind: SafetyFindingKind::DuplicateTherapy,
                        severity: SafetySeverity::Caution,
                        involved: vec![a.reference.clone(), b.reference.clone()],
                        explanation: format!("two entries prescribe the same medication ({})", code_a),
                    });
                    continue;
                }

                if let Some(row) = self.tables.interaction_for(code_a, code_b) {
                    let severity = match row.severity {
                        InteractionSeverity::Contraindicated => SafetySeverity::Absolute,
                        InteractionSeverity::Major => SafetySeverity::Relative,
                        InteractionSeverity::Moderate => SafetySeverity::Caution,
                        InteractionSeverity::Minor => SafetySeverity::Informational,
                    };
                    findings.push(SafetyFinding {
                        kind: SafetyFindingKind::DrugInteraction,
                        severity,
                        involved: vec![a.reference.clone(), b.reference.clone()],
                        explanation: row.mechanism.clone(),
                    });
                }
            }
        }
        findings
    }

    /// Check 3: dose-range, flagging under- and overdose. Age picks the
    /// pediatric or adult band; a recorded body weight narrows it further
    /// wherever the table names a per-kilogram bound.
    fn check_dose_range(
        &self,
        medications: &[MedicationEntry],
        age_years: Option<f64>,
        weight_kg: Option<f64>,
    ) -> Vec<SafetyFinding> {
        let mut findings = Vec::new();
        for med in medications {
            let Some(code) = &med.code else { continue };
            let Some((value, _unit)) = &med.dose else { continue };
            let Some(row) = self.tables.dose_range_for(code) else { continue };
            let (min, max) = row.band_for(age_years, weight_kg);

            if *value < min {
                findings.push(SafetyFinding {
                    kind: SafetyFindingKind::DoseOutOfRange,
                    severity: SafetySeverity::Caution,
                    involved: vec![med.reference.clone()],
                    explanation: format!("dose {} {} is below the minimum recommended {} {}", value, row.unit, min, row.unit),
                });
            } else if *value > max {
                let multiple = value / max;
                let severity = if multiple >= 3.0 {
                    SafetySeverity::Absolute
                } else if multiple >= 2.0 {
                    SafetySeverity::Relative
                } else {
                    SafetySeverity::Caution
                };
                findings.push(SafetyFinding {
                    kind: SafetyFindingKind::DoseOutOfRange,
                    severity,
                    involved: vec![med.reference.clone()],
                    explanation: format!(
                        "dose {} {} exceeds the maximum recommended {} {} ({:.1}x)",
                        value, row.unit, max, row.unit, multiple
                    ),
                });
            }
        }
        findings
    }

    /// Check 4: age-specific (pediatric/geriatric) contraindications.
    fn check_age_contraindications(&self, medications: &[MedicationEntry], age_years: f64) -> Vec<SafetyFinding> {
        let mut findings = Vec::new();
        for med in medications {
            let Some(code) = &med.code else { continue };
            for row in self.tables.contraindications_for(code, age_years) {
                let (kind, severity) = match row.population {
                    Population::Pediatric => (
                        SafetyFindingKind::PediatricContraindication,
                        contraindication_severity(row.severity),
                    ),
                    Population::Geriatric => (
                        SafetyFindingKind::GeriatricCaution,
                        contraindication_severity(row.severity),
                    ),
                };
                findings.push(SafetyFinding {
                    kind,
                    severity,
                    involved: vec![med.reference.clone()],
                    explanation: row.explanation.clone(),
                });
            }
        }
        findings
    }

    /// Check 5: pregnancy contraindication.
    fn check_pregnancy(&self, medications: &[MedicationEntry]) -> Vec<SafetyFinding> {
        let mut findings = Vec::new();
        for med in medications {
            let Some(code) = &med.code else { continue };
            if let Some(row) = self.tables.pregnancy_category_for(code) {
                let severity = match row.severity {
                    PregnancySeverity::Absolute => SafetySeverity::Absolute,
                    PregnancySeverity::Relative => SafetySeverity::Relative,
                    PregnancySeverity::Caution => SafetySeverity::Caution,
                };
                findings.push(SafetyFinding {
                    kind: SafetyFindingKind::PregnancyContraindication,
                    severity,
                    involved: vec![med.reference.clone()],
                    explanation: row.explanation.clone(),
                });
            }
        }
        findings
    }
}

fn contraindication_severity(severity: ContraindicationSeverity) -> SafetySeverity {
    match severity {
        ContraindicationSeverity::Absolute => SafetySeverity::Absolute,
        ContraindicationSeverity::Relative => SafetySeverity::Relative,
        ContraindicationSeverity::Caution => SafetySeverity::Caution,
    }
}

fn references_subject(rv: &ReferenceValue, subject: &Reference) -> bool {
    rv.reference == subject.to_short_form()
}
