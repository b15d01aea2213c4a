//! Tier 1: the deterministic clinical pattern matcher.
//!
//! Scans raw text against the medication/condition dictionaries (drawn from
//! the same ontology tables the terminology coder consults), plus a small
//! fixed rule set for dose-unit tokens, frequency abbreviations, and
//! vital-sign formats (`BP 120/80`, `HR 72`, `SpO2 97%`). Deterministic:
//! the same text always yields the same entities in the same order.

use nlforge_contracts::entity::{ClinicalEntity, EntityKind, Span, Tier};
use nlforge_contracts::error::PipelineResult;
use nlforge_contracts::tier_state::TierState;
use nlforge_core::traits::ExtractionTier;

use crate::extract::gate::weighted_confidence;
use crate::terminology::tables::OntologyTables;

use nlforge_contracts::coding::OntologyIntent;

const KNOWN_DOSE_UNITS: &[&str] = &["mg", "mcg", "g", "ml", "u", "units"];

fn tokens_with_spans(text: &str) -> Vec<(usize, usize, &str)> {
    let mut result = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                result.push((s, i, &text[s..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        result.push((s, text.len(), &text[s..text.len()]));
    }
    result
}

fn trim_punct(token: &str) -> &str {
    token.trim_matches(|c: char| c.is_ascii_punctuation() && c != '/')
}

fn push_dictionary_matches(text: &str, lower: &str, intent: OntologyIntent, kind: EntityKind, out: &mut Vec<ClinicalEntity>) {
    let tables = OntologyTables::shared();
    for entry in tables.entries_for(intent) {
        let mut candidates: Vec<&str> = vec![entry.canonical.as_str()];
        candidates.extend(entry.aliases.iter().map(|a| a.as_str()));
        for candidate in candidates {
            let needle = candidate.to_lowercase();
            if needle.is_empty() {
                continue;
            }
            if let Some(pos) = lower.find(&needle) {
                let end = pos + needle.len();
                out.push(ClinicalEntity::new(
                    kind,
                    Span { start: pos, end },
                    &text[pos..end],
                    weighted_confidence(kind, 0.97),
                    Tier::Tier1Pattern,
                ));
                break;
            }
        }
    }
}

fn try_parse_dose_token(token: &str) -> Option<(f64, String)> {
    let digits_end = token.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(token.len());
    if digits_end == 0 {
        return None;
    }
    let (num_part, unit_part) = token.split_at(digits_end);
    if unit_part.is_empty() {
        return None;
    }
    if !KNOWN_DOSE_UNITS.contains(&unit_part.to_lowercase().as_str()) {
        return None;
    }
    num_part.parse::<f64>().ok().map(|v| (v, unit_part.to_string()))
}

fn push_dosage_and_frequency(text: &str, out: &mut Vec<ClinicalEntity>) {
    let lower = text.to_lowercase();

    for phrase in ["three times daily", "twice daily", "once daily"] {
        if let Some(pos) = lower.find(phrase) {
            out.push(ClinicalEntity::new(
                EntityKind::Frequency,
                Span { start: pos, end: pos + phrase.len() },
                &text[pos..pos + phrase.len()],
                weighted_confidence(EntityKind::Frequency, 0.95),
                Tier::Tier1Pattern,
            ));
            return;
        }
    }
    if let Some(pos) = lower.find("daily") {
        out.push(ClinicalEntity::new(
            EntityKind::Frequency,
            Span { start: pos, end: pos + 5 },
            &text[pos..pos + 5],
            weighted_confidence(EntityKind::Frequency, 0.9),
            Tier::Tier1Pattern,
        ));
        return;
    }
    for (start, end, raw) in tokens_with_spans(text) {
        let trimmed = trim_punct(raw);
        let upper = trimmed.to_uppercase();
        if matches!(upper.as_str(), "BID" | "TID" | "QD" | "PRN") {
            out.push(ClinicalEntity::new(
                EntityKind::Frequency,
                Span { start, end },
                trimmed,
                weighted_confidence(EntityKind::Frequency, 0.95),
                Tier::Tier1Pattern,
            ));
            return;
        }
    }
}

fn push_dose_quantities(text: &str, out: &mut Vec<ClinicalEntity>) {
    for (start, end, raw) in tokens_with_spans(text) {
        let trimmed = trim_punct(raw);
        if let Some((_value, _unit)) = try_parse_dose_token(trimmed) {
            let offset = raw.find(trimmed).unwrap_or(0);
            out.push(ClinicalEntity::new(
                EntityKind::Dosage,
                Span { start: start + offset, end: start + offset + trimmed.len() },
                trimmed,
                weighted_confidence(EntityKind::Dosage, 0.97),
                Tier::Tier1Pattern,
            ));
        }
    }
}

fn push_vital_signs(text: &str, out: &mut Vec<ClinicalEntity>) {
    let tokens = tokens_with_spans(text);
    for i in 0..tokens.len() {
        let (start, end, raw) = tokens[i];
        let trimmed = trim_punct(raw);
        let upper = trimmed.to_uppercase();

        if upper == "BP" {
            if let Some((n_start, n_end, n_raw)) = tokens.get(i + 1).copied() {
                let n_trimmed = trim_punct(n_raw);
                if let Some((systolic, diastolic)) = n_trimmed.split_once('/') {
                    if systolic.parse::<f64>().is_ok() {
                        out.push(ClinicalEntity::new(
                            EntityKind::VitalSign,
                            Span { start: n_start, end: n_start + systolic.len() },
                            format!("systolic blood pressure {systolic}"),
                            weighted_confidence(EntityKind::VitalSign, 0.97),
                            Tier::Tier1Pattern,
                        ));
                    }
                    if diastolic.parse::<f64>().is_ok() {
                        out.push(ClinicalEntity::new(
                            EntityKind::VitalSign,
                            Span { start: n_end - diastolic.len(), end: n_end },
                            format!("diastolic blood pressure {diastolic}"),
                            weighted_confidence(EntityKind::VitalSign, 0.97),
                            Tier::Tier1Pattern,
                        ));
                    }
                }
            }
        } else if upper == "HR" {
            if let Some((n_start, n_end, n_raw)) = tokens.get(i + 1).copied() {
                let n_trimmed = trim_punct(n_raw);
                if n_trimmed.parse::<f64>().is_ok() {
                    out.push(ClinicalEntity::new(
                        EntityKind::VitalSign,
                        Span { start: n_start, end: n_end },
                        format!("heart rate {n_trimmed}"),
                        weighted_confidence(EntityKind::VitalSign, 0.97),
                        Tier::Tier1Pattern,
                    ));
                }
            }
        } else if upper == "SPO2" {
            if let Some((n_start, n_end, n_raw)) = tokens.get(i + 1).copied() {
                let n_trimmed = trim_punct(n_raw).trim_end_matches('%');
                if n_trimmed.parse::<f64>().is_ok() {
                    out.push(ClinicalEntity::new(
                        EntityKind::VitalSign,
                        Span { start: n_start, end: n_end },
                        format!("oxygen saturation {n_trimmed}"),
                        weighted_confidence(EntityKind::VitalSign, 0.97),
                        Tier::Tier1Pattern,
                    ));
                }
            }
        }
        let _ = (start, end);
    }
}

fn push_route(text: &str, lower: &str, out: &mut Vec<ClinicalEntity>) {
    if let Some(pos) = lower.find("infusion") {
        out.push(ClinicalEntity::new(
            EntityKind::Route,
            Span { start: pos, end: pos + "infusion".len() },
            "IV",
            weighted_confidence(EntityKind::Route, 0.9),
            Tier::Tier1Pattern,
        ));
        return;
    }
    for (word, normalized) in [("oral", "PO"), ("intravenous", "IV"), ("subcutaneous", "SC")] {
        if let Some(pos) = lower.find(word) {
            out.push(ClinicalEntity::new(
                EntityKind::Route,
                Span { start: pos, end: pos + word.len() },
                normalized,
                weighted_confidence(EntityKind::Route, 0.9),
                Tier::Tier1Pattern,
            ));
            return;
        }
    }
    let _ = text;
}

pub struct PatternMatcherTier;

impl ExtractionTier for PatternMatcherTier {
    fn tier(&self) -> Tier {
        Tier::Tier1Pattern
    }

    fn run(&self, text: &str, _state: &TierState) -> PipelineResult<Vec<ClinicalEntity>> {
        let lower = text.to_lowercase();
        let mut entities = Vec::new();
        push_dictionary_matches(text, &lower, OntologyIntent::Drug, EntityKind::Medication, &mut entities);
        push_dictionary_matches(text, &lower, OntologyIntent::Condition, EntityKind::Condition, &mut entities);
        push_dose_quantities(text, &mut entities);
        push_dosage_and_frequency(text, &mut entities);
        push_vital_signs(text, &mut entities);
        push_route(text, &lower, &mut entities);
        entities.sort_by_key(|e| e.raw_span.start);
        Ok(entities)
    }

    fn estimated_cost(&self, _text: &str) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> Vec<ClinicalEntity> {
        PatternMatcherTier.run(text, &TierState::new()).unwrap()
    }

    #[test]
    fn extracts_medication_dosage_frequency_and_condition() {
        let entities = run("Prescribe 10mg Lisinopril daily for hypertension");
        assert!(entities.iter().any(|e| e.kind == EntityKind::Medication && e.normalized.to_lowercase() == "lisinopril"));
        assert!(entities.iter().any(|e| e.kind == EntityKind::Dosage && e.normalized == "10mg"));
        assert!(entities.iter().any(|e| e.kind == EntityKind::Frequency));
        assert!(entities.iter().any(|e| e.kind == EntityKind::Condition && e.normalized.to_lowercase() == "hypertension"));
    }

    #[test]
    fn extracts_vital_signs_and_route() {
        let entities = run("BP 110/70, HR 68, SpO2 97% during morphine infusion");
        let vitals: Vec<_> = entities.iter().filter(|e| e.kind == EntityKind::VitalSign).collect();
        assert_eq!(vitals.len(), 4);
        assert!(entities.iter().any(|e| e.kind == EntityKind::Medication && e.normalized.to_lowercase() == "morphine"));
        assert!(entities.iter().any(|e| e.kind == EntityKind::Route && e.normalized == "IV"));
    }

    #[test]
    fn is_deterministic_across_repeated_runs() {
        let text = "Prescribe amoxicillin 500mg three times daily for infection";
        assert_eq!(run(text), run(text));
    }
}
