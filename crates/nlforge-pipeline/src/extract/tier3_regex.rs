//! Tier 3: regex-family fallback patterns.
//!
//! Catches the shapes tier 1's literal scan does not attempt: numeric dose
//! ranges (`5-10mg`), interval frequencies (`q8h`, `q12h`), and route
//! abbreviations embedded mid-word (`IV push`, `PO bid`). Deterministic like
//! tier 1: the same regex set runs in the same order every time.

use std::sync::OnceLock;

use regex::Regex;

use nlforge_contracts::entity::{ClinicalEntity, EntityKind, Span, Tier};
use nlforge_contracts::error::PipelineResult;
use nlforge_contracts::tier_state::TierState;
use nlforge_core::traits::ExtractionTier;

use crate::extract::gate::weighted_confidence;

struct Patterns {
    dose_range: Regex,
    interval_frequency: Regex,
    route_code: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        dose_range: Regex::new(r"(?i)\b\d+(\.\d+)?\s*-\s*\d+(\.\d+)?\s*(mg|mcg|g|ml)\b").unwrap(),
        interval_frequency: Regex::new(r"(?i)\bq\d{1,2}h\b").unwrap(),
        route_code: Regex::new(r"(?i)\b(IV|PO|IM|SC|SL)\b").unwrap(),
    })
}

fn already_covered(state: &TierState, start: usize, end: usize) -> bool {
    state
        .entities
        .iter()
        .any(|e| e.raw_span.start < end && start < e.raw_span.end)
}

pub struct RegexFallbackTier;

impl ExtractionTier for RegexFallbackTier {
    fn tier(&self) -> Tier {
        Tier::Tier3Regex
    }

    fn run(&self, text: &str, state: &TierState) -> PipelineResult<Vec<ClinicalEntity>> {
        let patterns = patterns();
        let mut entities = Vec::new();

        for m in patterns.dose_range.find_iter(text) {
            if already_covered(state, m.start(), m.end()) {
                continue;
            }
            entities.push(ClinicalEntity::new(
                EntityKind::Dosage,
                Span { start: m.start(), end: m.end() },
                m.as_str(),
                weighted_confidence(EntityKind::Dosage, 0.8),
                Tier::Tier3Regex,
            ));
        }

        for m in patterns.interval_frequency.find_iter(text) {
            if already_covered(state, m.start(), m.end()) {
                continue;
            }
            entities.push(ClinicalEntity::new(
                EntityKind::Frequency,
                Span { start: m.start(), end: m.end() },
                m.as_str().to_uppercase(),
                weighted_confidence(EntityKind::Frequency, 0.8),
                Tier::Tier3Regex,
            ));
        }

        for m in patterns.route_code.find_iter(text) {
            if already_covered(state, m.start(), m.end()) {
                continue;
            }
            entities.push(ClinicalEntity::new(
                EntityKind::Route,
                Span { start: m.start(), end: m.end() },
                m.as_str().to_uppercase(),
                weighted_confidence(EntityKind::Route, 0.75),
                Tier::Tier3Regex,
            ));
        }

        entities.sort_by_key(|e| e.raw_span.start);
        Ok(entities)
    }

    fn estimated_cost(&self, _text: &str) -> f64 {
        0.05
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catches_a_dose_range_and_an_interval_frequency() {
        let found = RegexFallbackTier.run("Give 5-10mg q8h", &TierState::new()).unwrap();
        assert!(found.iter().any(|e| e.kind == EntityKind::Dosage && e.normalized.contains("5-10mg")));
        assert!(found.iter().any(|e| e.kind == EntityKind::Frequency && e.normalized == "Q8H"));
    }

    #[test]
    fn skips_a_route_code_already_covered_by_an_earlier_tier() {
        let mut state = TierState::new();
        state.extend_entities(vec![ClinicalEntity::new(
            EntityKind::Route,
            Span { start: 0, end: 2 },
            "IV",
            0.9,
            Tier::Tier1Pattern,
        )]);
        let found = RegexFallbackTier.run("IV push now", &state).unwrap();
        assert!(found.iter().all(|e| e.kind != EntityKind::Route));
    }

    #[test]
    fn is_deterministic_across_repeated_runs() {
        let text = "Administer q12h IV, adjust 2-4mg as needed";
        let a = RegexFallbackTier.run(text, &TierState::new()).unwrap();
        let b = RegexFallbackTier.run(text, &TierState::new()).unwrap();
        assert_eq!(a, b);
    }
}
