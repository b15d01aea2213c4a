//! The terminology coder: resolves free text against a fixed ontology.
//!
//! Matching proceeds tier by tier and stops at the first non-empty match:
//! case-insensitive exact, case-insensitive normalized (whitespace
//! collapsed, punctuation stripped), brand-to-generic alias, then a
//! stem-based partial match. Ties within a tier break lexicographically on
//! the code.

use nlforge_contracts::coding::{CodedConcept, Coding, OntologyIntent};
use nlforge_core::traits::TerminologyCoder;

use super::cache::TerminologyCache;
use super::tables::{OntologyEntry, OntologyTables};

fn system_uri_for(intent: OntologyIntent) -> &'static str {
    use nlforge_contracts::coding::system_uri;
    use OntologyIntent::*;
    match intent {
        Drug | Allergen => system_uri::DRUG,
        Lab => system_uri::LAB,
        Vaccine => system_uri::VACCINE,
        Unit => system_uri::UNIT,
        Condition | Procedure | FacilityType | Relationship | Anatomy => system_uri::CLINICAL,
    }
}

fn normalize(term: &str) -> String {
    term.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Picks the lexicographically lowest code among candidates, per the
/// fixed tie-break rule.
fn best_of<'a>(candidates: impl Iterator<Item = &'a OntologyEntry>) -> Option<&'a OntologyEntry> {
    candidates.min_by(|a, b| a.code.cmp(&b.code))
}

fn resolve(tables: &OntologyTables, intent: OntologyIntent, term: &str) -> Option<CodedConcept> {
    let entries = tables.entries_for(intent);
    let lower = term.to_lowercase();
    let normalized = normalize(term);

    // Tier 1: case-insensitive exact.
    if let Some(entry) = best_of(entries.iter().filter(|e| e.canonical.to_lowercase() == lower)) {
        return Some(to_concept(intent, entry));
    }

    // Tier 2: case-insensitive normalized (whitespace collapsed,
    // punctuation stripped).
    if let Some(entry) = best_of(entries.iter().filter(|e| normalize(&e.canonical) == normalized)) {
        return Some(to_concept(intent, entry));
    }

    // Tier 3: brand-to-generic alias resolution.
    if let Some(entry) = best_of(
        entries
            .iter()
            .filter(|e| e.aliases.iter().any(|alias| normalize(alias) == normalized)),
    ) {
        return Some(to_concept(intent, entry));
    }

    // Tier 4: stem-based partial match (the shorter of the two strings is
    // a prefix of the other, after normalization).
    if let Some(entry) = best_of(entries.iter().filter(|e| {
        let canonical = normalize(&e.canonical);
        !normalized.is_empty()
            && !canonical.is_empty()
            && (canonical.starts_with(&normalized) || normalized.starts_with(&canonical))
    })) {
        return Some(to_concept(intent, entry));
    }

    None
}

fn to_concept(intent: OntologyIntent, entry: &OntologyEntry) -> CodedConcept {
    CodedConcept::coded(Coding {
        system: system_uri_for(intent).to_string(),
        code: entry.code.clone(),
        display: Some(entry.canonical.clone()),
    })
}

/// Normalizes a dose unit surface form to its standard ontology code.
/// Unknown units pass through unchanged.
pub fn normalize_unit(raw: &str) -> String {
    let tables = OntologyTables::shared();
    match resolve(tables, OntologyIntent::Unit, raw) {
        Some(concept) => concept.primary_code().unwrap_or(raw).to_string(),
        None => raw.to_string(),
    }
}

/// Converts a dose quantity between mg/g/mcg and kg/lb for range-comparison
/// purposes only. Returns `None` for unsupported conversions. The emitted
/// wire quantity is never rewritten by this function; it exists solely to
/// let the safety layer compare differently-unit doses.
pub fn convert_for_comparison(value: f64, from_unit: &str, to_unit: &str) -> Option<f64> {
    let from = normalize_unit(from_unit);
    let to = normalize_unit(to_unit);
    if from == to {
        return Some(value);
    }
    match (from.as_str(), to.as_str()) {
        ("g", "mg") => Some(value * 1000.0),
        ("mg", "g") => Some(value / 1000.0),
        ("mcg", "mg") => Some(value / 1000.0),
        ("mg", "mcg") => Some(value * 1000.0),
        ("kg", "lb") => Some(value * 2.2046226218),
        ("lb", "kg") => Some(value / 2.2046226218),
        _ => None,
    }
}

/// The default terminology coder backed by the embedded ontology tables and
/// a sharded LRU cache.
pub struct ClinicalTerminologyCoder {
    cache: TerminologyCache,
}

impl ClinicalTerminologyCoder {
    pub fn new(cache_capacity: usize) -> Self {
        Self { cache: TerminologyCache::new(cache_capacity) }
    }
}

impl TerminologyCoder for ClinicalTerminologyCoder {
    fn code(&self, intent: OntologyIntent, term: &str) -> CodedConcept {
        if let Some(hit) = self.cache.get(intent, term) {
            return hit;
        }

        let tables = OntologyTables::shared();
        let resolved = resolve(tables, intent, term).unwrap_or_else(|| CodedConcept::text_only(term));
        self.cache.put(intent, term, resolved.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coder() -> ClinicalTerminologyCoder {
        ClinicalTerminologyCoder::new(64)
    }

    #[test]
    fn exact_match_resolves_a_drug_code() {
        let concept = coder().code(OntologyIntent::Drug, "lisinopril");
        assert_eq!(concept.primary_code(), Some("29046"));
    }

    #[test]
    fn case_and_punctuation_insensitive_match() {
        let concept = coder().code(OntologyIntent::Drug, "  LISINOPRIL  ");
        assert_eq!(concept.primary_code(), Some("29046"));
    }

    #[test]
    fn brand_alias_resolves_to_generic_code() {
        let concept = coder().code(OntologyIntent::Drug, "zestril");
        assert_eq!(concept.primary_code(), Some("29046"));
    }

    #[test]
    fn unrecognized_term_falls_back_to_text_only() {
        let concept = coder().code(OntologyIntent::Drug, "an entirely unknown substance");
        assert!(concept.coding.is_empty());
        assert_eq!(concept.text.as_deref(), Some("an entirely unknown substance"));
        assert!(concept.is_valid());
    }

    #[test]
    fn coding_is_idempotent_when_reapplied_to_its_own_display_text() {
        let coder = coder();
        let first = coder.code(OntologyIntent::Drug, "amoxil");
        let display = first.coding[0].display.clone().unwrap();
        let second = coder.code(OntologyIntent::Drug, &display);
        assert_eq!(first.primary_code(), second.primary_code());
    }

    #[test]
    fn repeated_lookup_is_served_from_cache_with_the_same_result() {
        let coder = coder();
        let first = coder.code(OntologyIntent::Lab, "spo2");
        let second = coder.code(OntologyIntent::Lab, "spo2");
        assert_eq!(first, second);
    }

    #[test]
    fn unit_normalization_maps_common_aliases() {
        assert_eq!(normalize_unit("milligrams"), "mg");
        assert_eq!(normalize_unit("ml"), "mL");
    }

    #[test]
    fn cross_unit_conversion_for_comparison() {
        assert_eq!(convert_for_comparison(1.0, "g", "mg"), Some(1000.0));
        assert_eq!(convert_for_comparison(2000.0, "mcg", "mg"), Some(2.0));
        assert_eq!(convert_for_comparison(5.0, "mg", "mg"), Some(5.0));
    }
}
