//! Tier 2: the sequence tagger.
//!
//! `SequenceTagger` is a narrow capability trait so a real statistical or
//! learned tagger can be substituted later without touching the executor.
//! The bundled implementation is a deterministic heuristic over
//! capitalized tokens the pattern tier left uncovered: it exists to
//! exercise the escalation ladder honestly, not to approximate an ML model.

use nlforge_contracts::entity::{ClinicalEntity, EntityKind, Span, Tier};
use nlforge_contracts::error::PipelineResult;
use nlforge_contracts::tier_state::TierState;
use nlforge_core::traits::ExtractionTier;

use crate::extract::gate::weighted_confidence;

/// A pluggable sequence-labeling model: given text and the kinds still
/// needed, returns whatever additional entities it can find.
pub trait SequenceTagger: Send + Sync {
    fn tag(&self, text: &str, state: &TierState) -> PipelineResult<Vec<ClinicalEntity>>;
}

fn already_covered(state: &TierState, start: usize, end: usize) -> bool {
    state
        .entities
        .iter()
        .any(|e| e.raw_span.start < end && start < e.raw_span.end)
}

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

/// Flags any capitalized token not already covered by tier 1 as a
/// low-confidence condition candidate. Deliberately conservative: this is
/// meant to nudge escalation decisions in tests, not to be a real tagger.
pub struct HeuristicCapitalizedTagger;

impl SequenceTagger for HeuristicCapitalizedTagger {
    fn tag(&self, text: &str, state: &TierState) -> PipelineResult<Vec<ClinicalEntity>> {
        let mut entities = Vec::new();
        for (start, end, raw) in tokens_with_spans(text) {
            let trimmed = raw.trim_matches(|c: char| c.is_ascii_punctuation());
            if trimmed.len() < 3 {
                continue;
            }
            let mut chars = trimmed.chars();
            let starts_upper = chars.next().is_some_and(|c| c.is_uppercase());
            let rest_lower = chars.all(|c| c.is_lowercase() || !c.is_alphabetic());
            if !starts_upper || !rest_lower {
                continue;
            }
            if already_covered(state, start, end) {
                continue;
            }
            entities.push(ClinicalEntity::new(
                EntityKind::Condition,
                Span { start, end },
                trimmed,
                weighted_confidence(EntityKind::Condition, 0.55),
                Tier::Tier2Tagger,
            ));
        }
        Ok(entities)
    }
}

pub struct SequenceTaggerTier<T: SequenceTagger> {
    tagger: T,
}

impl<T: SequenceTagger> SequenceTaggerTier<T> {
    pub fn new(tagger: T) -> Self {
        Self { tagger }
    }
}

impl Default for SequenceTaggerTier<HeuristicCapitalizedTagger> {
    fn default() -> Self {
        Self::new(HeuristicCapitalizedTagger)
    }
}

impl<T: SequenceTagger> ExtractionTier for SequenceTaggerTier<T> {
    fn tier(&self) -> Tier {
        Tier::Tier2Tagger
    }

    fn run(&self, text: &str, state: &TierState) -> PipelineResult<Vec<ClinicalEntity>> {
        self.tagger.tag(text, state)
    }

    fn estimated_cost(&self, _text: &str) -> f64 {
        0.1
    }
}
