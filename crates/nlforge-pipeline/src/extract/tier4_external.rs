//! Tier 4: the external entity model.
//!
//! Serving a real model over HTTP is out of scope here; `ExternalEntityModel`
//! is the narrow seam a real client would implement. The bundled
//! `StubExternalModel` is a deterministic test double: given the kinds still
//! missing, it returns a single low-confidence guess per kind so the
//! escalation ladder and cost ceiling can be exercised without a network
//! dependency.

use nlforge_contracts::entity::{ClinicalEntity, EntityKind, Span, Tier};
use nlforge_contracts::error::PipelineResult;
use nlforge_contracts::tier_state::TierState;
use nlforge_core::traits::ExtractionTier;

use crate::extract::gate::weighted_confidence;

/// A capability seam for an external (learned, hosted) entity extractor.
pub trait ExternalEntityModel: Send + Sync {
    fn infer(&self, text: &str, required_kinds: &[EntityKind]) -> PipelineResult<Vec<ClinicalEntity>>;
}

/// Deterministic stand-in: proposes one whole-text span per still-missing
/// required kind, at a confidence just above the tier 4 floor. Never makes
/// a network call.
pub struct StubExternalModel;

impl ExternalEntityModel for StubExternalModel {
    fn infer(&self, text: &str, required_kinds: &[EntityKind]) -> PipelineResult<Vec<ClinicalEntity>> {
        let end = text.len();
        Ok(required_kinds
            .iter()
            .map(|kind| {
                ClinicalEntity::new(
                    *kind,
                    Span { start: 0, end },
                    text.trim(),
                    weighted_confidence(*kind, 0.62),
                    Tier::Tier4External,
                )
            })
            .collect())
    }
}

impl ExternalEntityModel for std::sync::Arc<dyn ExternalEntityModel> {
    fn infer(&self, text: &str, required_kinds: &[EntityKind]) -> PipelineResult<Vec<ClinicalEntity>> {
        (**self).infer(text, required_kinds)
    }
}

pub struct ExternalModelTier<M: ExternalEntityModel> {
    model: M,
    required_kinds: Vec<EntityKind>,
}

impl<M: ExternalEntityModel> ExternalModelTier<M> {
    pub fn new(model: M, required_kinds: Vec<EntityKind>) -> Self {
        Self { model, required_kinds }
    }
}

impl<M: ExternalEntityModel> ExtractionTier for ExternalModelTier<M> {
    fn tier(&self) -> Tier {
        Tier::Tier4External
    }

    fn run(&self, text: &str, state: &TierState) -> PipelineResult<Vec<ClinicalEntity>> {
        let missing: Vec<EntityKind> = self
            .required_kinds
            .iter()
            .copied()
            .filter(|kind| !state.entities.iter().any(|e| e.kind == *kind))
            .collect();
        if missing.is_empty() {
            return Ok(Vec::new());
        }
        self.model.infer(text, &missing)
    }

    fn estimated_cost(&self, _text: &str) -> f64 {
        1.0
    }
}
