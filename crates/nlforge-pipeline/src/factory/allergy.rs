//! `AllergyIntolerance` factory.
//!
//! Like the other patient-context factories, allergy history is supplied
//! externally rather than derived from order text: but a patient's
//! allergy list is still expressed as `AllergySubstance` entities so the
//! same terminology coding path resolves it to an RxNorm/SNOMED code.

use chrono::Utc;
use std::sync::Arc;

use nlforge_contracts::coding::OntologyIntent;
use nlforge_contracts::entity::{ClinicalEntity, EntityKind};
use nlforge_contracts::error::{PipelineError, PipelineResult};
use nlforge_contracts::reference::{Reference, ReferenceValue};
use nlforge_contracts::resource::{AllergyIntoleranceResource, ResourceKind, ResourceMeta, ResourcePayload};
use nlforge_core::traits::{ResourceFactory, TerminologyCoder};

pub struct AllergyIntoleranceResourceFactory {
    coder: Arc<dyn TerminologyCoder>,
}

impl AllergyIntoleranceResourceFactory {
    pub fn new(coder: Arc<dyn TerminologyCoder>) -> Self {
        Self { coder }
    }
}

impl ResourceFactory for AllergyIntoleranceResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::AllergyIntolerance
    }

    fn build(
        &self,
        entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        let substance = entities
            .iter()
            .find(|e| e.kind == EntityKind::AllergySubstance)
            .ok_or_else(|| PipelineError::InvalidInput {
                factory: "allergy-intolerance".to_string(),
                reason: "no allergy substance entity supplied".to_string(),
            })?;

        let self_ref = allocate_reference(ResourceKind::AllergyIntolerance);
        let code = self.coder.code(OntologyIntent::Allergen, &substance.normalized);

        Ok(ResourcePayload::AllergyIntolerance(AllergyIntoleranceResource {
            resource_type: ResourceKind::AllergyIntolerance.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("allergy-intolerance-factory", Utc::now()),
            code,
            patient: ReferenceValue::from(subject),
            criticality: Some("high".to_string()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminology::ClinicalTerminologyCoder;
    use nlforge_contracts::entity::{Span, Tier};

    #[test]
    fn builds_allergy_intolerance_from_a_substance_entity() {
        let factory = AllergyIntoleranceResourceFactory::new(Arc::new(ClinicalTerminologyCoder::new(16)));
        let entities = vec![ClinicalEntity::new(
            EntityKind::AllergySubstance,
            Span { start: 0, end: 10 },
            "penicillin",
            0.97,
            Tier::Tier1Pattern,
        )];
        let subject = Reference::new(ResourceKind::Patient, "p1");
        let payload = factory.build(&entities, &subject, &mut |kind| Reference::new(kind, "a1")).unwrap();
        match payload {
            ResourcePayload::AllergyIntolerance(a) => {
                assert_eq!(a.patient.reference, "Patient/p1");
                assert_eq!(a.code.primary_code(), Some("7980"));
            }
            other => panic!("expected AllergyIntolerance, got {other:?}"),
        }
    }

    #[test]
    fn refuses_to_build_without_a_substance_entity() {
        let factory = AllergyIntoleranceResourceFactory::new(Arc::new(ClinicalTerminologyCoder::new(16)));
        let subject = Reference::new(ResourceKind::Patient, "p1");
        let result = factory.build(&[], &subject, &mut |kind| Reference::new(kind, "a1"));
        assert!(result.is_err());
    }
}
