//! `Immunization` factory, built from a `Vaccine` entity.

use chrono::Utc;
use std::sync::Arc;

use nlforge_contracts::coding::OntologyIntent;
use nlforge_contracts::entity::{ClinicalEntity, EntityKind};
use nlforge_contracts::error::{PipelineError, PipelineResult};
use nlforge_contracts::reference::{Reference, ReferenceValue};
use nlforge_contracts::resource::{ImmunizationResource, ResourceKind, ResourceMeta, ResourcePayload};
use nlforge_core::traits::{ResourceFactory, TerminologyCoder};

pub struct ImmunizationResourceFactory {
    coder: Arc<dyn TerminologyCoder>,
}

impl ImmunizationResourceFactory {
    pub fn new(coder: Arc<dyn TerminologyCoder>) -> Self {
        Self { coder }
    }
}

impl ResourceFactory for ImmunizationResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Immunization
    }

    fn build(
        &self,
        entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        let vaccine = entities
            .iter()
            .find(|e| e.kind == EntityKind::Vaccine)
            .ok_or_else(|| PipelineError::InvalidInput {
                factory: "immunization".to_string(),
                reason: "no vaccine entity supplied".to_string(),
            })?;

        let self_ref = allocate_reference(ResourceKind::Immunization);

        Ok(ResourcePayload::Immunization(ImmunizationResource {
            resource_type: ResourceKind::Immunization.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("immunization-factory", Utc::now()),
            status: "completed".to_string(),
            vaccine_code: self.coder.code(OntologyIntent::Vaccine, &vaccine.normalized),
            patient: ReferenceValue::from(subject),
            occurrence_date_time: Some(Utc::now().to_rfc3339()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminology::ClinicalTerminologyCoder;
    use nlforge_contracts::entity::{Span, Tier};

    #[test]
    fn builds_an_immunization_from_a_vaccine_entity() {
        let factory = ImmunizationResourceFactory::new(Arc::new(ClinicalTerminologyCoder::new(16)));
        let entities = vec![ClinicalEntity::new(EntityKind::Vaccine, Span { start: 0, end: 9 }, "influenza", 0.9, Tier::Tier1Pattern)];
        let subject = Reference::new(ResourceKind::Patient, "p1");
        let payload = factory.build(&entities, &subject, &mut |kind| Reference::new(kind, "i1")).unwrap();
        match payload {
            ResourcePayload::Immunization(r) => assert_eq!(r.vaccine_code.primary_code(), Some("140")),
            other => panic!("expected Immunization, got {other:?}"),
        }
    }
}
