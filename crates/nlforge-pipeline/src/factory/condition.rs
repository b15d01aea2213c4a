//! `Condition` factory: one `Condition` resource per distinct condition
//! entity (the indication named in a prescription, or a standalone
//! diagnosis).

use chrono::Utc;
use std::sync::Arc;

use nlforge_contracts::coding::{CodedConcept, Coding, OntologyIntent};
use nlforge_contracts::entity::{ClinicalEntity, EntityKind};
use nlforge_contracts::error::{PipelineError, PipelineResult};
use nlforge_contracts::reference::{Reference, ReferenceValue};
use nlforge_contracts::resource::{ConditionResource, ResourceKind, ResourceMeta, ResourcePayload};
use nlforge_core::traits::{ResourceFactory, TerminologyCoder};

const ACTIVE_CLINICAL_STATUS_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/condition-clinical";

pub struct ConditionResourceFactory {
    coder: Arc<dyn TerminologyCoder>,
}

impl ConditionResourceFactory {
    pub fn new(coder: Arc<dyn TerminologyCoder>) -> Self {
        Self { coder }
    }
}

impl ResourceFactory for ConditionResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Condition
    }

    fn build(
        &self,
        entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        let condition = entities
            .iter()
            .find(|e| e.kind == EntityKind::Condition)
            .ok_or_else(|| PipelineError::InvalidInput {
                factory: "condition".to_string(),
                reason: "no condition entity supplied".to_string(),
            })?;

        let self_ref = allocate_reference(ResourceKind::Condition);
        let code = self.coder.code(OntologyIntent::Condition, &condition.normalized);

        Ok(ResourcePayload::Condition(ConditionResource {
            resource_type: ResourceKind::Condition.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("condition-factory", Utc::now()),
            code,
            subject: ReferenceValue::from(subject),
            clinical_status: Some(CodedConcept::coded(Coding {
                system: ACTIVE_CLINICAL_STATUS_SYSTEM.to_string(),
                code: "active".to_string(),
                display: Some("Active".to_string()),
            })),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminology::ClinicalTerminologyCoder;
    use nlforge_contracts::entity::{Span, Tier};

    #[test]
    fn builds_a_condition_coded_from_the_entity_text() {
        let factory = ConditionResourceFactory::new(Arc::new(ClinicalTerminologyCoder::new(16)));
        let entities = vec![ClinicalEntity::new(
            EntityKind::Condition,
            Span { start: 0, end: 12 },
            "hypertension",
            0.9,
            Tier::Tier1Pattern,
        )];
        let subject = Reference::new(ResourceKind::Patient, "p1");
        let payload = factory.build(&entities, &subject, &mut |kind| Reference::new(kind, "c1")).unwrap();
        match payload {
            ResourcePayload::Condition(c) => {
                assert_eq!(c.subject.reference, "Patient/p1");
                assert_eq!(c.code.primary_code(), Some("38341003"));
            }
            other => panic!("expected Condition, got {other:?}"),
        }
    }
}
