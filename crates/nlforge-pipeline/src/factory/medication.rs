//! Medication-bearing factories: `MedicationRequest`, `MedicationAdministration`,
//! `MedicationDispense`, and `MedicationStatement`.
//!
//! The medication is coded inline as `medicationCodeableConcept`: none of
//! these factories mint a separate `Medication` resource as a side effect.

use chrono::Utc;
use std::sync::Arc;

use nlforge_contracts::coding::OntologyIntent;
use nlforge_contracts::entity::{ClinicalEntity, EntityKind};
use nlforge_contracts::error::{PipelineError, PipelineResult};
use nlforge_contracts::reference::{Reference, ReferenceValue};
use nlforge_contracts::resource::{
    DosageInstruction, MedicationAdministrationResource, MedicationDispenseResource, MedicationRequestResource,
    MedicationStatementResource, Quantity, ResourceKind, ResourceMeta, ResourcePayload,
};
use nlforge_core::traits::{ResourceFactory, TerminologyCoder};

fn require_subject(factory: &str, subject: &Reference) -> PipelineResult<()> {
    if subject.id.trim().is_empty() {
        return Err(PipelineError::InvalidInput {
            factory: factory.to_string(),
            reason: "subject reference must carry a non-empty identifier".to_string(),
        });
    }
    Ok(())
}

fn medication_entity<'a>(factory: &str, entities: &'a [ClinicalEntity]) -> PipelineResult<&'a ClinicalEntity> {
    entities
        .iter()
        .find(|e| e.kind == EntityKind::Medication)
        .ok_or_else(|| PipelineError::InvalidInput {
            factory: factory.to_string(),
            reason: "no medication entity supplied".to_string(),
        })
}

fn parse_dose_quantity(dosage_entity: &ClinicalEntity) -> Option<Quantity> {
    let text = dosage_entity.normalized.as_str();
    let digits_end = text.find(|c: char| !c.is_ascii_digit() && c != '.')?;
    if digits_end == 0 {
        return None;
    }
    let value: f64 = text[..digits_end].parse().ok()?;
    let unit = text[digits_end..].to_string();
    Some(Quantity {
        value,
        unit,
        system: Some("http://unitsofmeasure.org".to_string()),
        code: None,
    })
}

pub struct MedicationRequestResourceFactory {
    coder: Arc<dyn TerminologyCoder>,
}

impl MedicationRequestResourceFactory {
    pub fn new(coder: Arc<dyn TerminologyCoder>) -> Self {
        Self { coder }
    }
}

impl ResourceFactory for MedicationRequestResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::MedicationRequest
    }

    fn build(
        &self,
        entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        require_subject("medication-request", subject)?;
        let medication = medication_entity("medication-request", entities)?;
        let dosage_entity = entities.iter().find(|e| e.kind == EntityKind::Dosage);
        let frequency_entity = entities.iter().find(|e| e.kind == EntityKind::Frequency);
        let route_entity = entities.iter().find(|e| e.kind == EntityKind::Route);

        let self_ref = allocate_reference(ResourceKind::MedicationRequest);
        let medication_codeable_concept = self.coder.code(OntologyIntent::Drug, &medication.normalized);

        let dosage_instruction = if dosage_entity.is_some() || frequency_entity.is_some() || route_entity.is_some() {
            vec![DosageInstruction {
                text: None,
                frequency_code: frequency_entity.map(|e| e.normalized.clone()),
                route: route_entity.map(|e| self.coder.code(OntologyIntent::Condition, &e.normalized)),
                dose_quantity: dosage_entity.and_then(parse_dose_quantity),
            }]
        } else {
            Vec::new()
        };

        Ok(ResourcePayload::MedicationRequest(MedicationRequestResource {
            resource_type: ResourceKind::MedicationRequest.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("medication-request-factory", Utc::now()),
            status: "active".to_string(),
            intent: "order".to_string(),
            medication_codeable_concept,
            subject: ReferenceValue::from(subject),
            dosage_instruction,
        }))
    }
}

pub struct MedicationAdministrationResourceFactory {
    coder: Arc<dyn TerminologyCoder>,
}

impl MedicationAdministrationResourceFactory {
    pub fn new(coder: Arc<dyn TerminologyCoder>) -> Self {
        Self { coder }
    }
}

impl ResourceFactory for MedicationAdministrationResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::MedicationAdministration
    }

    fn build(
        &self,
        entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        require_subject("medication-administration", subject)?;
        let medication = medication_entity("medication-administration", entities)?;
        let self_ref = allocate_reference(ResourceKind::MedicationAdministration);

        Ok(ResourcePayload::MedicationAdministration(MedicationAdministrationResource {
            resource_type: ResourceKind::MedicationAdministration.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("medication-administration-factory", Utc::now()),
            status: "completed".to_string(),
            medication_codeable_concept: self.coder.code(OntologyIntent::Drug, &medication.normalized),
            subject: ReferenceValue::from(subject),
            effective_date_time: Some(Utc::now().to_rfc3339()),
        }))
    }
}

pub struct MedicationDispenseResourceFactory {
    coder: Arc<dyn TerminologyCoder>,
}

impl MedicationDispenseResourceFactory {
    pub fn new(coder: Arc<dyn TerminologyCoder>) -> Self {
        Self { coder }
    }
}

impl ResourceFactory for MedicationDispenseResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::MedicationDispense
    }

    fn build(
        &self,
        entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        require_subject("medication-dispense", subject)?;
        let medication = medication_entity("medication-dispense", entities)?;
        let dosage_entity = entities.iter().find(|e| e.kind == EntityKind::Dosage);
        let self_ref = allocate_reference(ResourceKind::MedicationDispense);

        Ok(ResourcePayload::MedicationDispense(MedicationDispenseResource {
            resource_type: ResourceKind::MedicationDispense.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("medication-dispense-factory", Utc::now()),
            status: "completed".to_string(),
            medication_codeable_concept: self.coder.code(OntologyIntent::Drug, &medication.normalized),
            subject: ReferenceValue::from(subject),
            quantity: dosage_entity.and_then(parse_dose_quantity),
        }))
    }
}

pub struct MedicationStatementResourceFactory {
    coder: Arc<dyn TerminologyCoder>,
}

impl MedicationStatementResourceFactory {
    pub fn new(coder: Arc<dyn TerminologyCoder>) -> Self {
        Self { coder }
    }
}

impl ResourceFactory for MedicationStatementResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::MedicationStatement
    }

    fn build(
        &self,
        entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        require_subject("medication-statement", subject)?;
        let medication = medication_entity("medication-statement", entities)?;
        let self_ref = allocate_reference(ResourceKind::MedicationStatement);

        Ok(ResourcePayload::MedicationStatement(MedicationStatementResource {
            resource_type: ResourceKind::MedicationStatement.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("medication-statement-factory", Utc::now()),
            status: "active".to_string(),
            medication_codeable_concept: self.coder.code(OntologyIntent::Drug, &medication.normalized),
            subject: ReferenceValue::from(subject),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminology::ClinicalTerminologyCoder;
    use nlforge_contracts::entity::{Span, Tier};

    fn medication_and_dosage() -> Vec<ClinicalEntity> {
        vec![
            ClinicalEntity::new(EntityKind::Medication, Span { start: 0, end: 10 }, "lisinopril", 0.97, Tier::Tier1Pattern),
            ClinicalEntity::new(EntityKind::Dosage, Span { start: 11, end: 15 }, "10mg", 0.97, Tier::Tier1Pattern),
        ]
    }

    #[test]
    fn builds_a_medication_request_with_inline_coding_and_dosage() {
        let factory = MedicationRequestResourceFactory::new(Arc::new(ClinicalTerminologyCoder::new(16)));
        let subject = Reference::new(ResourceKind::Patient, "p1");
        let payload = factory
            .build(&medication_and_dosage(), &subject, &mut |kind| Reference::new(kind, "mr1"))
            .unwrap();
        match payload {
            ResourcePayload::MedicationRequest(r) => {
                assert_eq!(r.medication_codeable_concept.primary_code(), Some("29046"));
                assert_eq!(r.dosage_instruction.len(), 1);
                assert_eq!(r.dosage_instruction[0].dose_quantity.as_ref().unwrap().value, 10.0);
            }
            other => panic!("expected MedicationRequest, got {other:?}"),
        }
    }

    #[test]
    fn refuses_to_build_a_prescription_without_a_subject_reference() {
        let factory = MedicationRequestResourceFactory::new(Arc::new(ClinicalTerminologyCoder::new(16)));
        let empty_subject = Reference::new(ResourceKind::Patient, "");
        let result = factory.build(&medication_and_dosage(), &empty_subject, &mut |kind| Reference::new(kind, "mr1"));
        assert!(result.is_err());
    }

    #[test]
    fn refuses_to_build_without_a_medication_entity() {
        let factory = MedicationRequestResourceFactory::new(Arc::new(ClinicalTerminologyCoder::new(16)));
        let subject = Reference::new(ResourceKind::Patient, "p1");
        let result = factory.build(&[], &subject, &mut |kind| Reference::new(kind, "mr1"));
        assert!(result.is_err());
    }
}
