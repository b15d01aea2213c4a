//! Factories for the "patient record" resources: `Patient`, `Practitioner`,
//! and `Encounter`.
//!
//! These are not derived from order-text extraction: a clinic's patient
//! record, practitioner roster, and encounter context exist before any
//! clinical text is parsed. The entities slice passed to these factories is
//! typically empty; `subject` (and, for `Encounter`, the caller's context)
//! carries everything they need.

use chrono::Utc;

use nlforge_contracts::coding::Coding;
use nlforge_contracts::entity::ClinicalEntity;
use nlforge_contracts::error::{PipelineError, PipelineResult};
use nlforge_contracts::reference::{Reference, ReferenceValue};
use nlforge_contracts::resource::{
    EncounterResource, PatientResource, PractitionerResource, ResourceKind, ResourceMeta, ResourcePayload,
};
use nlforge_core::traits::ResourceFactory;

pub struct PatientResourceFactory;

impl ResourceFactory for PatientResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Patient
    }

    fn build(
        &self,
        _entities: &[ClinicalEntity],
        subject: &Reference,
        _allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        if subject.kind != ResourceKind::Patient {
            return Err(PipelineError::InvalidInput {
                factory: "patient".to_string(),
                reason: "subject reference must name a Patient".to_string(),
            });
        }
        Ok(ResourcePayload::Patient(PatientResource {
            resource_type: ResourceKind::Patient.wire_name().to_string(),
            id: subject.id.clone(),
            meta: ResourceMeta::new("patient-factory", Utc::now()),
            name: Vec::new(),
            gender: None,
            birth_date: None,
        }))
    }
}

pub struct PractitionerResourceFactory;

impl ResourceFactory for PractitionerResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Practitioner
    }

    fn build(
        &self,
        _entities: &[ClinicalEntity],
        _subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        let self_ref = allocate_reference(ResourceKind::Practitioner);
        Ok(ResourcePayload::Practitioner(PractitionerResource {
            resource_type: ResourceKind::Practitioner.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("practitioner-factory", Utc::now()),
            name: Vec::new(),
        }))
    }
}

pub struct EncounterResourceFactory;

impl ResourceFactory for EncounterResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Encounter
    }

    fn build(
        &self,
        _entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        let self_ref = allocate_reference(ResourceKind::Encounter);
        Ok(ResourcePayload::Encounter(EncounterResource {
            resource_type: ResourceKind::Encounter.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("encounter-factory", Utc::now()),
            status: "finished".to_string(),
            class: Coding {
                system: "http://terminology.hl7.org/CodeSystem/v3-ActCode".to_string(),
                code: "AMB".to_string(),
                display: Some("ambulatory".to_string()),
            },
            subject: Some(ReferenceValue::from(subject)),
        }))
    }
}
