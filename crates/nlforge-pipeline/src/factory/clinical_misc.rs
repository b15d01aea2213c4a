//! `Procedure`, `DiagnosticReport`, `CarePlan`, and `Specimen` factories.
//!
//! These round out the dedicated-struct kinds without carrying the
//! central-scenario weight `medication`/`observation`/`condition` do, so
//! they share one file rather than one apiece.

use chrono::Utc;
use std::sync::Arc;

use nlforge_contracts::coding::{CodedConcept, OntologyIntent};
use nlforge_contracts::entity::{ClinicalEntity, EntityKind};
use nlforge_contracts::error::{PipelineError, PipelineResult};
use nlforge_contracts::reference::{Reference, ReferenceValue};
use nlforge_contracts::resource::{
    CarePlanResource, DiagnosticReportResource, ProcedureResource, ResourceKind, ResourceMeta, ResourcePayload,
    SpecimenResource,
};
use nlforge_core::traits::{ResourceFactory, TerminologyCoder};

pub struct ProcedureResourceFactory {
    coder: Arc<dyn TerminologyCoder>,
}

impl ProcedureResourceFactory {
    pub fn new(coder: Arc<dyn TerminologyCoder>) -> Self {
        Self { coder }
    }
}

impl ResourceFactory for ProcedureResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Procedure
    }

    fn build(
        &self,
        entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        let procedure = entities
            .iter()
            .find(|e| e.kind == EntityKind::Procedure)
            .ok_or_else(|| PipelineError::InvalidInput {
                factory: "procedure".to_string(),
                reason: "no procedure entity supplied".to_string(),
            })?;
        let self_ref = allocate_reference(ResourceKind::Procedure);

        Ok(ResourcePayload::Procedure(ProcedureResource {
            resource_type: ResourceKind::Procedure.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("procedure-factory", Utc::now()),
            status: "completed".to_string(),
            code: self.coder.code(OntologyIntent::Procedure, &procedure.normalized),
            subject: ReferenceValue::from(subject),
        }))
    }
}

pub struct DiagnosticReportResourceFactory {
    coder: Arc<dyn TerminologyCoder>,
}

impl DiagnosticReportResourceFactory {
    pub fn new(coder: Arc<dyn TerminologyCoder>) -> Self {
        Self { coder }
    }
}

impl ResourceFactory for DiagnosticReportResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::DiagnosticReport
    }

    fn build(
        &self,
        entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        let lab = entities.iter().find(|e| e.kind == EntityKind::LabTest);
        let code = lab
            .map(|e| self.coder.code(OntologyIntent::Lab, &e.normalized))
            .unwrap_or_else(|| CodedConcept::text_only("diagnostic report"));
        let self_ref = allocate_reference(ResourceKind::DiagnosticReport);

        Ok(ResourcePayload::DiagnosticReport(DiagnosticReportResource {
            resource_type: ResourceKind::DiagnosticReport.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("diagnostic-report-factory", Utc::now()),
            status: "final".to_string(),
            code,
            subject: ReferenceValue::from(subject),
            result: Vec::new(),
        }))
    }
}

pub struct CarePlanResourceFactory;

impl ResourceFactory for CarePlanResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::CarePlan
    }

    fn build(
        &self,
        _entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        let self_ref = allocate_reference(ResourceKind::CarePlan);

        Ok(ResourcePayload::CarePlan(CarePlanResource {
            resource_type: ResourceKind::CarePlan.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("care-plan-factory", Utc::now()),
            status: "active".to_string(),
            intent: "plan".to_string(),
            subject: ReferenceValue::from(subject),
        }))
    }
}

pub struct SpecimenResourceFactory {
    coder: Arc<dyn TerminologyCoder>,
}

impl SpecimenResourceFactory {
    pub fn new(coder: Arc<dyn TerminologyCoder>) -> Self {
        Self { coder }
    }
}

impl ResourceFactory for SpecimenResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Specimen
    }

    fn build(
        &self,
        entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        let specimen_type = entities
            .iter()
            .find(|e| e.kind == EntityKind::LabTest)
            .map(|e| self.coder.code(OntologyIntent::Lab, &e.normalized));
        let self_ref = allocate_reference(ResourceKind::Specimen);

        Ok(ResourcePayload::Specimen(SpecimenResource {
            resource_type: ResourceKind::Specimen.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("specimen-factory", Utc::now()),
            subject: Some(ReferenceValue::from(subject)),
            specimen_type,
        }))
    }
}
