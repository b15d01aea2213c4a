//! `Device` and `DeviceUseStatement` factories.
//!
//! `DeviceUseStatement` mints its own `Device` reference as a side effect
//! via `allocate_reference`: the orchestration layer's closure is
//! responsible for depositing a matching minimal `Device` entry into the
//! bundle so the reference resolves.

use chrono::Utc;

use nlforge_contracts::coding::CodedConcept;
use nlforge_contracts::entity::{ClinicalEntity, EntityKind};
use nlforge_contracts::error::{PipelineError, PipelineResult};
use nlforge_contracts::reference::{Reference, ReferenceValue};
use nlforge_contracts::resource::{DeviceResource, DeviceUseStatementResource, ResourceKind, ResourceMeta, ResourcePayload};
use nlforge_core::traits::ResourceFactory;

pub struct DeviceResourceFactory;

impl ResourceFactory for DeviceResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Device
    }

    fn build(
        &self,
        entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        let device = entities
            .iter()
            .find(|e| e.kind == EntityKind::Device)
            .ok_or_else(|| PipelineError::InvalidInput {
                factory: "device".to_string(),
                reason: "no device entity supplied".to_string(),
            })?;

        let self_ref = allocate_reference(ResourceKind::Device);

        Ok(ResourcePayload::Device(DeviceResource {
            resource_type: ResourceKind::Device.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("device-factory", Utc::now()),
            device_type: CodedConcept::text_only(&device.normalized),
            patient: Some(ReferenceValue::from(subject)),
        }))
    }
}

pub struct DeviceUseStatementResourceFactory;

impl ResourceFactory for DeviceUseStatementResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::DeviceUseStatement
    }

    fn build(
        &self,
        _entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        let self_ref = allocate_reference(ResourceKind::DeviceUseStatement);
        let device_ref = allocate_reference(ResourceKind::Device);

        Ok(ResourcePayload::DeviceUseStatement(DeviceUseStatementResource {
            resource_type: ResourceKind::DeviceUseStatement.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("device-use-statement-factory", Utc::now()),
            status: "active".to_string(),
            subject: ReferenceValue::from(subject),
            device: ReferenceValue::from(&device_ref),
        }))
    }
}
