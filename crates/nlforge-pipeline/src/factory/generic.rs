//! Catch-all factory for kinds with no dedicated `ResourcePayload` variant.
//!
//! `ResourceKind::is_minimum_required()` names many more kinds than the
//! pipeline has clinical-text signal for (`Coverage`, `Goal`,
//! `ImagingStudy`, and so on). Rather than hand-write eighteen near-empty
//! structs, one factory builds a minimal `GenericResource` per kind from a
//! declarative field table: a `status`-or-equivalent value and which of
//! `subject`/`patient` the kind expects, if any.

use chrono::Utc;
use serde_json::{Map, Value};

use nlforge_contracts::entity::ClinicalEntity;
use nlforge_contracts::error::PipelineResult;
use nlforge_contracts::reference::{Reference, ReferenceValue};
use nlforge_contracts::resource::{GenericResource, ResourceKind, ResourceMeta, ResourcePayload};
use nlforge_core::traits::ResourceFactory;

/// Which reference field, if any, a generic kind carries, and the status
/// value it should report.
struct GenericSpec {
    subject_field: Option<&'static str>,
    status_field: Option<(&'static str, &'static str)>,
}

fn spec_for(kind: ResourceKind) -> GenericSpec {
    use ResourceKind::*;
    match kind {
        Coverage => GenericSpec {
            subject_field: Some("beneficiary"),
            status_field: Some(("status", "active")),
        },
        Communication => GenericSpec {
            subject_field: Some("subject"),
            status_field: Some(("status", "completed")),
        },
        RelatedPerson => GenericSpec {
            subject_field: Some("patient"),
            status_field: None,
        },
        RiskAssessment => GenericSpec {
            subject_field: Some("subject"),
            status_field: Some(("status", "final")),
        },
        Goal => GenericSpec {
            subject_field: Some("subject"),
            status_field: Some(("lifecycleStatus", "active")),
        },
        ImagingStudy => GenericSpec {
            subject_field: Some("subject"),
            status_field: Some(("status", "available")),
        },
        DocumentReference => GenericSpec {
            subject_field: Some("subject"),
            status_field: Some(("status", "current")),
        },
        Composition => GenericSpec {
            subject_field: Some("subject"),
            status_field: Some(("status", "final")),
        },
        NutritionOrder => GenericSpec {
            subject_field: Some("patient"),
            status_field: Some(("status", "active")),
        },
        FamilyMemberHistory => GenericSpec {
            subject_field: Some("patient"),
            status_field: Some(("status", "completed")),
        },
        AuditEvent => GenericSpec {
            subject_field: None,
            status_field: None,
        },
        OperationOutcome => GenericSpec {
            subject_field: None,
            status_field: None,
        },
        Appointment => GenericSpec {
            subject_field: None,
            status_field: Some(("status", "booked")),
        },
        Location => GenericSpec {
            subject_field: None,
            status_field: Some(("status", "active")),
        },
        Medication => GenericSpec {
            subject_field: None,
            status_field: Some(("status", "active")),
        },
        _ => GenericSpec {
            subject_field: Some("subject"),
            status_field: Some(("status", "unknown")),
        },
    }
}

/// Builds a minimal, R4-field-named `GenericResource` for any kind the
/// pipeline has no dedicated factory for.
pub struct GenericResourceFactory {
    kind: ResourceKind,
}

impl GenericResourceFactory {
    pub fn new(kind: ResourceKind) -> Self {
        Self { kind }
    }
}

impl ResourceFactory for GenericResourceFactory {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn build(
        &self,
        _entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        let spec = spec_for(self.kind);
        let self_ref = allocate_reference(self.kind);

        let mut fields = Map::new();
        if let Some(field) = spec.subject_field {
            let value = ReferenceValue::from(subject);
            fields.insert(field.to_string(), Value::String(value.reference));
        }
        if let Some((field, value)) = spec.status_field {
            fields.insert(field.to_string(), Value::String(value.to_string()));
        }

        Ok(ResourcePayload::Generic(GenericResource {
            resource_type: self.kind.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("generic-factory", Utc::now()),
            fields,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_coverage_resource_with_a_beneficiary_reference() {
        let factory = GenericResourceFactory::new(ResourceKind::Coverage);
        let subject = Reference::new(ResourceKind::Patient, "p1");
        let payload = factory.build(&[], &subject, &mut |kind| Reference::new(kind, "cov1")).unwrap();
        let wire = payload.to_wire_json().unwrap();
        assert_eq!(wire["resourceType"], "Coverage");
        assert_eq!(wire["beneficiary"]["reference"], "Patient/p1");
        assert_eq!(wire["status"], "active");
    }

    #[test]
    fn builds_an_audit_event_resource_without_a_subject_reference() {
        let factory = GenericResourceFactory::new(ResourceKind::AuditEvent);
        let subject = Reference::new(ResourceKind::Patient, "p1");
        let payload = factory.build(&[], &subject, &mut |kind| Reference::new(kind, "ae1")).unwrap();
        let wire = payload.to_wire_json().unwrap();
        assert!(wire.get("subject").is_none());
        assert!(wire.get("patient").is_none());
    }
}
