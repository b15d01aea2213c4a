//! `Consent` factory.
//!
//! Pins the R4 wire shape exactly: `patient`, `dateTime`, `policyRule`, a
//! `scope` coded concept, and a single-object `provision` (never a list:
//! that is the R4/R5 boundary this resource exists to catch).

use chrono::Utc;

use nlforge_contracts::coding::{CodedConcept, Coding};
use nlforge_contracts::entity::ClinicalEntity;
use nlforge_contracts::error::PipelineResult;
use nlforge_contracts::reference::{Reference, ReferenceValue};
use nlforge_contracts::resource::{ConsentProvision, ConsentResource, ResourceKind, ResourceMeta, ResourcePayload};
use nlforge_core::traits::ResourceFactory;

const CONSENT_SCOPE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/consentscope";
const CONSENT_POLICY_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v3-ActCode";

pub struct ConsentResourceFactory;

impl ResourceFactory for ConsentResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Consent
    }

    fn build(
        &self,
        _entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        let self_ref = allocate_reference(ResourceKind::Consent);

        Ok(ResourcePayload::Consent(ConsentResource {
            resource_type: ResourceKind::Consent.wire_name().to_string(),
            id: self_ref.id,
            meta: ResourceMeta::new("consent-factory", Utc::now()),
            status: "active".to_string(),
            scope: CodedConcept::coded(Coding {
                system: CONSENT_SCOPE_SYSTEM.to_string(),
                code: "patient-privacy".to_string(),
                display: Some("Privacy Consent".to_string()),
            }),
            patient: ReferenceValue::from(subject),
            date_time: Utc::now().to_rfc3339(),
            policy_rule: CodedConcept::coded(Coding {
                system: CONSENT_POLICY_SYSTEM.to_string(),
                code: "OPTIN".to_string(),
                display: Some("Opt In".to_string()),
            }),
            provision: Some(ConsentProvision {
                provision_type: Some("permit".to_string()),
            }),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_is_a_single_object_not_a_list() {
        let subject = Reference::new(ResourceKind::Patient, "p1");
        let payload = ConsentResourceFactory.build(&[], &subject, &mut |kind| Reference::new(kind, "con1")).unwrap();
        let wire = payload.to_wire_json().unwrap();
        assert!(wire["provision"].is_object());
        assert_eq!(wire["patient"]["reference"], "Patient/p1");
        assert!(wire.get("dateTime").is_some());
        assert!(wire.get("policyRule").is_some());
    }
}
