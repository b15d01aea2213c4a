//! Maps every `ResourceKind` to the `ResourceFactory` that builds it.
//!
//! Built once per pipeline runtime, not per request: factories are
//! stateless apart from the shared terminology coder, so one registry
//! instance serves every request the runtime handles.

use std::collections::HashMap;
use std::sync::Arc;

use nlforge_contracts::resource::ResourceKind;
use nlforge_core::traits::{ResourceFactory, TerminologyCoder};

use super::allergy::AllergyIntoleranceResourceFactory;
use super::clinical_misc::{CarePlanResourceFactory, DiagnosticReportResourceFactory, ProcedureResourceFactory, SpecimenResourceFactory};
use super::condition::ConditionResourceFactory;
use super::consent::ConsentResourceFactory;
use super::device::{DeviceResourceFactory, DeviceUseStatementResourceFactory};
use super::generic::GenericResourceFactory;
use super::immunization::ImmunizationResourceFactory;
use super::medication::{
    MedicationAdministrationResourceFactory, MedicationDispenseResourceFactory, MedicationRequestResourceFactory,
    MedicationStatementResourceFactory,
};
use super::observation::ObservationResourceFactory;
use super::patient_context::{EncounterResourceFactory, PatientResourceFactory, PractitionerResourceFactory};

/// Every resource kind the pipeline can build, keyed off its own factory.
pub struct FactoryRegistry {
    factories: HashMap<ResourceKind, Box<dyn ResourceFactory>>,
}

impl FactoryRegistry {
    /// Builds the full registry. `coder` is shared by every factory that
    /// codes free text against the embedded ontology; the registry clones
    /// the `Arc`, it never owns the only handle.
    pub fn new(coder: Arc<dyn TerminologyCoder>) -> Self {
        let mut factories: HashMap<ResourceKind, Box<dyn ResourceFactory>> = HashMap::new();

        let mut register = |kind: ResourceKind, factory: Box<dyn ResourceFactory>| {
            factories.insert(kind, factory);
        };

        register(ResourceKind::Patient, Box::new(PatientResourceFactory));
        register(ResourceKind::Practitioner, Box::new(PractitionerResourceFactory));
        register(ResourceKind::Encounter, Box::new(EncounterResourceFactory));
        register(ResourceKind::Condition, Box::new(ConditionResourceFactory::new(coder.clone())));
        register(
            ResourceKind::AllergyIntolerance,
            Box::new(AllergyIntoleranceResourceFactory::new(coder.clone())),
        );
        register(
            ResourceKind::MedicationRequest,
            Box::new(MedicationRequestResourceFactory::new(coder.clone())),
        );
        register(
            ResourceKind::MedicationAdministration,
            Box::new(MedicationAdministrationResourceFactory::new(coder.clone())),
        );
        register(
            ResourceKind::MedicationDispense,
            Box::new(MedicationDispenseResourceFactory::new(coder.clone())),
        );
        register(
            ResourceKind::MedicationStatement,
            Box::new(MedicationStatementResourceFactory::new(coder.clone())),
        );
        register(ResourceKind::Observation, Box::new(ObservationResourceFactory::new(coder.clone())));
        register(ResourceKind::Immunization, Box::new(ImmunizationResourceFactory::new(coder.clone())));
        register(ResourceKind::Device, Box::new(DeviceResourceFactory));
        register(ResourceKind::DeviceUseStatement, Box::new(DeviceUseStatementResourceFactory));
        register(ResourceKind::Consent, Box::new(ConsentResourceFactory));
        register(ResourceKind::Procedure, Box::new(ProcedureResourceFactory::new(coder.clone())));
        register(
            ResourceKind::DiagnosticReport,
            Box::new(DiagnosticReportResourceFactory::new(coder.clone())),
        );
        register(ResourceKind::CarePlan, Box::new(CarePlanResourceFactory));
        register(ResourceKind::Specimen, Box::new(SpecimenResourceFactory::new(coder.clone())));

        for kind in GENERIC_KINDS {
            register(*kind, Box::new(GenericResourceFactory::new(*kind)));
        }

        Self { factories }
    }

    pub fn factory_for(&self, kind: ResourceKind) -> Option<&dyn ResourceFactory> {
        self.factories.get(&kind).map(|boxed| boxed.as_ref())
    }
}

/// Kinds with no dedicated `ResourcePayload` variant; each gets a
/// [`GenericResourceFactory`]. `Location` and `Medication` are excluded:
/// `ResourceKind::is_minimum_required()` already treats them as optional,
/// and nothing in this pipeline emits a bare `Medication` resource or a
/// `Location`.
const GENERIC_KINDS: &[ResourceKind] = &[
    ResourceKind::Appointment,
    ResourceKind::Coverage,
    ResourceKind::Communication,
    ResourceKind::RelatedPerson,
    ResourceKind::RiskAssessment,
    ResourceKind::Goal,
    ResourceKind::ImagingStudy,
    ResourceKind::DocumentReference,
    ResourceKind::AuditEvent,
    ResourceKind::NutritionOrder,
    ResourceKind::FamilyMemberHistory,
    ResourceKind::OperationOutcome,
    ResourceKind::Basic,
    ResourceKind::Composition,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminology::ClinicalTerminologyCoder;

    #[test]
    fn every_minimum_required_kind_except_location_and_medication_has_a_factory() {
        let registry = FactoryRegistry::new(Arc::new(ClinicalTerminologyCoder::new(16)));
        for kind in all_resource_kinds() {
            if kind.is_minimum_required() {
                assert!(registry.factory_for(kind).is_some(), "missing factory for {kind:?}");
            }
        }
    }

    fn all_resource_kinds() -> Vec<ResourceKind> {
        use ResourceKind::*;
        vec![
            Patient,
            Practitioner,
            Location,
            Encounter,
            Condition,
            AllergyIntolerance,
            Medication,
            Device,
            MedicationRequest,
            MedicationAdministration,
            DeviceUseStatement,
            Observation,
            DiagnosticReport,
            CarePlan,
            Composition,
            MedicationDispense,
            MedicationStatement,
            Procedure,
            Immunization,
            Appointment,
            Coverage,
            Specimen,
            Communication,
            RelatedPerson,
            RiskAssessment,
            Goal,
            ImagingStudy,
            DocumentReference,
            AuditEvent,
            Consent,
            NutritionOrder,
            FamilyMemberHistory,
            OperationOutcome,
            Basic,
        ]
    }
}
