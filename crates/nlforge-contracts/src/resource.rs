//! Resource payloads: the keyed, R4-wire-format structures a factory builds.
//!
//! Every kind required by the component design (4.3) gets a discriminator
//! here. Kinds exercised by the safety layer and the worked scenarios get a
//! dedicated, explicitly field-by-field struct so their wire shape never
//! drifts with a schema library's successor-version mappings. The remaining
//! required kinds share `GenericResource`, a keyed map populated against a
//! declarative field spec (see `nlforge-pipeline::factory::generic`): still
//! R4-field-exact, just not hand-written one struct at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coding::CodedConcept;
use crate::reference::ReferenceValue;

/// The discriminator naming the shape of a payload.
///
/// `wire_name()` is the exact R4 `resourceType` string; `priority_rank()` is
/// the fixed kind-priority tie-break order used by the bundle assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
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
}

impl ResourceKind {
    /// The exact R4 `resourceType` wire string.
    pub fn wire_name(self) -> &'static str {
        use ResourceKind::*;
        match self {
            Patient => "Patient",
            Practitioner => "Practitioner",
            Location => "Location",
            Encounter => "Encounter",
            Condition => "Condition",
            AllergyIntolerance => "AllergyIntolerance",
            Medication => "Medication",
            Device => "Device",
            MedicationRequest => "MedicationRequest",
            MedicationAdministration => "MedicationAdministration",
            DeviceUseStatement => "DeviceUseStatement",
            Observation => "Observation",
            DiagnosticReport => "DiagnosticReport",
            CarePlan => "CarePlan",
            Composition => "Composition",
            MedicationDispense => "MedicationDispense",
            MedicationStatement => "MedicationStatement",
            Procedure => "Procedure",
            Immunization => "Immunization",
            Appointment => "Appointment",
            Coverage => "Coverage",
            Specimen => "Specimen",
            Communication => "Communication",
            RelatedPerson => "RelatedPerson",
            RiskAssessment => "RiskAssessment",
            Goal => "Goal",
            ImagingStudy => "ImagingStudy",
            DocumentReference => "DocumentReference",
            AuditEvent => "AuditEvent",
            Consent => "Consent",
            NutritionOrder => "NutritionOrder",
            FamilyMemberHistory => "FamilyMemberHistory",
            OperationOutcome => "OperationOutcome",
            Basic => "Basic",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        use ResourceKind::*;
        Some(match name {
            "Patient" => Patient,
            "Practitioner" => Practitioner,
            "Location" => Location,
            "Encounter" => Encounter,
            "Condition" => Condition,
            "AllergyIntolerance" => AllergyIntolerance,
            "Medication" => Medication,
            "Device" => Device,
            "MedicationRequest" => MedicationRequest,
            "MedicationAdministration" => MedicationAdministration,
            "DeviceUseStatement" => DeviceUseStatement,
            "Observation" => Observation,
            "DiagnosticReport" => DiagnosticReport,
            "CarePlan" => CarePlan,
            "Composition" => Composition,
            "MedicationDispense" => MedicationDispense,
            "MedicationStatement" => MedicationStatement,
            "Procedure" => Procedure,
            "Immunization" => Immunization,
            "Appointment" => Appointment,
            "Coverage" => Coverage,
            "Specimen" => Specimen,
            "Communication" => Communication,
            "RelatedPerson" => RelatedPerson,
            "RiskAssessment" => RiskAssessment,
            "Goal" => Goal,
            "ImagingStudy" => ImagingStudy,
            "DocumentReference" => DocumentReference,
            "AuditEvent" => AuditEvent,
            "Consent" => Consent,
            "NutritionOrder" => NutritionOrder,
            "FamilyMemberHistory" => FamilyMemberHistory,
            "OperationOutcome" => OperationOutcome,
            "Basic" => Basic,
            _ => return None,
        })
    }

    /// Fixed tie-break rank for entries at the same topological level.
    /// Kinds not named explicitly fall back to `u32::MAX` and are ordered
    /// alphabetically by `wire_name()`, then by identifier, by the caller.
    pub fn priority_rank(self) -> u32 {
        use ResourceKind::*;
        match self {
            Patient => 0,
            Practitioner => 1,
            Location => 2,
            Encounter => 3,
            Condition => 4,
            AllergyIntolerance => 5,
            Medication => 6,
            Device => 7,
            MedicationRequest => 8,
            MedicationAdministration => 9,
            DeviceUseStatement => 10,
            Observation => 11,
            DiagnosticReport => 12,
            CarePlan => 13,
            Composition => 14,
            _ => u32::MAX,
        }
    }

    /// True for every kind the factory registry must support at minimum.
    pub fn is_minimum_required(self) -> bool {
        !matches!(self, ResourceKind::Location | ResourceKind::Medication)
    }
}

/// `meta` block attached by every factory: factory provenance, creation
/// timestamp, and an internal version tag, expressed with valid R4
/// `Resource.meta` fields so no non-R4 field leaks onto the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMeta {
    #[serde(rename = "versionId")]
    pub version_id: String,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
    /// Carries the producing factory's name as a URI-shaped provenance tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ResourceMeta {
    pub fn new(factory_name: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            version_id: "1".to_string(),
            last_updated: created_at,
            source: Some(format!("urn:nlforge:factory:{factory_name}")),
        }
    }
}

/// A measured or prescribed quantity. Unit is preserved in its source form
/// unless a downstream safety check requires conversion for comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// One dosage-instruction block on a `MedicationRequest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DosageInstruction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Frequency abbreviation as extracted (BID, TID, QD, PRN, q{N}h, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<CodedConcept>,
    #[serde(rename = "doseQuantity", skip_serializing_if = "Option::is_none")]
    pub dose_quantity: Option<Quantity>,
}

/// A minimal `HumanName.family` + `HumanName.given` pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanName {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub given: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub name: Vec<HumanName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(rename = "birthDate", skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PractitionerResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub name: Vec<HumanName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    pub status: String,
    /// A single `Coding`, not a full `CodedConcept`: R4 `Encounter.class`.
    pub class: crate::coding::Coding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<ReferenceValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    pub code: CodedConcept,
    pub subject: ReferenceValue,
    #[serde(rename = "clinicalStatus", skip_serializing_if = "Option::is_none")]
    pub clinical_status: Option<CodedConcept>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllergyIntoleranceResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    pub code: CodedConcept,
    pub patient: ReferenceValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criticality: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationRequestResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    pub status: String,
    pub intent: String,
    #[serde(rename = "medicationCodeableConcept")]
    pub medication_codeable_concept: CodedConcept,
    pub subject: ReferenceValue,
    #[serde(rename = "dosageInstruction", skip_serializing_if = "Vec::is_empty", default)]
    pub dosage_instruction: Vec<DosageInstruction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationAdministrationResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    pub status: String,
    #[serde(rename = "medicationCodeableConcept")]
    pub medication_codeable_concept: CodedConcept,
    pub subject: ReferenceValue,
    #[serde(rename = "effectiveDateTime", skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationDispenseResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    pub status: String,
    #[serde(rename = "medicationCodeableConcept")]
    pub medication_codeable_concept: CodedConcept,
    pub subject: ReferenceValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Quantity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationStatementResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    pub status: String,
    #[serde(rename = "medicationCodeableConcept")]
    pub medication_codeable_concept: CodedConcept,
    pub subject: ReferenceValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    pub status: String,
    pub code: CodedConcept,
    pub subject: ReferenceValue,
    #[serde(rename = "valueQuantity", skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub component: Vec<ObservationComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationComponent {
    pub code: CodedConcept,
    #[serde(rename = "valueQuantity", skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImmunizationResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    pub status: String,
    #[serde(rename = "vaccineCode")]
    pub vaccine_code: CodedConcept,
    pub patient: ReferenceValue,
    #[serde(rename = "occurrenceDateTime", skip_serializing_if = "Option::is_none")]
    pub occurrence_date_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    /// R4 field name is `type`, not `deviceType`: `type` is a Rust keyword.
    #[serde(rename = "type")]
    pub device_type: CodedConcept,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<ReferenceValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceUseStatementResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    pub status: String,
    pub subject: ReferenceValue,
    pub device: ReferenceValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentProvision {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub provision_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    pub status: String,
    pub scope: CodedConcept,
    pub patient: ReferenceValue,
    #[serde(rename = "dateTime")]
    pub date_time: String,
    #[serde(rename = "policyRule")]
    pub policy_rule: CodedConcept,
    /// A single object, never a list: the R4/R5 boundary this resource
    /// exists to pin down (scenario 4 of the testable properties).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provision: Option<ConsentProvision>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    pub status: String,
    pub code: CodedConcept,
    pub subject: ReferenceValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReportResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    pub status: String,
    pub code: CodedConcept,
    pub subject: ReferenceValue,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub result: Vec<ReferenceValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarePlanResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    pub status: String,
    pub intent: String,
    pub subject: ReferenceValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecimenResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<ReferenceValue>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub specimen_type: Option<CodedConcept>,
}

/// The catch-all variant: a keyed map populated against a declarative field
/// spec rather than a hand-written struct, per the Design Notes. Still
/// R4-field-exact: the spec, not a schema library, names the fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericResource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub meta: ResourceMeta,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// The tagged sum type wrapping every supported resource kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourcePayload {
    Patient(PatientResource),
    Practitioner(PractitionerResource),
    Encounter(EncounterResource),
    Condition(ConditionResource),
    AllergyIntolerance(AllergyIntoleranceResource),
    MedicationRequest(MedicationRequestResource),
    MedicationAdministration(MedicationAdministrationResource),
    MedicationDispense(MedicationDispenseResource),
    MedicationStatement(MedicationStatementResource),
    Observation(ObservationResource),
    Immunization(ImmunizationResource),
    Device(DeviceResource),
    DeviceUseStatement(DeviceUseStatementResource),
    Consent(ConsentResource),
    Procedure(ProcedureResource),
    DiagnosticReport(DiagnosticReportResource),
    CarePlan(CarePlanResource),
    Specimen(SpecimenResource),
    Generic(GenericResource),
}

impl ResourcePayload {
    pub fn kind(&self) -> ResourceKind {
        use ResourcePayload::*;
        match self {
            Patient(_) => ResourceKind::Patient,
            Practitioner(_) => ResourceKind::Practitioner,
            Encounter(_) => ResourceKind::Encounter,
            Condition(_) => ResourceKind::Condition,
            AllergyIntolerance(_) => ResourceKind::AllergyIntolerance,
            MedicationRequest(_) => ResourceKind::MedicationRequest,
            MedicationAdministration(_) => ResourceKind::MedicationAdministration,
            MedicationDispense(_) => ResourceKind::MedicationDispense,
            MedicationStatement(_) => ResourceKind::MedicationStatement,
            Observation(_) => ResourceKind::Observation,
            Immunization(_) => ResourceKind::Immunization,
            Device(_) => ResourceKind::Device,
            DeviceUseStatement(_) => ResourceKind::DeviceUseStatement,
            Consent(_) => ResourceKind::Consent,
            Procedure(_) => ResourceKind::Procedure,
            DiagnosticReport(_) => ResourceKind::DiagnosticReport,
            CarePlan(_) => ResourceKind::CarePlan,
            Specimen(_) => ResourceKind::Specimen,
            Generic(g) => ResourceKind::from_wire_name(&g.resource_type).unwrap_or(ResourceKind::Basic),
        }
    }

    pub fn id(&self) -> &str {
        use ResourcePayload::*;
        match self {
            Patient(r) => &r.id,
            Practitioner(r) => &r.id,
            Encounter(r) => &r.id,
            Condition(r) => &r.id,
            AllergyIntolerance(r) => &r.id,
            MedicationRequest(r) => &r.id,
            MedicationAdministration(r) => &r.id,
            MedicationDispense(r) => &r.id,
            MedicationStatement(r) => &r.id,
            Observation(r) => &r.id,
            Immunization(r) => &r.id,
            Device(r) => &r.id,
            DeviceUseStatement(r) => &r.id,
            Consent(r) => &r.id,
            Procedure(r) => &r.id,
            DiagnosticReport(r) => &r.id,
            CarePlan(r) => &r.id,
            Specimen(r) => &r.id,
            Generic(r) => &r.id,
        }
    }

    /// Convert to the final wire `Value`, using `serde_json`'s own
    /// derived serialization for each variant: never a second, hand-rolled
    /// encoding path that could drift from the struct definitions above.
    pub fn to_wire_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}
