//! External validator submission, retry/backoff, and local structural
//! fallback for the nlforge validation loop.
//!
//! Submission runs in two phases:
//!
//! 1. **External**: the bundle is submitted to [`ExternalValidator::submit`],
//!    wrapped by [`submit_with_retry`]'s retry/backoff policy. A 4xx
//!    response is parsed immediately and never retried; a 5xx or transport
//!    failure is retried with exponential backoff before giving up.
//! 2. **Local fallback**: when the external validator is absent or
//!    unavailable after retries, [`LocalStructuralValidator`] runs a strict
//!    structural check and marks the outcome `degraded = true`.
//!
//! Keeping the external validator behind a narrow trait is a deliberate
//! choice: domain adapters provide the transport, this crate owns the
//! policy.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use nlforge_contracts::{
    bundle::Bundle,
    error::{PipelineError, PipelineResult},
    resource::ResourceKind,
    validation::{Severity, ValidationIssue, ValidationOutcome},
};

/// The outcome of one `submit` attempt against the external validator.
pub enum SubmitAttempt {
    /// 2xx or 4xx: a well-formed response, parsed into issues. Never
    /// retried even when `issues` is non-empty.
    Parsed(Vec<ValidationIssue>),
    /// 5xx: the validator is up but reports a server error. Retried up to
    /// twice before giving up.
    ServerError,
    /// Connection refused, timed out, or otherwise never reached the
    /// validator. Retried up to three times before giving up.
    Transport,
}

/// A remote schema validator submission capability.
///
/// Implementations perform the actual network call; this crate owns the
/// retry policy and the local fallback, not the transport.
pub trait ExternalValidator: Send + Sync {
    fn submit(&self, bundle: &Bundle) -> SubmitAttempt;
}

const BASE_BACKOFF: Duration = Duration::from_millis(200);
const BACKOFF_CAP: Duration = Duration::from_secs(2);
const MAX_TRANSPORT_RETRIES: u32 = 3;
const MAX_SERVER_ERROR_RETRIES: u32 = 2;

/// Submit `bundle` to `validator`, retrying transport failures and 5xx
/// responses per the retry policy. `sleep` is injected so tests can run the
/// policy without real delays.
///
/// Returns `Err(PipelineError::ValidatorUnavailable)` once the retry budget
/// for the failure mode currently being observed is exhausted.
pub fn submit_with_retry(
    validator: &dyn ExternalValidator,
    bundle: &Bundle,
    sleep: &dyn Fn(Duration),
) -> PipelineResult<Vec<ValidationIssue>> {
    let mut transport_attempts: u32 = 0;
    let mut server_error_attempts: u32 = 0;
    let mut backoff = BASE_BACKOFF;

    loop {
        match validator.submit(bundle) {
            SubmitAttempt::Parsed(issues) => return Ok(issues),
            SubmitAttempt::ServerError => {
                server_error_attempts += 1;
                if server_error_attempts > MAX_SERVER_ERROR_RETRIES {
                    warn!("external validator unavailable after server-error retries");
                    return Err(PipelineError::ValidatorUnavailable);
                }
                debug!(attempt = server_error_attempts, "retrying after validator server error");
                sleep(backoff);
                backoff = (backoff * 2).min(BACKOFF_CAP);
            }
            SubmitAttempt::Transport => {
                transport_attempts += 1;
                if transport_attempts > MAX_TRANSPORT_RETRIES {
                    warn!("external validator unavailable after transport retries");
                    return Err(PipelineError::ValidatorUnavailable);
                }
                debug!(attempt = transport_attempts, "retrying after validator transport failure");
                sleep(backoff);
                backoff = (backoff * 2).min(BACKOFF_CAP);
            }
        }
    }
}

/// The minimum top-level R4 fields a dedicated resource kind must carry for
/// the local fallback to consider it structurally sound. Kinds absent from
/// this table (including every `GenericResource` kind) are only checked for
/// a resource-kind discriminator and a non-empty identifier.
fn required_fields_for(kind: ResourceKind) -> &'static [&'static str] {
    match kind {
        ResourceKind::Patient => &[],
        ResourceKind::MedicationRequest => &["medicationCodeableConcept", "subject"],
        ResourceKind::MedicationAdministration => &["medicationCodeableConcept", "subject"],
        ResourceKind::MedicationDispense => &["medicationCodeableConcept", "subject"],
        ResourceKind::MedicationStatement => &["medicationCodeableConcept", "subject"],
        ResourceKind::Observation => &["code", "subject", "status"],
        ResourceKind::Condition => &["code", "subject"],
        ResourceKind::AllergyIntolerance => &["code", "patient"],
        ResourceKind::Immunization => &["vaccineCode", "patient", "status"],
        ResourceKind::Encounter => &["status", "subject"],
        ResourceKind::Procedure => &["code", "subject", "status"],
        ResourceKind::DiagnosticReport => &["code", "subject", "status"],
        ResourceKind::CarePlan => &["subject", "status"],
        ResourceKind::Specimen => &["subject"],
        _ => &[],
    }
}

/// Build the minimal per-kind JSON Schema skeleton the local fallback
/// validates against: a resource-kind discriminator, a non-empty
/// identifier, and whichever top-level fields `required_fields_for` names.
fn skeleton_schema_for(kind: ResourceKind) -> Value {
    let mut required: Vec<Value> = vec![json!("resourceType"), json!("id")];
    required.extend(required_fields_for(kind).iter().map(|f| json!(*f)));

    json!({
        "type": "object",
        "required": required,
        "properties": {
            "resourceType": { "type": "string", "minLength": 1 },
            "id": { "type": "string", "minLength": 1 }
        }
    })
}

/// A strict structural validator run when the remote
/// validator is absent or unavailable.
///
/// Every outcome produced by this validator carries `degraded = true`: a
/// structural pass here never substitutes for the remote validator's
/// ontology and terminology checks.
pub struct LocalStructuralValidator;

impl LocalStructuralValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run the full structural check over `bundle`.
    pub fn validate(&self, bundle: &Bundle) -> ValidationOutcome {
        let mut issues = Vec::new();
        let known_ids: HashSet<String> = bundle
            .entry
            .iter()
            .map(|e| e.resource.kind().wire_name().to_string() + "/" + e.resource.id())
            .collect();

        for entry in &bundle.entry {
            let resource = &entry.resource;
            let short_form = format!("{}/{}", resource.kind().wire_name(), resource.id());

            let wire = match resource.to_wire_json() {
                Ok(v) => v,
                Err(e) => {
                    issues.push(ValidationIssue {
                        severity: Severity::Fatal,
                        issue_kind: "unserializable-resource".to_string(),
                        field_path: short_form.clone(),
                        message: format!("resource could not be serialized: {e}"),
                    });
                    continue;
                }
            };

            let schema = skeleton_schema_for(resource.kind());
            match jsonschema::validator_for(&schema) {
                Ok(validator) => {
                    for error in validator.iter_errors(&wire) {
                        issues.push(ValidationIssue {
                            severity: Severity::Error,
                            issue_kind: "missing-required-field".to_string(),
                            field_path: format!("{short_form}{}", error.instance_path),
                            message: error.to_string(),
                        });
                    }
                }
                Err(e) => {
                    issues.push(ValidationIssue {
                        severity: Severity::Fatal,
                        issue_kind: "invalid-skeleton-schema".to_string(),
                        field_path: short_form.clone(),
                        message: format!("skeleton schema did not compile: {e}"),
                    });
                }
            }

            collect_dangling_references(&wire, &short_form, &known_ids, &mut issues);
        }

        ValidationOutcome {
            issues,
            degraded: true,
        }
    }
}

impl Default for LocalStructuralValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk `value` looking for `{"reference": "Kind/id"}` objects and flag any
/// whose target is not present among `known_ids`.
fn collect_dangling_references(
    value: &Value,
    short_form: &str,
    known_ids: &HashSet<String>,
    issues: &mut Vec<ValidationIssue>,
) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("reference") {
                if !target.starts_with("urn:") && !known_ids.contains(target) {
                    issues.push(ValidationIssue {
                        severity: Severity::Error,
                        issue_kind: "unresolved-reference".to_string(),
                        field_path: short_form.to_string(),
                        message: format!("reference '{target}' does not resolve within the bundle"),
                    });
                }
            }
            for v in map.values() {
                collect_dangling_references(v, short_form, known_ids, issues);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_dangling_references(v, short_form, known_ids, issues);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use nlforge_contracts::{
        bundle::{Bundle, BundleEntry, BundleKind},
        reference::{Reference, ReferenceValue},
        resource::{
            ConditionResource, PatientResource, ResourceKind, ResourceMeta, ResourcePayload,
        },
    };

    use super::*;

    fn patient(id: &str) -> ResourcePayload {
        ResourcePayload::Patient(PatientResource {
            resource_type: "Patient".to_string(),
            id: id.to_string(),
            meta: ResourceMeta::new("patient-factory", Utc::now()),
            birth_date: Some("1990-01-01".to_string()),
            gender: None,
            name: vec![],
        })
    }

    fn condition(id: &str, subject_id: &str) -> ResourcePayload {
        ResourcePayload::Condition(ConditionResource {
            resource_type: "Condition".to_string(),
            id: id.to_string(),
            meta: ResourceMeta::new("condition-factory", Utc::now()),
            code: nlforge_contracts::coding::CodedConcept::text_only("hypertension"),
            subject: ReferenceValue::from(&Reference::new(ResourceKind::Patient, subject_id)),
            clinical_status: None,
        })
    }

    fn bundle(entries: Vec<ResourcePayload>) -> Bundle {
        let entry = entries
            .into_iter()
            .map(|resource| BundleEntry {
                full_url: format!("urn:uuid:{}", resource.id()),
                resource,
            })
            .collect();
        Bundle::new(BundleKind::Transaction, entry, Utc::now())
    }

    struct ScriptedValidator {
        responses: std::sync::Mutex<Vec<SubmitAttempt>>,
    }

    impl ExternalValidator for ScriptedValidator {
        fn submit(&self, _bundle: &Bundle) -> SubmitAttempt {
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn scripted(responses: Vec<SubmitAttempt>) -> ScriptedValidator {
        ScriptedValidator {
            responses: std::sync::Mutex::new(responses),
        }
    }

    #[test]
    fn succeeds_immediately_on_first_success() {
        let validator = scripted(vec![SubmitAttempt::Parsed(vec![])]);
        let b = bundle(vec![patient("p1")]);
        let issues = submit_with_retry(&validator, &b, &|_| {}).unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn retries_transport_failures_then_succeeds() {
        let validator = scripted(vec![
            SubmitAttempt::Transport,
            SubmitAttempt::Transport,
            SubmitAttempt::Parsed(vec![]),
        ]);
        let b = bundle(vec![patient("p1")]);
        let sleeps = std::cell::Cell::new(0);
        let issues = submit_with_retry(&validator, &b, &|_| sleeps.set(sleeps.get() + 1)).unwrap();
        assert!(issues.is_empty());
        assert_eq!(sleeps.get(), 2);
    }

    #[test]
    fn gives_up_after_exhausting_transport_retries() {
        let validator = scripted(vec![
            SubmitAttempt::Transport,
            SubmitAttempt::Transport,
            SubmitAttempt::Transport,
            SubmitAttempt::Transport,
        ]);
        let b = bundle(vec![patient("p1")]);
        let result = submit_with_retry(&validator, &b, &|_| {});
        assert!(matches!(result, Err(PipelineError::ValidatorUnavailable)));
    }

    #[test]
    fn gives_up_after_two_server_errors() {
        let validator = scripted(vec![
            SubmitAttempt::ServerError,
            SubmitAttempt::ServerError,
            SubmitAttempt::ServerError,
        ]);
        let b = bundle(vec![patient("p1")]);
        let result = submit_with_retry(&validator, &b, &|_| {});
        assert!(matches!(result, Err(PipelineError::ValidatorUnavailable)));
    }

    #[test]
    fn does_not_retry_a_4xx_style_parsed_response_with_issues() {
        let validator = scripted(vec![SubmitAttempt::Parsed(vec![ValidationIssue {
            severity: Severity::Error,
            issue_kind: "bad-request".to_string(),
            field_path: "Patient.0".to_string(),
            message: "malformed request".to_string(),
        }])]);
        let b = bundle(vec![patient("p1")]);
        let issues = submit_with_retry(&validator, &b, &|_| {}).unwrap();
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn local_fallback_flags_unresolved_reference() {
        let validator = LocalStructuralValidator::new();
        let b = bundle(vec![ResourcePayload::MedicationRequest(
            nlforge_contracts::resource::MedicationRequestResource {
                resource_type: "MedicationRequest".to_string(),
                id: "mr1".to_string(),
                meta: ResourceMeta::new("medication-request-factory", Utc::now()),
                status: "active".to_string(),
                intent: "order".to_string(),
                medication_codeable_concept: nlforge_contracts::coding::CodedConcept::text_only(
                    "lisinopril",
                ),
                subject: ReferenceValue::from(&Reference::new(ResourceKind::Patient, "missing")),
                dosage_instruction: vec![],
            },
        )]);

        let outcome = validator.validate(&b);

        assert!(outcome.degraded);
        assert!(outcome
            .issues
            .iter()
            .any(|i| i.issue_kind == "unresolved-reference"));
    }

    #[test]
    fn local_fallback_passes_a_well_formed_bundle() {
        let validator = LocalStructuralValidator::new();
        let b = bundle(vec![patient("p1"), condition("c1", "p1")]);

        let outcome = validator.validate(&b);

        assert!(outcome.degraded);
        assert!(outcome.issues.is_empty(), "unexpected issues: {:?}", outcome.issues);
    }
}
