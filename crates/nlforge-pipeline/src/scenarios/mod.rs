//! Runnable, literal-input demonstrations of the pipeline's end-to-end
//! behaviour.
//!
//! Each function here exercises a single published scenario against a real
//! `ClinicalPipeline` (or, where the scenario is not itself an order-text
//! request, against the bundle assembler directly) and returns a small
//! summary the demo binary prints. The literal inputs and expected shapes
//! mirror the ones used in the pipeline's own test suite.

use chrono::Utc;

use nlforge_contracts::bundle::{Bundle, BundleKind};
use nlforge_contracts::coding::CodedConcept;
use nlforge_contracts::error::PipelineResult;
use nlforge_contracts::reference::{Reference, ReferenceValue};
use nlforge_contracts::resource::{
    ConditionResource, ResourceKind, ResourceMeta, ResourcePayload,
};
use nlforge_core::traits::ResourceFactory;

use crate::bundle::{assemble, AssemblyInput};
use crate::factory::consent::ConsentResourceFactory;
use crate::pipeline::{CancellationToken, ClinicalPipeline, ClinicalRequest, PipelineOutcome};
use crate::reference_allocator::ReferenceAllocator;

fn demo_subject() -> Reference {
    Reference::new(ResourceKind::Patient, "demo-patient")
}

fn demo_pipeline() -> PipelineResult<ClinicalPipeline> {
    ClinicalPipeline::new(nlforge_config::PipelineConfig {
        tier4_enabled: true,
        max_input_chars: 20_000,
        per_request_cost_ceiling: 10.0,
        per_request_timeout_ms: 2_000,
        external_validator_url: String::new(),
        tolerant_mode: false,
        max_concurrent_requests: 8,
        cache_capacity: 256,
        tier_thresholds: Vec::new(),
    })
}

/// Scenario 1: a prescription with a daily frequency, plus its condition.
pub async fn run_prescription_scenario() -> PipelineResult<PipelineOutcome> {
    let pipeline = demo_pipeline()?;
    let request = ClinicalRequest::new("Prescribe 10mg Lisinopril daily for hypertension", demo_subject());
    pipeline.run_request(request, &CancellationToken::new()).await
}

/// Scenario 2: clustered vital signs plus a medication administration.
/// No device is named, so no device-use statement is expected.
pub async fn run_vitals_scenario() -> PipelineResult<PipelineOutcome> {
    let pipeline = demo_pipeline()?;
    let request = ClinicalRequest::new("BP 110/70, HR 68, SpO2 97% during morphine infusion", demo_subject());
    pipeline.run_request(request, &CancellationToken::new()).await
}

/// Scenario 3: a prescription that collides with a recorded allergy.
/// `tolerant` selects whether the blocking finding aborts the request or
/// is attached to the returned outcome.
pub async fn run_allergy_contraindication_scenario(tolerant: bool) -> PipelineResult<PipelineOutcome> {
    let config = nlforge_config::PipelineConfig {
        tier4_enabled: true,
        max_input_chars: 20_000,
        per_request_cost_ceiling: 10.0,
        per_request_timeout_ms: 2_000,
        external_validator_url: String::new(),
        tolerant_mode: tolerant,
        max_concurrent_requests: 8,
        cache_capacity: 256,
        tier_thresholds: Vec::new(),
    };
    let pipeline = ClinicalPipeline::new(config)?;
    let request = ClinicalRequest::new(
        "Prescribe amoxicillin 500mg three times daily for infection",
        demo_subject(),
    )
    .with_known_allergies(vec!["penicillin".to_string()]);
    pipeline.run_request(request, &CancellationToken::new()).await
}

/// Scenario 4: a standalone consent-capture event, not derived from any
/// order text. Exercises the R4-field-name boundary the `Consent` factory
/// pins exactly.
pub fn run_consent_capture_scenario() -> PipelineResult<Bundle> {
    let subject = demo_subject();
    let mut allocator = ReferenceAllocator::new();
    let mut allocate = allocator.allocate_for(ResourceKind::Consent);
    let payload = ConsentResourceFactory.build(&[], &subject, &mut allocate)?;
    drop(allocate);

    let mut input = AssemblyInput::new(payload);
    input.external_refs.push(subject);
    assemble(vec![input], BundleKind::Collection, Utc::now())
}

/// Scenario 5: two payloads whose references form a mutual cycle. Expected
/// to fail with `CycleDetected`, naming both participants.
pub fn run_cycle_detection_scenario() -> PipelineResult<Bundle> {
    let a = ResourcePayload::Condition(ConditionResource {
        resource_type: ResourceKind::Condition.wire_name().to_string(),
        id: "a".to_string(),
        meta: ResourceMeta::new("condition-factory", Utc::now()),
        code: CodedConcept::text_only("condition a"),
        subject: ReferenceValue::from(&Reference::new(ResourceKind::Condition, "b")),
        clinical_status: None,
    });
    let b = ResourcePayload::Condition(ConditionResource {
        resource_type: ResourceKind::Condition.wire_name().to_string(),
        id: "b".to_string(),
        meta: ResourceMeta::new("condition-factory", Utc::now()),
        code: CodedConcept::text_only("condition b"),
        subject: ReferenceValue::from(&Reference::new(ResourceKind::Condition, "a")),
        clinical_status: None,
    });
    assemble(
        vec![AssemblyInput::new(a), AssemblyInput::new(b)],
        BundleKind::Transaction,
        Utc::now(),
    )
}

/// Scenario 6: an ambiguous input with the cost ceiling set to zero. Tier 4
/// never runs; whatever tier 3 confirmed is what the bundle is built from,
/// with a `budget-halt` warning attached instead of a hard failure.
pub async fn run_budget_halt_scenario() -> PipelineResult<PipelineOutcome> {
    let config = nlforge_config::PipelineConfig {
        tier4_enabled: true,
        max_input_chars: 20_000,
        per_request_cost_ceiling: 0.0,
        per_request_timeout_ms: 2_000,
        external_validator_url: String::new(),
        tolerant_mode: false,
        max_concurrent_requests: 8,
        cache_capacity: 256,
        tier_thresholds: Vec::new(),
    };
    let pipeline = ClinicalPipeline::new(config)?;
    let request = ClinicalRequest::new("Evaluate the patient's condition thoroughly", demo_subject());
    pipeline.run_request(request, &CancellationToken::new()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn block_on<F: Future>(mut fut: F) -> F::Output {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            noop_raw_waker()
        }
        fn noop_raw_waker() -> RawWaker {
            static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        let waker = unsafe { Waker::from_raw(noop_raw_waker()) };
        let mut cx = Context::from_waker(&waker);
        let mut fut = unsafe { std::pin::Pin::new_unchecked(&mut fut) };
        loop {
            if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
                return out;
            }
        }
    }

    #[test]
    fn prescription_scenario_succeeds() {
        let outcome = block_on(run_prescription_scenario()).unwrap();
        assert!(!outcome.bundle.entry.is_empty());
        assert!(!outcome.validation.has_blocking_issue());
    }

    #[test]
    fn vitals_scenario_succeeds() {
        let outcome = block_on(run_vitals_scenario()).unwrap();
        assert!(!outcome.bundle.entry.is_empty());
    }

    #[test]
    fn allergy_scenario_fails_closed_without_tolerant_mode() {
        let result = block_on(run_allergy_contraindication_scenario(false));
        assert!(result.is_err());
    }

    #[test]
    fn allergy_scenario_attaches_the_finding_in_tolerant_mode() {
        let outcome = block_on(run_allergy_contraindication_scenario(true)).unwrap();
        assert!(outcome.validation.issues.iter().any(|i| i.issue_kind == "allergy-contraindication"));
    }

    #[test]
    fn consent_capture_scenario_pins_the_r4_field_names() {
        let bundle = run_consent_capture_scenario().unwrap();
        assert_eq!(bundle.entry.len(), 1);
        let wire = bundle.entry[0].resource.to_wire_json().unwrap();
        assert_eq!(wire["resourceType"], "Consent");
        assert_eq!(wire["policyRule"]["coding"][0]["code"], "OPTIN");
        assert!(wire["provision"].is_object());
    }

    #[test]
    fn cycle_detection_scenario_fails_naming_both_participants() {
        let result = run_cycle_detection_scenario();
        match result {
            Err(nlforge_contracts::error::PipelineError::CycleDetected { participants }) => {
                assert_eq!(participants.len(), 2);
            }
            _ => panic!("expected CycleDetected"),
        }
    }

    #[test]
    fn budget_halt_scenario_attaches_a_warning_without_failing() {
        let outcome = block_on(run_budget_halt_scenario()).unwrap();
        assert!(outcome.validation.issues.iter().any(|i| i.issue_kind == "budget-halt"));
    }
}
