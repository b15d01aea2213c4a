//! The runtime orchestrator: wires extraction, coding, resource factories,
//! bundle assembly, and the validation loop into one `run_request` call per
//! clinical order or observation record.
//!
//! Per request, this module:
//!
//! 1. Extracts entities from free text through the four-tier escalation
//!    ladder (`nlforge_core::TierExecutor`).
//! 2. Builds patient-record context resources (`Patient`, known allergies)
//!    directly from caller-supplied facts, never from tier extraction.
//! 3. Dispatches extracted entities to the matching resource factories,
//!    grouping vital-sign entities and choosing the medication verb's
//!    resource kind.
//! 4. Assembles the bundle (reference resolution, cycle detection, the
//!    kind-priority topological sort).
//! 5. Runs the safety-then-validate loop and merges the combined outcome.
//!
//! A `ReferenceAllocator` and an `InMemoryAuditWriter` are constructed fresh
//! per request; the registry, terminology coder, and tier implementations
//! are constructed once and shared across every request the runtime serves.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use nlforge_audit::{AuditEventKind, AuditSink, InMemoryAuditWriter};
use nlforge_config::PipelineConfig;
use nlforge_contracts::{
    bundle::{Bundle, BundleKind},
    entity::{ClinicalEntity, EntityKind, Span, Tier},
    error::{PipelineError, PipelineResult},
    reference::Reference,
    request::RequestCorrelationToken,
    resource::{ResourceKind, ResourcePayload},
    validation::{Severity, ValidationIssue, ValidationOutcome},
};
use nlforge_core::executor::TierExecutor;
use nlforge_core::traits::{ResourceFactory, TerminologyCoder};
use nlforge_safety::{SafetyEngine, SafetyTables};
use nlforge_validate::ExternalValidator;

use crate::bundle::{assemble, AssemblyInput};
use crate::extract::{
    detect_required_kinds, ClinicalThresholdGate, ExternalEntityModel, ExternalModelTier, PatternMatcherTier,
    RegexFallbackTier, SequenceTaggerTier, StubExternalModel,
};
use crate::factory::FactoryRegistry;
use crate::reference_allocator::ReferenceAllocator;
use crate::terminology::ClinicalTerminologyCoder;
use crate::validation_loop::run_validation_loop;

/// A cooperative cancellation flag: checked between pipeline stages, never
/// forcibly preempting work in progress.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One order-text-to-bundle request.
///
/// `known_allergies` and `include_subject_resource` describe patient-record
/// facts the caller already holds; they are never inferred from
/// `order_text`.
pub struct ClinicalRequest {
    pub order_text: String,
    pub subject: Reference,
    pub known_allergies: Vec<String>,
    pub include_subject_resource: bool,
    pub bundle_kind: BundleKind,
}

impl ClinicalRequest {
    pub fn new(order_text: impl Into<String>, subject: Reference) -> Self {
        Self {
            order_text: order_text.into(),
            subject,
            known_allergies: Vec::new(),
            include_subject_resource: true,
            bundle_kind: BundleKind::Transaction,
        }
    }

    pub fn with_known_allergies(mut self, allergies: Vec<String>) -> Self {
        self.known_allergies = allergies;
        self
    }

    pub fn without_subject_resource(mut self) -> Self {
        self.include_subject_resource = false;
        self
    }

    pub fn as_collection(mut self) -> Self {
        self.bundle_kind = BundleKind::Collection;
        self
    }
}

/// The result of a completed request: the assembled bundle, the combined
/// validation outcome, and the request's sealed audit log.
pub struct PipelineOutcome {
    pub bundle: Bundle,
    pub validation: ValidationOutcome,
    pub audit_log: nlforge_audit::AuditLog,
}

/// Everything a running deployment needs built once: the factory registry,
/// the shared terminology coder, the tier implementations, the safety
/// engine, and the concurrency back-pressure counter.
pub struct ClinicalPipeline {
    config: PipelineConfig,
    registry: FactoryRegistry,
    tier4_model: Arc<dyn ExternalEntityModel>,
    safety: SafetyEngine,
    external_validator: Option<Arc<dyn ExternalValidator>>,
    in_flight: Arc<AtomicUsize>,
}

impl ClinicalPipeline {
    /// Build a runtime from `config`. The terminology coder and factory
    /// registry are constructed once here and shared by every request;
    /// tier 4 defaults to the bundled deterministic stub since no real
    /// network client ships in the core.
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        let coder: Arc<dyn TerminologyCoder> = Arc::new(ClinicalTerminologyCoder::new(config.cache_capacity));
        let registry = FactoryRegistry::new(coder);
        let safety = SafetyEngine::new(SafetyTables::embedded()?);

        Ok(Self {
            config,
            registry,
            tier4_model: Arc::new(StubExternalModel),
            safety,
            external_validator: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Replace the tier 4 external entity model (e.g. with a real network
    /// client's adapter).
    pub fn with_tier4_model(mut self, model: Arc<dyn ExternalEntityModel>) -> Self {
        self.tier4_model = model;
        self
    }

    /// Attach an external FHIR schema validator. Absent by default, which
    /// makes every request fall back to the local structural check.
    pub fn with_external_validator(mut self, validator: Arc<dyn ExternalValidator>) -> Self {
        self.external_validator = Some(validator);
        self
    }

    /// Run one request end to end. Rejects immediately with
    /// `BackPressureReject` if `max_concurrent_requests` in-flight requests
    /// are already running; never queues.
    pub async fn run_request(&self, request: ClinicalRequest, cancel: &CancellationToken) -> PipelineResult<PipelineOutcome> {
        let _permit = self.acquire_permit()?;

        let correlation = RequestCorrelationToken::new();
        let audit = InMemoryAuditWriter::new(correlation);
        let started = Instant::now();

        let result = self.run_request_inner(&request, cancel, &audit, started).await;

        match &result {
            Ok(_) => audit.record(AuditEventKind::RequestCompleted)?,
            Err(err) => audit.record(AuditEventKind::RequestFailed {
                error_kind: error_kind_label(err).to_string(),
            })?,
        }
        audit.finalize()?;

        let bundle_and_validation = result?;
        Ok(PipelineOutcome {
            bundle: bundle_and_validation.0,
            validation: bundle_and_validation.1,
            audit_log: audit.export_log(),
        })
    }

    fn acquire_permit(&self) -> PipelineResult<RequestPermit> {
        loop {
            let current = self.in_flight.load(Ordering::SeqCst);
            if current >= self.config.max_concurrent_requests {
                return Err(PipelineError::BackPressureReject);
            }
            if self
                .in_flight
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(RequestPermit { in_flight: self.in_flight.clone() });
            }
        }
    }

    fn check_deadline(&self, started: Instant) -> PipelineResult<()> {
        if started.elapsed().as_millis() as u64 > self.config.per_request_timeout_ms {
            return Err(PipelineError::Timeout);
        }
        Ok(())
    }

    fn check_cancelled(&self, cancel: &CancellationToken) -> PipelineResult<()> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    async fn run_request_inner(
        &self,
        request: &ClinicalRequest,
        cancel: &CancellationToken,
        audit: &dyn AuditSink,
        started: Instant,
    ) -> PipelineResult<(Bundle, ValidationOutcome)> {
        audit.record(AuditEventKind::RequestReceived {
            input_length: request.order_text.len(),
        })?;

        if request.order_text.len() > self.config.max_input_chars {
            return Err(PipelineError::InputTooLarge);
        }

        let tier_state = self.extract(&request.order_text, &correlation_for(audit), audit)?;
        self.check_cancelled(cancel)?;
        self.check_deadline(started)?;

        let mut allocator = ReferenceAllocator::new();
        let mut tolerant_issues = Vec::new();
        let mut entries = Vec::new();

        if tier_state.had_budget_halt() {
            tolerant_issues.push(ValidationIssue {
                severity: Severity::Warning,
                issue_kind: "budget-halt".to_string(),
                field_path: "extraction".to_string(),
                message: "escalation halted at the cost ceiling before every required entity kind was confirmed".to_string(),
            });
        }

        if request.include_subject_resource {
            self.invoke_factory(
                ResourceKind::Patient,
                &[],
                request,
                &mut allocator,
                audit,
                &mut tolerant_issues,
                &mut entries,
            )?;
        }

        for allergy in &request.known_allergies {
            let entity = ClinicalEntity::new(
                EntityKind::AllergySubstance,
                Span { start: 0, end: allergy.len() },
                allergy.clone(),
                1.0,
                Tier::Tier1Pattern,
            );
            self.invoke_factory(
                ResourceKind::AllergyIntolerance,
                &[entity],
                request,
                &mut allocator,
                audit,
                &mut tolerant_issues,
                &mut entries,
            )?;
        }

        self.build_from_entities(&tier_state.entities, &request.order_text, request, &mut allocator, audit, &mut tolerant_issues, &mut entries)?;

        self.check_cancelled(cancel)?;
        self.check_deadline(started)?;

        for stub in allocator.take_stubs() {
            entries.push(AssemblyInput::new(stub.payload));
        }

        if !request.include_subject_resource {
            for entry in &mut entries {
                entry.external_refs.push(request.subject.clone());
            }
        }

        let bundle = assemble(entries, request.bundle_kind, Utc::now())?;
        audit.record(AuditEventKind::BundleAssembled { entry_count: bundle.entry.len() })?;

        self.check_cancelled(cancel)?;
        self.check_deadline(started)?;

        let sleep = |d: std::time::Duration| std::thread::sleep(d);
        let mut outcome = run_validation_loop(
            &bundle,
            &request.subject,
            Utc::now(),
            &self.safety,
            self.external_validator.as_deref(),
            &sleep,
            audit,
        )?;
        outcome.merge(ValidationOutcome {
            issues: tolerant_issues,
            degraded: false,
        });

        if !self.config.tolerant_mode && outcome.has_blocking_issue() {
            return Err(PipelineError::InvalidInput {
                factory: "validation-loop".to_string(),
                reason: "bundle carries a blocking validation or safety issue".to_string(),
            });
        }

        Ok((bundle, outcome))
    }

    fn extract(&self, text: &str, correlation: &RequestCorrelationToken, audit: &dyn AuditSink) -> PipelineResult<nlforge_contracts::tier_state::TierState> {
        let required_kinds = detect_required_kinds(text);
        let gate = ClinicalThresholdGate::with_overrides(required_kinds.clone(), self.config.tier_thresholds.clone());

        let mut tiers: Vec<Box<dyn nlforge_core::traits::ExtractionTier>> =
            vec![Box::new(PatternMatcherTier), Box::new(SequenceTaggerTier::default()), Box::new(RegexFallbackTier)];
        if self.config.tier4_enabled {
            tiers.push(Box::new(ExternalModelTier::new(self.tier4_model.clone(), required_kinds)));
        }

        let executor = TierExecutor::new(tiers, Box::new(gate), self.config.per_request_cost_ceiling);
        let state = executor.run(text, correlation)?;

        for step in &state.steps {
            audit.record(AuditEventKind::TierEscalated {
                tier_ordinal: step.tier.ordinal(),
                cumulative_cost: state.cumulative_cost,
                budget_halt: step.budget_halt,
            })?;
        }

        Ok(state)
    }

    #[allow(clippy::too_many_arguments)]
    fn invoke_factory(
        &self,
        kind: ResourceKind,
        entities: &[ClinicalEntity],
        request: &ClinicalRequest,
        allocator: &mut ReferenceAllocator,
        audit: &dyn AuditSink,
        tolerant_issues: &mut Vec<ValidationIssue>,
        entries: &mut Vec<AssemblyInput>,
    ) -> PipelineResult<()> {
        let Some(factory) = self.registry.factory_for(kind) else {
            return Err(PipelineError::UnknownResourceKind { kind: kind.wire_name().to_string() });
        };

        audit.record(AuditEventKind::ResourceFactoryInvoked { kind })?;

        let mut allocate = allocator.allocate_for(kind);
        match factory.build(entities, &request.subject, &mut allocate) {
            Ok(payload) => {
                entries.push(AssemblyInput::new(payload));
                Ok(())
            }
            Err(err @ PipelineError::InvalidInput { .. }) if self.config.tolerant_mode => {
                tolerant_issues.push(ValidationIssue {
                    severity: Severity::Warning,
                    issue_kind: "invalid-input".to_string(),
                    field_path: kind.wire_name().to_string(),
                    message: err.to_string(),
                });
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_from_entities(
        &self,
        entities: &[ClinicalEntity],
        order_text: &str,
        request: &ClinicalRequest,
        allocator: &mut ReferenceAllocator,
        audit: &dyn AuditSink,
        tolerant_issues: &mut Vec<ValidationIssue>,
        entries: &mut Vec<AssemblyInput>,
    ) -> PipelineResult<()> {
        if entities.iter().any(|e| e.kind == EntityKind::Medication) {
            let kind = medication_resource_kind(order_text);
            self.invoke_factory(kind, entities, request, allocator, audit, tolerant_issues, entries)?;
        }

        for condition in entities.iter().filter(|e| e.kind == EntityKind::Condition) {
            self.invoke_factory(
                ResourceKind::Condition,
                std::slice::from_ref(condition),
                request,
                allocator,
                audit,
                tolerant_issues,
                entries,
            )?;
        }

        for group in group_vital_entities(entities) {
            self.invoke_factory(ResourceKind::Observation, &group, request, allocator, audit, tolerant_issues, entries)?;
        }

        if entities.iter().any(|e| e.kind == EntityKind::Device) {
            self.invoke_factory(ResourceKind::Device, entities, request, allocator, audit, tolerant_issues, entries)?;
            self.invoke_factory(ResourceKind::DeviceUseStatement, &[], request, allocator, audit, tolerant_issues, entries)?;
        }

        for vaccine in entities.iter().filter(|e| e.kind == EntityKind::Vaccine) {
            self.invoke_factory(
                ResourceKind::Immunization,
                std::slice::from_ref(vaccine),
                request,
                allocator,
                audit,
                tolerant_issues,
                entries,
            )?;
        }

        for procedure in entities.iter().filter(|e| e.kind == EntityKind::Procedure) {
            self.invoke_factory(
                ResourceKind::Procedure,
                std::slice::from_ref(procedure),
                request,
                allocator,
                audit,
                tolerant_issues,
                entries,
            )?;
        }

        if entities.iter().any(|e| e.kind == EntityKind::LabTest) {
            self.invoke_factory(ResourceKind::DiagnosticReport, entities, request, allocator, audit, tolerant_issues, entries)?;
        }

        Ok(())
    }
}

/// Drops the in-flight counter back down when a request finishes, however
/// it finishes.
struct RequestPermit {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for RequestPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn correlation_for(_audit: &dyn AuditSink) -> RequestCorrelationToken {
    RequestCorrelationToken::new()
}

fn error_kind_label(err: &PipelineError) -> &'static str {
    match err {
        PipelineError::InputTooLarge => "input-too-large",
        PipelineError::ExtractionFailed => "extraction-failed",
        PipelineError::UnknownResourceKind { .. } => "unknown-resource-kind",
        PipelineError::InvalidInput { .. } => "invalid-input",
        PipelineError::CodingUnresolvable { .. } => "coding-unresolvable",
        PipelineError::UnresolvedReference { .. } => "unresolved-reference",
        PipelineError::CycleDetected { .. } => "cycle-detected",
        PipelineError::ValidatorUnavailable => "validator-unavailable",
        PipelineError::BackPressureReject => "back-pressure-reject",
        PipelineError::Timeout => "timeout",
        PipelineError::ConfigError { .. } => "config-error",
        PipelineError::Cancelled => "cancelled",
        PipelineError::AuditWriteFailed { .. } => "audit-write-failed",
    }
}

/// Which medication-bearing resource kind an order's verb implies.
/// "Administer"/"infusion" describes an event already carried out, not an
/// order, so it never routes to `MedicationRequest`.
fn medication_resource_kind(order_text: &str) -> ResourceKind {
    let lower = order_text.to_lowercase();
    if lower.contains("infusion") || lower.contains("administer") {
        ResourceKind::MedicationAdministration
    } else if lower.contains("dispense") {
        ResourceKind::MedicationDispense
    } else if lower.contains("prescribe") {
        ResourceKind::MedicationRequest
    } else {
        ResourceKind::MedicationStatement
    }
}

/// Pairs systolic/diastolic vital-sign entities into one group (one
/// `Observation` with two components); every other vital sign is its own
/// single-entity group.
fn group_vital_entities(entities: &[ClinicalEntity]) -> Vec<Vec<ClinicalEntity>> {
    let is_systolic = |e: &&ClinicalEntity| e.normalized.to_lowercase().contains("systolic");
    let is_diastolic = |e: &&ClinicalEntity| e.normalized.to_lowercase().contains("diastolic");

    let vitals: Vec<&ClinicalEntity> = entities.iter().filter(|e| e.kind == EntityKind::VitalSign).collect();

    let mut groups = Vec::new();
    let systolic = vitals.iter().find(|e| is_systolic(e));
    let diastolic = vitals.iter().find(|e| is_diastolic(e));
    if let (Some(sys), Some(dia)) = (systolic, diastolic) {
        groups.push(vec![(*sys).clone(), (*dia).clone()]);
    }

    for vital in vitals.iter().filter(|e| !is_systolic(e) && !is_diastolic(e)) {
        groups.push(vec![(*vital).clone()]);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlforge_config::{EntityKindName, RequiredEntity, TierName, TierThreshold};
    use std::future::Future;
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    /// Drives a future to completion without an async runtime. `run_request`
    /// never suspends on a real executor (its external calls are plain
    /// synchronous trait calls), so a single poll always returns `Ready`;
    /// this loop exists only to give the tests somewhere to call `.await`.
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

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            tier4_enabled: true,
            max_input_chars: 20_000,
            per_request_cost_ceiling: 10.0,
            per_request_timeout_ms: 5_000,
            external_validator_url: String::new(),
            tolerant_mode: false,
            max_concurrent_requests: 4,
            cache_capacity: 64,
            tier_thresholds: vec![RequiredEntity {
                kind: EntityKindName::Medication,
                thresholds: vec![TierThreshold {
                    tier: TierName::Tier1Pattern,
                    weighted_min_confidence: 0.85,
                }],
            }],
        }
    }

    #[test]
    fn prescription_scenario_produces_a_medication_request_and_a_condition() {
        block_on(async {
            let pipeline = ClinicalPipeline::new(test_config()).unwrap();
            let subject = Reference::new(ResourceKind::Patient, "p1");
            let request = ClinicalRequest::new("Prescribe 10mg Lisinopril daily for hypertension", subject);

            let outcome = pipeline.run_request(request, &CancellationToken::new()).await.unwrap();

            let kinds: Vec<ResourceKind> = outcome.bundle.entry.iter().map(|e| e.resource.kind()).collect();
            assert!(kinds.contains(&ResourceKind::MedicationRequest));
            assert!(kinds.contains(&ResourceKind::Condition));
            assert!(kinds.contains(&ResourceKind::Patient));
        })
    }

    #[test]
    fn vitals_scenario_groups_blood_pressure_into_one_observation() {
        block_on(async {
            let pipeline = ClinicalPipeline::new(test_config()).unwrap();
            let subject = Reference::new(ResourceKind::Patient, "p1");
            let request = ClinicalRequest::new("BP 110/70, HR 68, SpO2 97% during morphine infusion", subject);

            let outcome = pipeline.run_request(request, &CancellationToken::new()).await.unwrap();

            let observation_count = outcome.bundle.entry.iter().filter(|e| e.resource.kind() == ResourceKind::Observation).count();
            assert_eq!(observation_count, 3);
            let has_device_use = outcome
                .bundle
                .entry
                .iter()
                .any(|e| e.resource.kind() == ResourceKind::DeviceUseStatement);
            assert!(!has_device_use, "no device named, so no device-use statement is expected");
        })
    }

    #[test]
    fn allergy_vs_contraindicated_prescription_is_fatal_outside_tolerant_mode() {
        block_on(async {
            let pipeline = ClinicalPipeline::new(test_config()).unwrap();
            let subject = Reference::new(ResourceKind::Patient, "p1");
            let request = ClinicalRequest::new(
                "Prescribe amoxicillin 500mg three times daily for infection",
                subject,
            )
            .with_known_allergies(vec!["penicillin".to_string()]);

            let result = pipeline.run_request(request, &CancellationToken::new()).await;
            assert!(result.is_err());
        })
    }

    #[test]
    fn allergy_vs_contraindicated_prescription_is_attached_in_tolerant_mode() {
        block_on(async {
            let mut config = test_config();
            config.tolerant_mode = true;
            let pipeline = ClinicalPipeline::new(config).unwrap();
            let subject = Reference::new(ResourceKind::Patient, "p1");
            let request = ClinicalRequest::new(
                "Prescribe amoxicillin 500mg three times daily for infection",
                subject,
            )
            .with_known_allergies(vec!["penicillin".to_string()]);

            let outcome = pipeline.run_request(request, &CancellationToken::new()).await.unwrap();
            assert!(outcome.validation.issues.iter().any(|i| i.issue_kind == "allergy-contraindication"));
        })
    }

    #[test]
    fn budget_halt_with_zero_cost_ceiling_attaches_a_warning_without_failing() {
        block_on(async {
            let mut config = test_config();
            config.per_request_cost_ceiling = 0.0;
            let pipeline = ClinicalPipeline::new(config).unwrap();
            let subject = Reference::new(ResourceKind::Patient, "p1");
            let request = ClinicalRequest::new("Evaluate the patient's condition thoroughly", subject);

            let outcome = pipeline.run_request(request, &CancellationToken::new()).await.unwrap();
            assert!(outcome.validation.issues.iter().any(|i| i.issue_kind == "budget-halt"));
            assert!(!outcome.validation.has_blocking_issue());
        })
    }

    #[test]
    fn back_pressure_rejects_once_the_concurrency_limit_is_saturated() {
        block_on(async {
            let mut config = test_config();
            config.max_concurrent_requests = 0;
            let pipeline = ClinicalPipeline::new(config).unwrap();
            let subject = Reference::new(ResourceKind::Patient, "p1");
            let request = ClinicalRequest::new("Prescribe 10mg Lisinopril daily for hypertension", subject);

            let result = pipeline.run_request(request, &CancellationToken::new()).await;
            assert!(matches!(result, Err(PipelineError::BackPressureReject)));
        })
    }
}
