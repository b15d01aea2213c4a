//! Wires the cross-resource safety layer, the external/local validation
//! loop, and the audit sink into one combined outcome per request.

use chrono::{DateTime, Utc};

use nlforge_audit::{AuditEventKind, AuditSink};
use nlforge_contracts::{
    bundle::Bundle,
    error::PipelineResult,
    reference::Reference,
    validation::{ValidationIssue, ValidationOutcome},
};
use nlforge_safety::SafetyEngine;
use nlforge_validate::{submit_with_retry, ExternalValidator, LocalStructuralValidator};

/// Run the full validation loop over an assembled `bundle`:
///
/// 1. Cross-resource safety checks over the bundle's entries.
/// 2. Submission to the external validator (with retry/backoff), falling
///    back to the local structural check when the validator is absent or
///    unavailable after retries.
/// 3. Merge safety findings and validator issues into one outcome.
///
/// `external` is `None` when no `external_validator_url` is configured:
/// local fallback runs unconditionally in that case, matching "absent means
/// local fallback only" (spec.md §6's configuration table).
pub fn run_validation_loop(
    bundle: &Bundle,
    subject: &Reference,
    as_of: DateTime<Utc>,
    safety: &SafetyEngine,
    external: Option<&dyn ExternalValidator>,
    sleep: &dyn Fn(std::time::Duration),
    audit: &dyn AuditSink,
) -> PipelineResult<ValidationOutcome> {
    let entries: Vec<_> = bundle.entry.iter().map(|e| e.resource.clone()).collect();
    let findings = safety.evaluate(&entries, subject, as_of);

    let mut outcome = ValidationOutcome::empty();
    for finding in findings {
        audit.record(AuditEventKind::SafetyFindingRecorded {
            kind: finding.kind,
            severity: finding.severity,
        })?;
        let issue: ValidationIssue = finding.into();
        outcome.issues.push(issue);
    }

    let validator_outcome = match external {
        Some(validator) => match submit_with_retry(validator, bundle, sleep) {
            Ok(issues) => ValidationOutcome { issues, degraded: false },
            Err(_) => LocalStructuralValidator::new().validate(bundle),
        },
        None => LocalStructuralValidator::new().validate(bundle),
    };
    outcome.merge(validator_outcome);

    audit.record(AuditEventKind::ValidationCompleted {
        degraded: outcome.degraded,
        issue_count: outcome.issues.len() as u32,
        blocking: outcome.has_blocking_issue(),
    })?;

    Ok(outcome)
}
