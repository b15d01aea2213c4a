//! # nlforge-contracts
//!
//! Shared data model, error taxonomy, and wire contracts for the nlforge
//! clinical-text-to-bundle pipeline.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate: only data definitions, serialization shapes, and the error
//! enum every fallible operation returns.

pub mod bundle;
pub mod coding;
pub mod entity;
pub mod error;
pub mod reference;
pub mod request;
pub mod resource;
pub mod safety;
pub mod tier_state;
pub mod validation;

#[cfg(test)]
mod tests {
    use super::*;
    use bundle::{Bundle, BundleEntry, BundleKind};
    use coding::{CodedConcept, Coding};
    use entity::{ClinicalEntity, EntityKind, Span, Tier};
    use error::PipelineError;
    use reference::Reference;
    use request::RequestCorrelationToken;
    use resource::{PatientResource, ResourceKind, ResourceMeta, ResourcePayload};
    use validation::{Severity, ValidationIssue, ValidationOutcome};

    #[test]
    fn coded_concept_requires_coding_or_text() {
        let coded = CodedConcept::coded(Coding {
            system: coding::system_uri::DRUG.to_string(),
            code: "29046".to_string(),
            display: Some("lisinopril".to_string()),
        });
        assert!(coded.is_valid());

        let text_only = CodedConcept::text_only("unrecognized substance");
        assert!(text_only.is_valid());

        let empty = CodedConcept {
            coding: Vec::new(),
            text: None,
        };
        assert!(!empty.is_valid());
    }

    #[test]
    fn clinical_entity_confidence_is_clamped_to_unit_interval() {
        let span = Span { start: 0, end: 3 };
        let over = ClinicalEntity::new(EntityKind::Dosage, span, "10mg", 1.4, Tier::Tier1Pattern);
        assert_eq!(over.confidence, 1.0);

        let under = ClinicalEntity::new(EntityKind::Dosage, span, "10mg", -0.2, Tier::Tier1Pattern);
        assert_eq!(under.confidence, 0.0);
    }

    #[test]
    fn reference_round_trips_through_short_form() {
        let r = Reference::new(ResourceKind::Condition, "abc-123");
        let short = r.to_short_form();
        assert_eq!(short, "Condition/abc-123");
        assert_eq!(Reference::parse(&short), Some(r));
    }

    #[test]
    fn reference_parse_rejects_unknown_kind() {
        assert_eq!(Reference::parse("NotAKind/abc-123"), None);
    }

    #[test]
    fn resource_kind_priority_rank_matches_fixed_tie_break_order() {
        assert!(ResourceKind::Patient.priority_rank() < ResourceKind::Practitioner.priority_rank());
        assert!(ResourceKind::Practitioner.priority_rank() < ResourceKind::Encounter.priority_rank());
        assert!(ResourceKind::CarePlan.priority_rank() < ResourceKind::Composition.priority_rank());
        // Kinds outside the named list share the sentinel rank and fall
        // back to alphabetic-by-wire-name ordering applied by the caller.
        assert_eq!(ResourceKind::Goal.priority_rank(), u32::MAX);
        assert_eq!(ResourceKind::Coverage.priority_rank(), u32::MAX);
    }

    #[test]
    fn resource_payload_serializes_without_an_envelope() {
        let payload = ResourcePayload::Patient(PatientResource {
            resource_type: "Patient".to_string(),
            id: "p1".to_string(),
            meta: ResourceMeta::new("patient-factory", chrono::Utc::now()),
            name: Vec::new(),
            gender: None,
            birth_date: None,
        });
        let value = payload.to_wire_json().unwrap();
        assert_eq!(value.get("resourceType").unwrap(), "Patient");
        assert_eq!(value.get("id").unwrap(), "p1");
        assert!(value.get("name").is_none(), "empty vec must be omitted, not emitted as []");
    }

    #[test]
    fn bundle_wraps_entries_with_a_single_identifier_and_timestamp() {
        let payload = ResourcePayload::Patient(PatientResource {
            resource_type: "Patient".to_string(),
            id: "p1".to_string(),
            meta: ResourceMeta::new("patient-factory", chrono::Utc::now()),
            name: Vec::new(),
            gender: None,
            birth_date: None,
        });
        let bundle = Bundle::new(
            BundleKind::Transaction,
            vec![BundleEntry {
                full_url: "urn:uuid:00000000-0000-0000-0000-000000000001".to_string(),
                resource: payload,
            }],
            chrono::Utc::now(),
        );
        assert_eq!(bundle.resource_type, "Bundle");
        assert_eq!(bundle.entry.len(), 1);
    }

    #[test]
    fn validation_outcome_merge_coalesces_duplicate_issues_keeping_higher_severity() {
        let mut outcome = ValidationOutcome::empty();
        outcome.issues.push(ValidationIssue {
            severity: Severity::Warning,
            issue_kind: "coding-unresolvable".to_string(),
            field_path: "medicationCodeableConcept".to_string(),
            message: "no coded match".to_string(),
        });

        let mut other = ValidationOutcome::empty();
        other.issues.push(ValidationIssue {
            severity: Severity::Error,
            issue_kind: "coding-unresolvable".to_string(),
            field_path: "medicationCodeableConcept".to_string(),
            message: "no coded match".to_string(),
        });

        outcome.merge(other);
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].severity, Severity::Error);
    }

    #[test]
    fn validation_outcome_blocking_issue_detection() {
        let mut outcome = ValidationOutcome::empty();
        assert!(!outcome.has_blocking_issue());
        outcome.issues.push(ValidationIssue {
            severity: Severity::Information,
            issue_kind: "budget-halt".to_string(),
            field_path: "$".to_string(),
            message: "tier 4 skipped".to_string(),
        });
        assert!(!outcome.has_blocking_issue());
        outcome.issues.push(ValidationIssue {
            severity: Severity::Fatal,
            issue_kind: "cycle-detected".to_string(),
            field_path: "$".to_string(),
            message: "reference cycle".to_string(),
        });
        assert!(outcome.has_blocking_issue());
    }

    #[test]
    fn request_correlation_token_new_produces_unique_values() {
        let tokens: Vec<RequestCorrelationToken> =
            (0..50).map(|_| RequestCorrelationToken::new()).collect();
        let unique: std::collections::HashSet<String> =
            tokens.iter().map(|t| t.to_string()).collect();
        assert_eq!(unique.len(), 50);
    }

    #[test]
    fn pipeline_error_messages_are_categorical() {
        let err = PipelineError::UnresolvedReference {
            reference: "Patient/missing-1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("unresolved reference"));
        assert!(msg.contains("Patient/missing-1"));
    }
}
