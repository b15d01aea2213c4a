//! `assemble(entries, bundle_kind) -> Bundle | PipelineError`.
//!
//! Reference resolution walks every field holding a `{"reference": "..."}`
//! object; dependency ordering builds a directed graph over those
//! references and topologically sorts it, tie-breaking by
//! `ResourceKind::priority_rank()` then by wire name then by identifier.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use nlforge_contracts::bundle::{Bundle, BundleEntry, BundleKind};
use nlforge_contracts::error::{PipelineError, PipelineResult};
use nlforge_contracts::reference::Reference;
use nlforge_contracts::resource::ResourcePayload;

/// One payload plus the external references it is allowed to carry without
/// those references resolving inside this bundle (e.g. a reference to a
/// resource the caller asserts already exists in the target system).
pub struct AssemblyInput {
    pub payload: ResourcePayload,
    pub external_refs: Vec<Reference>,
}

impl AssemblyInput {
    pub fn new(payload: ResourcePayload) -> Self {
        Self {
            payload,
            external_refs: Vec::new(),
        }
    }
}

/// Collect every `{"reference": "Kind/id"}` target referenced by `value`,
/// skipping `urn:` full-URL forms (those are never internal short-form
/// references).
fn collect_references(value: &Value, out: &mut Vec<Reference>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("reference") {
                if !target.starts_with("urn:") {
                    if let Some(r) = Reference::parse(target) {
                        out.push(r);
                    }
                }
            }
            for v in map.values() {
                collect_references(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_references(v, out);
            }
        }
        _ => {}
    }
}

fn tie_break_key(payload: &ResourcePayload) -> (u32, &'static str, String) {
    let kind = payload.kind();
    (kind.priority_rank(), kind.wire_name(), payload.id().to_string())
}

/// Build the assembled bundle from `inputs`. `transaction` bundles require
/// an acyclic reference graph and a topological, tie-broken entry order;
/// `collection` bundles skip ordering but still require every reference to
/// resolve.
pub fn assemble(inputs: Vec<AssemblyInput>, bundle_kind: BundleKind, timestamp: DateTime<Utc>) -> PipelineResult<Bundle> {
    if inputs.is_empty() {
        return Err(PipelineError::InvalidInput {
            factory: "bundle-assembler".to_string(),
            reason: "cannot assemble a bundle with no entries".to_string(),
        });
    }

    let known: HashMap<(nlforge_contracts::resource::ResourceKind, String), usize> = inputs
        .iter()
        .enumerate()
        .map(|(idx, input)| ((input.payload.kind(), input.payload.id().to_string()), idx))
        .collect();

    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); inputs.len()];

    for (idx, input) in inputs.iter().enumerate() {
        let wire = input
            .payload
            .to_wire_json()
            .map_err(|_| PipelineError::UnresolvedReference {
                reference: format!("{}/{}", input.payload.kind().wire_name(), input.payload.id()),
            })?;
        let mut refs = Vec::new();
        collect_references(&wire, &mut refs);

        for r in refs {
            if let Some(&target_idx) = known.get(&(r.kind, r.id.clone())) {
                if target_idx != idx {
                    edges[idx].push(target_idx);
                }
                continue;
            }
            let declared = input.external_refs.iter().any(|ext| ext.kind == r.kind && ext.id == r.id);
            if !declared {
                return Err(PipelineError::UnresolvedReference {
                    reference: r.to_short_form(),
                });
            }
        }
    }

    let order: Vec<usize> = if bundle_kind == BundleKind::Transaction {
        topological_order(&inputs, &edges)?
    } else {
        let mut order: Vec<usize> = (0..inputs.len()).collect();
        order.sort_by_key(|&idx| tie_break_key(&inputs[idx].payload));
        order
    };

    let entry = order
        .into_iter()
        .map(|idx| BundleEntry {
            full_url: format!("urn:uuid:{}", Uuid::new_v4()),
            resource: inputs[idx].payload.clone(),
        })
        .collect();

    Ok(Bundle::new(bundle_kind, entry, timestamp))
}

/// Kahn's algorithm over `edges` (entry `a` depends on entry `b` when
/// `edges[a]` contains `b`), breaking ties among ready nodes with
/// `tie_break_key`. Returns `CycleDetected` naming every entry left
/// unordered when no more nodes become ready.
fn topological_order(inputs: &[AssemblyInput], edges: &[Vec<usize>]) -> PipelineResult<Vec<usize>> {
    let n = inputs.len();
    // `in_degree[i]` counts how many unresolved dependents still need to be
    // placed ahead of `i`. An entry becomes ready once everything it
    // depends on has already been placed.
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut remaining_deps: Vec<usize> = vec![0; n];
    for (from, deps) in edges.iter().enumerate() {
        remaining_deps[from] = deps.len();
        for &to in deps {
            dependents[to].push(from);
        }
    }

    let mut ready: Vec<usize> = (0..n).filter(|&i| remaining_deps[i] == 0).collect();
    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);

    while !ready.is_empty() {
        ready.sort_by_key(|&idx| tie_break_key(&inputs[idx].payload));
        let next = ready.remove(0);
        placed[next] = true;
        order.push(next);
        for &dependent in &dependents[next] {
            remaining_deps[dependent] -= 1;
            if remaining_deps[dependent] == 0 {
                ready.push(dependent);
            }
        }
    }

    if order.len() != n {
        let participants: Vec<String> = (0..n)
            .filter(|&i| !placed[i])
            .map(|i| format!("{}/{}", inputs[i].payload.kind().wire_name(), inputs[i].payload.id()))
            .collect();
        return Err(PipelineError::CycleDetected { participants });
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlforge_contracts::coding::CodedConcept;
    use nlforge_contracts::reference::ReferenceValue;
    use nlforge_contracts::resource::{ConditionResource, PatientResource, ResourceKind, ResourceMeta};

    fn patient(id: &str) -> ResourcePayload {
        ResourcePayload::Patient(PatientResource {
            resource_type: "Patient".to_string(),
            id: id.to_string(),
            meta: ResourceMeta::new("patient-factory", Utc::now()),
            name: vec![],
            gender: None,
            birth_date: None,
        })
    }

    fn condition(id: &str, subject_id: &str) -> ResourcePayload {
        ResourcePayload::Condition(ConditionResource {
            resource_type: "Condition".to_string(),
            id: id.to_string(),
            meta: ResourceMeta::new("condition-factory", Utc::now()),
            code: CodedConcept::text_only("hypertension"),
            subject: ReferenceValue::from(&Reference::new(ResourceKind::Patient, subject_id)),
            clinical_status: None,
        })
    }

    #[test]
    fn orders_patient_before_condition_by_priority_rank() {
        let inputs = vec![
            AssemblyInput::new(condition("c1", "p1")),
            AssemblyInput::new(patient("p1")),
        ];
        let bundle = assemble(inputs, BundleKind::Transaction, Utc::now()).unwrap();
        assert_eq!(bundle.entry[0].resource.kind(), ResourceKind::Patient);
        assert_eq!(bundle.entry[1].resource.kind(), ResourceKind::Condition);
    }

    #[test]
    fn refuses_an_empty_entry_set() {
        let result = assemble(vec![], BundleKind::Transaction, Utc::now());
        assert!(matches!(result, Err(PipelineError::InvalidInput { .. })));
    }

    #[test]
    fn unresolved_reference_is_fatal() {
        let inputs = vec![AssemblyInput::new(condition("c1", "missing-patient"))];
        let result = assemble(inputs, BundleKind::Transaction, Utc::now());
        assert!(matches!(result, Err(PipelineError::UnresolvedReference { .. })));
    }

    #[test]
    fn declared_external_reference_resolves_without_a_matching_entry() {
        let mut input = AssemblyInput::new(condition("c1", "external-patient"));
        input.external_refs.push(Reference::new(ResourceKind::Patient, "external-patient"));
        let bundle = assemble(vec![input], BundleKind::Transaction, Utc::now()).unwrap();
        assert_eq!(bundle.entry.len(), 1);
    }

    #[test]
    fn mutual_references_are_reported_as_a_cycle() {
        let a = ResourcePayload::Condition(ConditionResource {
            resource_type: "Condition".to_string(),
            id: "a".to_string(),
            meta: ResourceMeta::new("condition-factory", Utc::now()),
            code: CodedConcept::text_only("a"),
            subject: ReferenceValue::from(&Reference::new(ResourceKind::Condition, "b")),
            clinical_status: None,
        });
        let b = ResourcePayload::Condition(ConditionResource {
            resource_type: "Condition".to_string(),
            id: "b".to_string(),
            meta: ResourceMeta::new("condition-factory", Utc::now()),
            code: CodedConcept::text_only("b"),
            subject: ReferenceValue::from(&Reference::new(ResourceKind::Condition, "a")),
            clinical_status: None,
        });
        let result = assemble(
            vec![AssemblyInput::new(a), AssemblyInput::new(b)],
            BundleKind::Transaction,
            Utc::now(),
        );
        assert!(matches!(result, Err(PipelineError::CycleDetected { .. })));
    }
}
