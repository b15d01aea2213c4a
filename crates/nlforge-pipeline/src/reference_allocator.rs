//! The per-request reference allocator.
//!
//! Mints fresh internal identifiers for every resource a factory builds,
//! including side-effect resources a factory mints beyond its own primary
//! output (e.g. `DeviceUseStatement` minting a `Device`). Never shared
//! across requests: one allocator is constructed fresh per
//! `run_request` call, per spec §5's "Reference Allocator: per-request,
//! never shared" rule.

use uuid::Uuid;

use nlforge_contracts::reference::Reference;
use nlforge_contracts::resource::{ResourceKind, ResourcePayload};

/// A minimal stand-in payload minted for a side-effect reference that has
/// no factory-produced counterpart yet. The assembler folds these into the
/// final entry set so the reference they back actually resolves.
pub struct StubEntry {
    pub reference: Reference,
    pub payload: ResourcePayload,
}

/// Mints fresh `<Kind>/<id>` references within one request and tracks the
/// stub payloads minted for side-effect references (references requested
/// for a kind the caller is not itself building right now).
pub struct ReferenceAllocator {
    /// The kind the current `build()` call is producing. The first
    /// `allocate_reference` call for that kind is the factory's own id and
    /// never stubbed; later calls for other kinds mint a stub.
    primary_kind: Option<ResourceKind>,
    stubs: Vec<StubEntry>,
}

impl ReferenceAllocator {
    pub fn new() -> Self {
        Self {
            primary_kind: None,
            stubs: Vec::new(),
        }
    }

    fn mint(&mut self, kind: ResourceKind) -> Reference {
        Reference::new(kind, Uuid::new_v4().to_string())
    }

    /// Builds the `allocate_reference` closure a single factory invocation
    /// receives. `primary` is the kind that factory builds; any reference
    /// minted for a different kind during this call is recorded as a stub
    /// needing a minimal payload of its own.
    pub fn allocate_for<'a>(&'a mut self, primary: ResourceKind) -> impl FnMut(ResourceKind) -> Reference + 'a {
        self.primary_kind = Some(primary);
        move |kind| {
            let reference = self.mint(kind);
            if kind != primary {
                self.stubs.push(StubEntry {
                    reference: reference.clone(),
                    payload: stub_payload(&reference),
                });
            }
            reference
        }
    }

    /// Drain the stub payloads minted so far, to be folded into the bundle
    /// entry set by the assembler.
    pub fn take_stubs(&mut self) -> Vec<StubEntry> {
        std::mem::take(&mut self.stubs)
    }
}

impl Default for ReferenceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// A minimal `GenericResource` payload for a side-effect-minted reference:
/// just the discriminator and identifier, no coded fields. The orchestrator
/// is responsible for replacing it with a fully-built payload if one is
/// ever produced for the same reference later in the same request.
fn stub_payload(reference: &Reference) -> ResourcePayload {
    use chrono::Utc;
    use nlforge_contracts::resource::{GenericResource, ResourceMeta};

    ResourcePayload::Generic(GenericResource {
        resource_type: reference.kind.wire_name().to_string(),
        id: reference.id.clone(),
        meta: ResourceMeta::new("reference-allocator", Utc::now()),
        fields: serde_json::Map::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_kind_reference_is_not_stubbed() {
        let mut allocator = ReferenceAllocator::new();
        {
            let mut allocate = allocator.allocate_for(ResourceKind::Condition);
            allocate(ResourceKind::Condition);
        }
        assert!(allocator.take_stubs().is_empty());
    }

    #[test]
    fn side_effect_reference_for_a_different_kind_is_stubbed() {
        let mut allocator = ReferenceAllocator::new();
        {
            let mut allocate = allocator.allocate_for(ResourceKind::DeviceUseStatement);
            allocate(ResourceKind::DeviceUseStatement);
            allocate(ResourceKind::Device);
        }
        let stubs = allocator.take_stubs();
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].reference.kind, ResourceKind::Device);
    }

    #[test]
    fn minted_identifiers_never_repeat_within_a_request() {
        let mut allocator = ReferenceAllocator::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..5 {
            let mut allocate = allocator.allocate_for(ResourceKind::Observation);
            let r = allocate(ResourceKind::Observation);
            assert!(seen.insert(r.id));
        }
    }
}
