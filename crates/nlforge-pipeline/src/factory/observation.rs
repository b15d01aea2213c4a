//! `Observation` factory.
//!
//! Vital-sign clustering happens before this factory is invoked: the
//! orchestration layer calls it once per intended `Observation` resource,
//! passing either a single vital-sign entity (heart rate, oxygen
//! saturation) or the paired systolic/diastolic blood-pressure entities
//! that belong together as one reading with two `component`s.

use chrono::Utc;
use std::sync::Arc;

use nlforge_contracts::coding::OntologyIntent;
use nlforge_contracts::entity::{ClinicalEntity, EntityKind};
use nlforge_contracts::error::{PipelineError, PipelineResult};
use nlforge_contracts::reference::{Reference, ReferenceValue};
use nlforge_contracts::resource::{ObservationComponent, ObservationResource, Quantity, ResourceKind, ResourceMeta, ResourcePayload};
use nlforge_core::traits::{ResourceFactory, TerminologyCoder};

/// Splits `"systolic blood pressure 110"` into `("systolic blood pressure",
/// 110.0)`. Returns `None` if the trailing token is not numeric.
fn split_label_and_value(normalized: &str) -> Option<(&str, f64)> {
    let (label, value) = normalized.trim().rsplit_once(' ')?;
    let value: f64 = value.parse().ok()?;
    Some((label, value))
}

fn unit_for(label: &str) -> &'static str {
    if label.contains("blood pressure") {
        "mmHg"
    } else if label.contains("heart rate") {
        "beats/min"
    } else if label.contains("oxygen saturation") {
        "%"
    } else {
        ""
    }
}

pub struct ObservationResourceFactory {
    coder: Arc<dyn TerminologyCoder>,
}

impl ObservationResourceFactory {
    pub fn new(coder: Arc<dyn TerminologyCoder>) -> Self {
        Self { coder }
    }

    fn component_for(&self, entity: &ClinicalEntity) -> PipelineResult<(ObservationComponent, &'static str)> {
        let (label, value) = split_label_and_value(&entity.normalized).ok_or_else(|| PipelineError::InvalidInput {
            factory: "observation".to_string(),
            reason: "vital sign entity has no trailing numeric value".to_string(),
        })?;
        let unit = unit_for(label);
        Ok((
            ObservationComponent {
                code: self.coder.code(OntologyIntent::Lab, label),
                value_quantity: Some(Quantity {
                    value,
                    unit: unit.to_string(),
                    system: Some("http://unitsofmeasure.org".to_string()),
                    code: None,
                }),
            },
            unit,
        ))
    }
}

impl ResourceFactory for ObservationResourceFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Observation
    }

    fn build(
        &self,
        entities: &[ClinicalEntity],
        subject: &Reference,
        allocate_reference: &mut dyn FnMut(ResourceKind) -> Reference,
    ) -> PipelineResult<ResourcePayload> {
        let vitals: Vec<&ClinicalEntity> = entities.iter().filter(|e| e.kind == EntityKind::VitalSign).collect();
        if vitals.is_empty() {
            return Err(PipelineError::InvalidInput {
                factory: "observation".to_string(),
                reason: "no vital sign entity supplied".to_string(),
            });
        }

        let self_ref = allocate_reference(ResourceKind::Observation);
        let meta = ResourceMeta::new("observation-factory", Utc::now());

        if vitals.len() == 2 {
            let (first, _) = self.component_for(vitals[0])?;
            let (second, _) = self.component_for(vitals[1])?;
            return Ok(ResourcePayload::Observation(ObservationResource {
                resource_type: ResourceKind::Observation.wire_name().to_string(),
                id: self_ref.id,
                meta,
                status: "final".to_string(),
                code: nlforge_contracts::coding::CodedConcept::text_only("blood pressure panel"),
                subject: ReferenceValue::from(subject),
                value_quantity: None,
                component: vec![first, second],
            }));
        }

        let (label, value) = split_label_and_value(&vitals[0].normalized).ok_or_else(|| PipelineError::InvalidInput {
            factory: "observation".to_string(),
            reason: "vital sign entity has no trailing numeric value".to_string(),
        })?;
        let unit = unit_for(label);

        Ok(ResourcePayload::Observation(ObservationResource {
            resource_type: ResourceKind::Observation.wire_name().to_string(),
            id: self_ref.id,
            meta,
            status: "final".to_string(),
            code: self.coder.code(OntologyIntent::Lab, label),
            subject: ReferenceValue::from(subject),
            value_quantity: Some(Quantity {
                value,
                unit: unit.to_string(),
                system: Some("http://unitsofmeasure.org".to_string()),
                code: None,
            }),
            component: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminology::ClinicalTerminologyCoder;
    use nlforge_contracts::entity::{Span, Tier};

    fn vital(text: &str) -> ClinicalEntity {
        ClinicalEntity::new(EntityKind::VitalSign, Span { start: 0, end: text.len() }, text, 0.97, Tier::Tier1Pattern)
    }

    #[test]
    fn builds_a_single_reading_observation() {
        let factory = ObservationResourceFactory::new(Arc::new(ClinicalTerminologyCoder::new(16)));
        let subject = Reference::new(ResourceKind::Patient, "p1");
        let payload = factory
            .build(&[vital("heart rate 68")], &subject, &mut |kind| Reference::new(kind, "o1"))
            .unwrap();
        match payload {
            ResourcePayload::Observation(o) => {
                assert_eq!(o.code.primary_code(), Some("8867-4"));
                assert_eq!(o.value_quantity.unwrap().value, 68.0);
            }
            other => panic!("expected Observation, got {other:?}"),
        }
    }

    #[test]
    fn groups_systolic_and_diastolic_into_one_observation_with_components() {
        let factory = ObservationResourceFactory::new(Arc::new(ClinicalTerminologyCoder::new(16)));
        let subject = Reference::new(ResourceKind::Patient, "p1");
        let entities = vec![vital("systolic blood pressure 110"), vital("diastolic blood pressure 70")];
        let payload = factory.build(&entities, &subject, &mut |kind| Reference::new(kind, "o1")).unwrap();
        match payload {
            ResourcePayload::Observation(o) => {
                assert_eq!(o.component.len(), 2);
                assert_eq!(o.component[0].code.primary_code(), Some("8480-6"));
                assert_eq!(o.component[1].code.primary_code(), Some("8462-4"));
            }
            other => panic!("expected Observation, got {other:?}"),
        }
    }
}
