//! Resource factories: one `ResourceFactory` implementation per FHIR
//! resource kind, wired together by a lazily-built [`registry::FactoryRegistry`].

pub mod allergy;
pub mod clinical_misc;
pub mod condition;
pub mod consent;
pub mod device;
pub mod generic;
pub mod immunization;
pub mod medication;
pub mod observation;
pub mod patient_context;
pub mod registry;

pub use registry::FactoryRegistry;
