//! # nlforge-pipeline
//!
//! The clinical-text-to-bundle runtime: tiered entity extraction,
//! terminology coding, resource factories, bundle assembly with reference
//! resolution and topological ordering, and the cross-resource
//! safety-plus-validation loop.
//!
//! [`pipeline::ClinicalPipeline`] is the entry point most callers want:
//! build one once per deployment, then call
//! [`pipeline::ClinicalPipeline::run_request`] per clinical order or
//! observation record. The submodules below are the stages it wires
//! together, each usable on its own for testing or for a caller that only
//! needs one stage.

pub mod bundle;
pub mod extract;
pub mod factory;
pub mod pipeline;
pub mod reference_allocator;
pub mod scenarios;
pub mod terminology;
pub mod validation_loop;

pub use pipeline::{CancellationToken, ClinicalPipeline, ClinicalRequest, PipelineOutcome};
