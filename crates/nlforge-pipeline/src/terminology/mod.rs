//! Terminology coding: ontology tables, the sharded LRU cache, and the
//! `TerminologyCoder` implementation.

pub mod cache;
pub mod coder;
pub mod tables;

pub use coder::{convert_for_comparison, normalize_unit, ClinicalTerminologyCoder};
