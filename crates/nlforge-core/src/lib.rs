//! # nlforge-core
//!
//! The deterministic, budget-bound extraction runtime for the nlforge
//! clinical-text-to-bundle pipeline.
//!
//! This crate provides:
//! - The four core traits (`ExtractionTier`, `ThresholdGate`,
//!   `TerminologyCoder`, `ResourceFactory`)
//! - The `TierExecutor` that drives tiers 1 through 4 in escalation order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nlforge_core::{TierExecutor, traits::{ExtractionTier, ThresholdGate}};
//! ```

pub mod executor;
pub mod traits;

pub use executor::TierExecutor;
