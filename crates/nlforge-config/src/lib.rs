//! # nlforge-config
//!
//! TOML-driven configuration for the nlforge clinical-text-to-bundle
//! pipeline.
//!
//! ## Overview
//!
//! This crate provides [`PipelineConfig`], deserialized from a TOML
//! document. It carries the extraction cost ceiling, per-tier confidence
//! thresholds, validator connectivity, and concurrency limits that govern
//! a running pipeline instance.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use nlforge_config::PipelineConfig;
//!
//! let config = PipelineConfig::from_file(Path::new("config/pipeline.toml"))?;
//! ```

pub mod loader;
pub mod schema;

pub use schema::{EntityKindName, PipelineConfig, RequiredEntity, TierName, TierThreshold};
