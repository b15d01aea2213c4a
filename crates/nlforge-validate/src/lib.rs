//! # nlforge-validate
//!
//! The validation loop: submit an assembled bundle to an external schema
//! validator with retry/backoff, fall back to a local structural check when
//! the validator is absent or unavailable, and combine the result with
//! cross-resource safety findings via
//! [`nlforge_contracts::validation::ValidationOutcome::merge`].
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use nlforge_validate::engine::{submit_with_retry, ExternalValidator, LocalStructuralValidator};
//!
//! let issues = submit_with_retry(&my_validator, &bundle, &|d| std::thread::sleep(d))?;
//! ```

pub mod engine;

pub use engine::{
    submit_with_retry, ExternalValidator, LocalStructuralValidator, SubmitAttempt,
};
