//! Error taxonomy for the nlforge clinical-text-to-bundle pipeline.
//!
//! Every fallible core operation returns `PipelineResult<T>`. Messages are
//! categorical only: per the patient-identifying-data handling rule, no
//! variant may carry raw input text or an extracted normalized surface form.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input exceeds the configured maximum length")]
    InputTooLarge,

    #[error("extraction failed: every tier errored or timed out")]
    ExtractionFailed,

    #[error("unknown resource kind: {kind}")]
    UnknownResourceKind { kind: String },

    #[error("invalid input for factory '{factory}': {reason}")]
    InvalidInput { factory: String, reason: String },

    #[error("coding unresolvable for field '{field_path}'")]
    CodingUnresolvable { field_path: String },

    #[error("unresolved reference: {reference}")]
    UnresolvedReference { reference: String },

    #[error("cycle detected among entries: {participants:?}")]
    CycleDetected { participants: Vec<String> },

    #[error("external schema validator unavailable after retries")]
    ValidatorUnavailable,

    #[error("request rejected: too many concurrent requests in flight")]
    BackPressureReject,

    #[error("request exceeded its wall-clock timeout")]
    Timeout,

    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    #[error("request was cancelled")]
    Cancelled,

    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },
}

pub type PipelineResult<T> = Result<T, PipelineError>;
