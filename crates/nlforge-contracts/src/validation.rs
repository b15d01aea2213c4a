//! Validation outcomes: the combined result of the external schema validator,
//! the local structural fallback, and cross-resource safety findings.

use serde::{Deserialize, Serialize};

use crate::safety::{SafetyFinding, SafetySeverity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Information,
    Warning,
    Error,
    Fatal,
}

/// A single validation issue, whether sourced from the remote validator, the
/// local structural fallback, or a coalesced safety finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub issue_kind: String,
    pub field_path: String,
    pub message: String,
}

impl ValidationIssue {
    /// Two issues are duplicates per spec §4.5's outcome-combination rule:
    /// same field path and same issue kind.
    fn dedup_key(&self) -> (&str, &str) {
        (self.field_path.as_str(), self.issue_kind.as_str())
    }
}

/// The result returned by the validation loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub issues: Vec<ValidationIssue>,
    /// Set when the remote validator was unavailable and local structural
    /// fallback was used instead.
    pub degraded: bool,
}

impl From<SafetySeverity> for Severity {
    /// Absolute/relative findings are blocking (fatal/error); caution and
    /// informational findings surface as non-blocking warnings/information.
    fn from(severity: SafetySeverity) -> Self {
        match severity {
            SafetySeverity::Absolute => Severity::Fatal,
            SafetySeverity::Relative => Severity::Error,
            SafetySeverity::Caution => Severity::Warning,
            SafetySeverity::Informational => Severity::Information,
        }
    }
}

impl From<SafetyFinding> for ValidationIssue {
    fn from(finding: SafetyFinding) -> Self {
        let issue_kind = serde_json::to_value(finding.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "safety-finding".to_string());
        let field_path = finding
            .involved
            .iter()
            .map(|r| r.to_short_form())
            .collect::<Vec<_>>()
            .join(",");

        Self {
            severity: finding.severity.into(),
            issue_kind,
            field_path,
            message: finding.explanation,
        }
    }
}

impl ValidationOutcome {
    pub fn empty() -> Self {
        Self {
            issues: Vec::new(),
            degraded: false,
        }
    }

    pub fn has_blocking_issue(&self) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i.severity, Severity::Fatal | Severity::Error))
    }

    /// Merge another outcome's issues in, coalescing duplicates by
    /// (field_path, issue_kind) while preserving the higher severity.
    pub fn merge(&mut self, other: ValidationOutcome) {
        self.degraded = self.degraded || other.degraded;
        for incoming in other.issues {
            if let Some(existing) = self
                .issues
                .iter_mut()
                .find(|i| i.dedup_key() == incoming.dedup_key())
            {
                if incoming.severity > existing.severity {
                    *existing = incoming;
                }
            } else {
                self.issues.push(incoming);
            }
        }
    }
}
