use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a single integrity finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks the `validate` CLI gate (non-zero exit).
    Error,
    /// Surfaced, but does not block.
    Warning,
}

/// Which of the fixed checks produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Check {
    DuplicateId,
    Format,
    RequiredFields,
    FileLocationAgreement,
    FilenameIdMatch,
    ReferenceValidity,
    AcyclicDependencies,
    TaskDependencyScope,
    TaskDependencyRegression,
}

/// A single integrity finding, scoped to one spec (and optionally one task
/// within it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Which check produced this finding.
    pub check: Check,
    /// Severity of the finding.
    pub severity: Severity,
    /// Spec this finding concerns.
    pub spec_id: String,
    /// Task id, if the finding is task-scoped rather than spec-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Human-readable description.
    pub message: String,
    /// Suggested remediation, where one can be derived mechanically (e.g.
    /// a normalized id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// The full integrity report for one `validate` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Every finding, in check order.
    pub findings: Vec<Finding>,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Number of specs the graph held when validated.
    pub specs_checked: usize,
    /// Parse failures carried over from the Spec Graph itself.
    pub parse_errors: usize,
}

impl IntegrityReport {
    /// Build a report from collected findings.
    pub fn new(findings: Vec<Finding>, specs_checked: usize, parse_errors: usize) -> Self {
        Self {
            findings,
            generated_at: Utc::now(),
            specs_checked,
            parse_errors,
        }
    }

    /// Whether any finding is at [`Severity::Error`] (or there were parse
    /// failures) — the condition the `validate` CLI gate checks to decide
    /// its exit code.
    pub fn has_errors(&self) -> bool {
        self.parse_errors > 0 || self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    /// Findings at [`Severity::Error`].
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Error)
    }

    /// Findings at [`Severity::Warning`].
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Warning)
    }
}
