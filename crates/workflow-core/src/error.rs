use thiserror::Error;

/// Convenience `Result` alias using [`WorkflowError`].
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Top-level error taxonomy for the workflow engine.
///
/// Each variant corresponds to one of the error kinds named in the error
/// handling design: which subsystem emits it and how callers should react is
/// fixed, not ad hoc per call site.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// A spec or task document could not be parsed. Collected, not fatal.
    #[error("parse error in {path}: {reason}")]
    ParseError {
        /// Path of the file that failed to parse.
        path: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The Spec Graph violates one of its structural invariants.
    #[error("integrity error: {0}")]
    IntegrityError(String),

    /// An (spec_id, task_id) already has an in-progress assignment.
    #[error("{spec_id}/{task_id} is already assigned to {assigned_agent}")]
    AlreadyAssigned {
        /// Spec identifier.
        spec_id: String,
        /// Task identifier.
        task_id: String,
        /// Agent currently holding the assignment.
        assigned_agent: String,
    },

    /// No in-progress assignment exists for the given (spec_id, task_id).
    #[error("{spec_id}/{task_id} has no in-progress assignment")]
    NotInProgress {
        /// Spec identifier.
        spec_id: String,
        /// Task identifier.
        task_id: String,
    },

    /// The workflow-state file lock could not be acquired in time.
    #[error("timed out acquiring workflow state lock after {timeout_ms}ms")]
    LockTimeout {
        /// Configured timeout that was exceeded.
        timeout_ms: u64,
    },

    /// A proposed assignment fails one or more business-rule checks.
    #[error("validation violation: {0}")]
    ValidationViolation(String),

    /// An external process (lint, test, VCS) failed or timed out.
    #[error("external tool '{tool}' failed: {detail}")]
    ExternalToolFailure {
        /// Which configured tool failed (`lint`, `test`, `vcs`).
        tool: String,
        /// Captured output or timeout detail.
        detail: String,
    },

    /// A spec file and the workflow state document disagree in a way that
    /// cannot be resolved unilaterally.
    #[error("conflict detected for {spec_id}/{task_id}: {detail}")]
    ConflictDetected {
        /// Spec identifier.
        spec_id: String,
        /// Task identifier.
        task_id: String,
        /// Description of the disagreement.
        detail: String,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("config error: {0}")]
    Config(String),

    /// A serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A standard I/O error, bubbled with its originating context intact.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkflowError {
    /// The stable taxonomy kind, used by callers that need to branch on
    /// error class without string matching `Display` output.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::ParseError { .. } => "ParseError",
            WorkflowError::IntegrityError(_) => "IntegrityError",
            WorkflowError::AlreadyAssigned { .. } => "AlreadyAssigned",
            WorkflowError::NotInProgress { .. } => "NotInProgress",
            WorkflowError::LockTimeout { .. } => "LockTimeout",
            WorkflowError::ValidationViolation(_) => "ValidationViolation",
            WorkflowError::ExternalToolFailure { .. } => "ExternalToolFailure",
            WorkflowError::ConflictDetected { .. } => "ConflictDetected",
            WorkflowError::Config(_) => "Config",
            WorkflowError::Serialization(_) => "Serialization",
            WorkflowError::Io(_) => "IOError",
        }
    }

    /// A suggested next action drawn from the fixed catalog referenced in
    /// the error handling design. Returns `None` when there is no generic
    /// action better than the message itself (callers may still attach a
    /// more specific suggestion, e.g. naming unmet dependencies).
    pub fn suggested_action(&self) -> Option<&'static str> {
        match self {
            WorkflowError::AlreadyAssigned { .. } => {
                Some("Choose a different task, or wait for the current assignment to complete")
            }
            WorkflowError::NotInProgress { .. } => {
                Some("Run start-next to create an assignment before completing it")
            }
            WorkflowError::LockTimeout { .. } => {
                Some("Retry the operation; if it persists, check for a stuck process holding the lock")
            }
            WorkflowError::IntegrityError(_) => {
                Some("Run the integrity validator and fix reported errors before retrying")
            }
            _ => None,
        }
    }
}

/// A single entry in an append-only audit trail. Never mutated after
/// creation; sequences of these form the audit log described in the data
/// model and the command-orchestrator pipelines.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuditEntry {
    /// Short event name, e.g. `"assigned"`, `"lint_retry"`, `"commit_created"`.
    pub event: String,
    /// When the event occurred.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Arbitrary structured payload (attempt numbers, captured output, ids).
    pub payload: serde_json::Value,
}

impl AuditEntry {
    /// Construct a new audit entry stamped with the current time.
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            timestamp: chrono::Utc::now(),
            payload,
        }
    }
}
