use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const CURRENT_VERSION: u32 = 1;

/// Status of a single assignment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Currently being worked.
    InProgress,
    /// Finished.
    Complete,
    /// Abandoned without completion.
    Cancelled,
}

/// One append-only audit event attached to an assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Short event name.
    pub event: String,
    /// When it occurred.
    pub ts: DateTime<Utc>,
    /// Arbitrary structured payload.
    pub payload: serde_json::Value,
}

impl AuditEvent {
    /// Construct a new event stamped with the current time.
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            ts: Utc::now(),
            payload,
        }
    }
}

/// A single assignment record, current or completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// Spec identifier.
    pub spec_id: String,
    /// Task identifier.
    pub task_id: String,
    /// Agent holding or who held this assignment.
    pub assigned_agent: String,
    /// Lifecycle status of this record.
    pub status: AssignmentStatus,
    /// When the assignment was created.
    pub assigned_at: DateTime<Utc>,
    /// When work began (equal to `assigned_at` unless resumed).
    pub started_at: DateTime<Utc>,
    /// When the assignment completed, if it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Free-text notes, e.g. supplied to `CompleteTask`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Append-only audit trail for this assignment.
    #[serde(default)]
    pub audit: Vec<AuditEvent>,
}

impl Assignment {
    /// Hours elapsed between `started_at` and `completed_at`, if completed.
    pub fn duration_hours(&self) -> Option<f64> {
        self.completed_at
            .map(|completed| (completed - self.started_at).num_seconds() as f64 / 3600.0)
    }
}

/// Derived, cached progress counters. Recomputed on load; never the
/// authoritative source for anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectProgress {
    /// Count of records in `current_assignments`.
    pub in_progress_count: usize,
    /// Count of records in `completed_assignments`.
    pub completed_count: usize,
}

/// The single durable workflow-state document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDocument {
    /// Schema version, for forward migration.
    pub version: u32,
    /// Active assignments, at most one `in_progress` per (spec_id, task_id).
    #[serde(default)]
    pub current_assignments: Vec<Assignment>,
    /// Historical, completed (or cancelled) assignments.
    #[serde(default)]
    pub completed_assignments: Vec<Assignment>,
    /// Derived counters recomputed whenever the document is saved.
    #[serde(default)]
    pub project_progress: ProjectProgress,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            current_assignments: Vec::new(),
            completed_assignments: Vec::new(),
            project_progress: ProjectProgress::default(),
        }
    }
}

impl StateDocument {
    /// Find the in-progress record for `(spec_id, task_id)`, if any.
    pub fn find_current(&self, spec_id: &str, task_id: &str) -> Option<&Assignment> {
        self.current_assignments
            .iter()
            .find(|a| a.spec_id == spec_id && a.task_id == task_id)
    }

    /// Recompute `project_progress` from the current lists. Call before
    /// every save.
    pub fn refresh_progress(&mut self) {
        self.project_progress = ProjectProgress {
            in_progress_count: self.current_assignments.len(),
            completed_count: self.completed_assignments.len(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_hours_computed_from_timestamps() {
        let started = Utc::now();
        let assignment = Assignment {
            spec_id: "FEAT-001".into(),
            task_id: "TASK-001".into(),
            assigned_agent: "a1".into(),
            status: AssignmentStatus::Complete,
            assigned_at: started,
            started_at: started,
            completed_at: Some(started + chrono::Duration::hours(2)),
            notes: None,
            audit: Vec::new(),
        };
        assert_eq!(assignment.duration_hours(), Some(2.0));
    }

    #[test]
    fn default_document_has_no_assignments() {
        let doc = StateDocument::default();
        assert_eq!(doc.version, CURRENT_VERSION);
        assert!(doc.current_assignments.is_empty());
    }
}
