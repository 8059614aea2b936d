use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a task within its parent spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Eligible for assignment; all dependencies satisfied.
    Ready,
    /// Assigned and being worked.
    InProgress,
    /// Finished.
    Complete,
    /// Has unmet dependencies and cannot be assigned.
    Blocked,
}

/// A single checklist item nested under a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    /// Free-text description.
    pub description: String,
    /// Whether this subtask has been checked off.
    #[serde(default)]
    pub completed: bool,
}

/// An ordered work item belonging to exactly one spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier within the parent spec, `TASK-###`.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Current status.
    pub status: TaskStatus,
    /// Capability tag this task requires, e.g. `"cli-specialist"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Free-text effort estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<String>,
    /// Completion percentage, clamped to `[0, 100]`.
    #[serde(default)]
    pub progress: u8,
    /// When work started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,
    /// When work completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
    /// Estimated completion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
    /// Ids this task depends on. Bare `TASK-###` ids resolve within the same
    /// spec; ids carrying a spec prefix (`FEAT-002/TASK-001`) are cross-spec.
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
    /// Ordered checklist items.
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

impl Task {
    /// Clamp `progress` into its valid range. Parsers should call this
    /// after reading an untrusted value from front-matter.
    pub fn clamp_progress(&mut self) {
        self.progress = self.progress.min(100);
    }

    /// Whether this dependency id refers to a task in a different spec
    /// (carries a `SPEC-ID/TASK-ID` form) as opposed to this spec's own
    /// task namespace.
    pub fn is_cross_spec_dependency(dep: &str) -> bool {
        dep.contains('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_clamps_to_100() {
        let mut task = Task {
            id: "TASK-001".into(),
            title: "t".into(),
            status: TaskStatus::Ready,
            agent: None,
            effort: None,
            progress: 150,
            started: None,
            completed: None,
            estimated_completion: None,
            depends_on: BTreeSet::new(),
            subtasks: Vec::new(),
        };
        task.clamp_progress();
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn cross_spec_dependency_detection() {
        assert!(Task::is_cross_spec_dependency("FEAT-002/TASK-001"));
        assert!(!Task::is_cross_spec_dependency("TASK-001"));
    }
}
