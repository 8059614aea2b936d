//! Change classification: turns a before/after pair of parsed specs (or raw
//! JSON values, for the workflow-state file) into a [`ChangeAnalysis`] the
//! sync engine can act on without re-parsing anything itself.

use serde::{Deserialize, Serialize};
use workflow_core::{Spec, TaskStatus};

/// Kind of on-disk change observed for a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// A spec document's front-matter changed.
    Yaml,
    /// Only a spec document's free-text body changed.
    Body,
    /// The workflow-state JSON document changed.
    Json,
    /// The path was renamed (e.g. moved between status directories).
    Rename,
    /// The path was removed.
    Delete,
}

/// Severity bucket assigned to a change, per the fixed classification
/// rubric: any change to `id`, `status`, `assignee`, or a task's `status`
/// is `High`; other front-matter changes are `Medium`; body-only prose
/// changes are `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// A spec's lifecycle status changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: String,
    pub to: String,
    /// Always `true`: a spec-level status transition is a workflow event
    /// by definition (it is one of the fixed high-impact fields).
    pub is_workflow_change: bool,
}

/// A spec's top-level `assignee` changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentChange {
    pub from: Option<String>,
    pub to: Option<String>,
    /// `true` when the assignment moved from one agent to a different
    /// agent, as opposed to being set for the first time or cleared.
    pub is_handoff: bool,
}

/// A single task's status changed within a spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusChange {
    pub task_id: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// The fully classified, semantically-analyzed result of one observed
/// filesystem change. This is the payload published on the
/// `change_analyzed` topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeAnalysis {
    pub path: String,
    pub spec_id: Option<String>,
    pub change_type: ChangeType,
    pub impact: Impact,
    pub status_change: Option<StatusChange>,
    pub assignment_change: Option<AssignmentChange>,
    #[serde(default)]
    pub task_status_changes: Vec<TaskStatusChange>,
}

/// Classify the removal of a previously known spec. Always `High` impact:
/// a spec disappearing is always structurally significant.
pub fn classify_deleted_spec(path: &str, previous: Option<&Spec>) -> ChangeAnalysis {
    ChangeAnalysis {
        path: path.to_string(),
        spec_id: previous.map(|s| s.id.clone()),
        change_type: ChangeType::Delete,
        impact: Impact::High,
        status_change: None,
        assignment_change: None,
        task_status_changes: Vec::new(),
    }
}

/// Classify a spec document change by diffing `previous` (the last parse
/// this watcher observed, `None` if the file is new) against `current`.
pub fn classify_spec_change(path: &str, previous: Option<&Spec>, current: &Spec) -> ChangeAnalysis {
    let Some(previous) = previous else {
        // Newly observed file: nothing to diff against. Front-matter is
        // present by construction (parsing succeeded), so this is a yaml
        // change; a spec appearing fully formed is not itself a status
        // transition, so we score it medium rather than high.
        return ChangeAnalysis {
            path: path.to_string(),
            spec_id: Some(current.id.clone()),
            change_type: ChangeType::Yaml,
            impact: Impact::Medium,
            status_change: None,
            assignment_change: None,
            task_status_changes: Vec::new(),
        };
    };

    let status_change = (previous.status != current.status).then(|| StatusChange {
        from: format!("{:?}", previous.status),
        to: format!("{:?}", current.status),
        is_workflow_change: true,
    });

    let assignment_change = (previous.assignee != current.assignee).then(|| AssignmentChange {
        from: previous.assignee.clone(),
        to: current.assignee.clone(),
        is_handoff: previous.assignee.is_some()
            && current.assignee.is_some()
            && previous.assignee != current.assignee,
    });

    let task_status_changes: Vec<TaskStatusChange> = current
        .tasks
        .iter()
        .filter_map(|task| {
            let prior = previous.task(&task.id)?;
            (prior.status != task.status).then(|| TaskStatusChange {
                task_id: task.id.clone(),
                from: prior.status,
                to: task.status,
            })
        })
        .collect();

    let id_changed = previous.id != current.id;
    let high_impact = id_changed || status_change.is_some() || assignment_change.is_some() || !task_status_changes.is_empty();

    let front_matter_changed = high_impact
        || previous.spec_type != current.spec_type
        || previous.priority != current.priority
        || previous.title != current.title
        || previous.effort != current.effort
        || previous.phase != current.phase
        || previous.tags != current.tags
        || previous.dependencies != current.dependencies
        || previous.blocking != current.blocking
        || previous.related != current.related;

    let body_changed = previous.description != current.description
        || previous.acceptance_criteria != current.acceptance_criteria
        || previous.technical_notes != current.technical_notes;

    let impact = if high_impact {
        Impact::High
    } else if front_matter_changed {
        Impact::Medium
    } else {
        Impact::Low
    };

    let change_type = if front_matter_changed {
        ChangeType::Yaml
    } else if body_changed {
        ChangeType::Body
    } else {
        // No observable difference (e.g. a touch with no content change).
        // Still report something rather than silently dropping the event.
        ChangeType::Body
    };

    ChangeAnalysis {
        path: path.to_string(),
        spec_id: Some(current.id.clone()),
        change_type,
        impact,
        status_change,
        assignment_change,
        task_status_changes,
    }
}

/// Classify a bare rename/move (e.g. a spec moved between status
/// directories). Front-matter content is unaffected by the move itself, so
/// this only reports the type; a following content reparse (if any)
/// reports the real impact.
pub fn classify_rename(path: &str, spec_id: Option<&str>) -> ChangeAnalysis {
    ChangeAnalysis {
        path: path.to_string(),
        spec_id: spec_id.map(str::to_string),
        change_type: ChangeType::Rename,
        impact: Impact::Medium,
        status_change: None,
        assignment_change: None,
        task_status_changes: Vec::new(),
    }
}

/// Classify a change to the workflow-state JSON document. Impact is
/// deliberately coarse here: whether a change is *significant* enough to
/// warrant validation is a decision the sync engine makes by inspecting
/// `current` itself (it knows the state schema); this classifier only
/// flags that *something* in the document moved.
pub fn classify_json_change(
    path: &str,
    previous: Option<&serde_json::Value>,
    current: &serde_json::Value,
) -> ChangeAnalysis {
    let impact = if previous.is_some_and(|p| p == current) {
        Impact::Low
    } else {
        Impact::Medium
    };
    ChangeAnalysis {
        path: path.to_string(),
        spec_id: None,
        change_type: ChangeType::Json,
        impact,
        status_change: None,
        assignment_change: None,
        task_status_changes: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use workflow_core::{Priority, SpecStatus, SpecType, Task, VariantDetails};

    fn spec(status: SpecStatus, assignee: Option<&str>) -> Spec {
        Spec {
            id: "FEAT-001".into(),
            spec_type: SpecType::Feature,
            status,
            title: "Example".into(),
            priority: Priority::P1,
            effort: None,
            assignee: assignee.map(str::to_string),
            phase: None,
            created: None,
            updated: None,
            tags: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            blocking: BTreeSet::new(),
            related: BTreeSet::new(),
            tasks: vec![Task {
                id: "TASK-001".into(),
                title: "Do thing".into(),
                status: TaskStatus::Ready,
                agent: None,
                effort: None,
                progress: 0,
                started: None,
                completed: None,
                estimated_completion: None,
                depends_on: BTreeSet::new(),
                subtasks: Vec::new(),
            }],
            description: "body text".into(),
            acceptance_criteria: String::new(),
            technical_notes: String::new(),
            variant: VariantDetails::default(),
            file_path: None,
        }
    }

    #[test]
    fn status_change_is_high_impact() {
        let before = spec(SpecStatus::Backlog, None);
        let mut after = before.clone();
        after.status = SpecStatus::Active;

        let analysis = classify_spec_change("f.md", Some(&before), &after);
        assert_eq!(analysis.impact, Impact::High);
        assert!(analysis.status_change.unwrap().is_workflow_change);
    }

    #[test]
    fn reassignment_between_two_agents_is_a_handoff() {
        let before = spec(SpecStatus::Active, Some("agent-a"));
        let mut after = before.clone();
        after.assignee = Some("agent-b".to_string());

        let analysis = classify_spec_change("f.md", Some(&before), &after);
        let change = analysis.assignment_change.expect("assignment change");
        assert!(change.is_handoff);
    }

    #[test]
    fn task_status_change_is_high_impact() {
        let before = spec(SpecStatus::Active, None);
        let mut after = before.clone();
        after.tasks[0].status = TaskStatus::InProgress;

        let analysis = classify_spec_change("f.md", Some(&before), &after);
        assert_eq!(analysis.impact, Impact::High);
        assert_eq!(analysis.task_status_changes.len(), 1);
    }

    #[test]
    fn priority_only_change_is_medium_impact() {
        let before = spec(SpecStatus::Active, None);
        let mut after = before.clone();
        after.priority = Priority::P0;

        let analysis = classify_spec_change("f.md", Some(&before), &after);
        assert_eq!(analysis.impact, Impact::Medium);
        assert_eq!(analysis.change_type, ChangeType::Yaml);
    }

    #[test]
    fn body_only_change_is_low_impact() {
        let before = spec(SpecStatus::Active, None);
        let mut after = before.clone();
        after.description = "rewritten body text".to_string();

        let analysis = classify_spec_change("f.md", Some(&before), &after);
        assert_eq!(analysis.impact, Impact::Low);
        assert_eq!(analysis.change_type, ChangeType::Body);
    }

    #[test]
    fn deletion_is_always_high_impact() {
        let before = spec(SpecStatus::Active, None);
        let analysis = classify_deleted_spec("f.md", Some(&before));
        assert_eq!(analysis.impact, Impact::High);
        assert_eq!(analysis.change_type, ChangeType::Delete);
    }
}
