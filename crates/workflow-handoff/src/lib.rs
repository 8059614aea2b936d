//! Routes work to the next eligible task once a dependency completes.
//!
//! Given a `TASK_COMPLETED` event, enumerates every task (in any spec)
//! that depended on the just-completed task, and checks whether each one
//! now has all of its own dependencies satisfied. Never auto-routes when
//! more than one candidate becomes eligible at once.

use serde::{Deserialize, Serialize};
use workflow_core::TaskStatus;
use workflow_store::SpecGraph;

/// A `TASK_COMPLETED` notification driving one handoff evaluation.
#[derive(Debug, Clone, Deserialize)]
pub struct HandoffRequest {
    /// Spec owning the task that just completed.
    pub spec_id: String,
    /// The task that just completed.
    pub task_id: String,
    /// Agent that completed it.
    pub from_agent: String,
    /// Arbitrary caller-supplied context, carried through unchanged.
    #[serde(default)]
    pub context: serde_json::Value,
}

/// Why a handoff did not happen. `None` is carried in [`HandoffResult`] as
/// a plain string so it stays serializable without an enum round-trip.
pub mod reason {
    /// No task had a `depends_on` pointing at the completed task.
    pub const NO_DEPENDENTS: &str = "no_dependents";
    /// More than one dependent task became eligible at once.
    pub const MULTIPLE_CANDIDATES: &str = "multiple_candidates";
    /// The completed task could not be found in the graph.
    pub const COMPLETED_TASK_NOT_FOUND: &str = "completed_task_not_found";
}

/// Result of a handoff evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandoffResult {
    pub success: bool,
    pub handoff_needed: bool,
    /// The next eligible task: a bare task id when it lives in the same
    /// spec as the one that just completed, or `SPEC-ID/TASK-ID` when it
    /// lives in a different spec.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl HandoffResult {
    fn no_handoff(success: bool, reason: &'static str) -> Self {
        Self {
            success,
            handoff_needed: false,
            next_task: None,
            next_agent: None,
            reason: Some(reason),
        }
    }
}

/// A task eligible to take over, found while evaluating a handoff.
struct Candidate {
    spec_id: String,
    task_id: String,
    agent: Option<String>,
}

/// Evaluates handoffs against a [`SpecGraph`] snapshot. Construct a fresh
/// one per evaluation against the graph state observed *after* the
/// triggering completion has been reflected, so dependency resolution
/// sees the just-finished task as `Complete`.
pub struct HandoffEngine<'a> {
    graph: &'a SpecGraph,
}

impl<'a> HandoffEngine<'a> {
    /// Borrow a graph to evaluate handoffs against.
    pub fn new(graph: &'a SpecGraph) -> Self {
        Self { graph }
    }

    /// Evaluate one `TASK_COMPLETED` notification.
    pub fn evaluate(&self, request: &HandoffRequest) -> HandoffResult {
        if self.graph.resolve_task(&request.spec_id, &request.task_id).is_none() {
            return HandoffResult::no_handoff(false, reason::COMPLETED_TASK_NOT_FOUND);
        }

        let candidates = self.find_newly_eligible(&request.spec_id, &request.task_id);

        match candidates.as_slice() {
            [] => HandoffResult::no_handoff(true, reason::NO_DEPENDENTS),
            [only] => HandoffResult {
                success: true,
                handoff_needed: true,
                next_task: Some(if only.spec_id == request.spec_id {
                    only.task_id.clone()
                } else {
                    format!("{}/{}", only.spec_id, only.task_id)
                }),
                next_agent: only.agent.clone(),
                reason: None,
            },
            _ => HandoffResult::no_handoff(true, reason::MULTIPLE_CANDIDATES),
        }
    }

    fn find_newly_eligible(&self, completed_spec_id: &str, completed_task_id: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for spec in self.graph.all() {
            for task in &spec.tasks {
                if matches!(task.status, TaskStatus::Complete | TaskStatus::InProgress) {
                    continue;
                }

                let depends_on_completed = task.depends_on.iter().any(|dep| {
                    if let Some((dep_spec_id, dep_task_id)) = dep.split_once('/') {
                        dep_spec_id == completed_spec_id && dep_task_id == completed_task_id
                    } else {
                        spec.id == completed_spec_id && dep == completed_task_id
                    }
                });
                if !depends_on_completed {
                    continue;
                }

                let all_satisfied = task.depends_on.iter().all(|dep| {
                    self.graph
                        .resolve_task(&spec.id, dep)
                        .is_some_and(|(_, dep_task)| dep_task.status == TaskStatus::Complete)
                });

                if all_satisfied {
                    candidates.push(Candidate {
                        spec_id: spec.id.clone(),
                        task_id: task.id.clone(),
                        agent: task.agent.clone(),
                    });
                }
            }
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use workflow_core::{Priority, Spec, SpecStatus, SpecType, Task, VariantDetails};

    fn spec_with_tasks(id: &str, tasks: Vec<Task>) -> Spec {
        Spec {
            id: id.to_string(),
            spec_type: SpecType::Feature,
            status: SpecStatus::Active,
            title: "x".into(),
            priority: Priority::P2,
            effort: None,
            assignee: None,
            phase: None,
            created: None,
            updated: None,
            tags: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            blocking: BTreeSet::new(),
            related: BTreeSet::new(),
            tasks,
            description: String::new(),
            acceptance_criteria: String::new(),
            technical_notes: String::new(),
            variant: VariantDetails::default(),
            file_path: None,
        }
    }

    fn task(id: &str, status: TaskStatus, agent: Option<&str>, depends_on: &[&str]) -> Task {
        Task {
            id: id.to_string(),
            title: "t".into(),
            status,
            agent: agent.map(str::to_string),
            effort: None,
            progress: 0,
            started: None,
            completed: None,
            estimated_completion: None,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            subtasks: Vec::new(),
        }
    }

    fn graph_with(specs: Vec<Spec>) -> SpecGraph {
        SpecGraph::build(specs, Vec::new(), Vec::new())
    }

    #[test]
    fn single_dependent_becomes_next_task() {
        let t1 = task("TASK-001", TaskStatus::Complete, None, &[]);
        let t2 = task("TASK-002", TaskStatus::Ready, Some("cli-specialist"), &["TASK-001"]);
        let graph = graph_with(vec![spec_with_tasks("FEAT-001", vec![t1, t2])]);

        let engine = HandoffEngine::new(&graph);
        let result = engine.evaluate(&HandoffRequest {
            spec_id: "FEAT-001".into(),
            task_id: "TASK-001".into(),
            from_agent: "cli-specialist".into(),
            context: serde_json::json!({}),
        });

        assert!(result.handoff_needed);
        assert_eq!(result.next_task.as_deref(), Some("TASK-002"));
        assert_eq!(result.next_agent.as_deref(), Some("cli-specialist"));
    }

    #[test]
    fn multiple_eligible_dependents_do_not_auto_route() {
        let t1 = task("TASK-001", TaskStatus::Complete, None, &[]);
        let t2 = task("TASK-002", TaskStatus::Ready, None, &["TASK-001"]);
        let t3 = task("TASK-003", TaskStatus::Ready, None, &["TASK-001"]);
        let graph = graph_with(vec![spec_with_tasks("FEAT-001", vec![t1, t2, t3])]);

        let engine = HandoffEngine::new(&graph);
        let result = engine.evaluate(&HandoffRequest {
            spec_id: "FEAT-001".into(),
            task_id: "TASK-001".into(),
            from_agent: "a".into(),
            context: serde_json::json!({}),
        });

        assert!(!result.handoff_needed);
        assert_eq!(result.reason, Some(reason::MULTIPLE_CANDIDATES));
    }

    #[test]
    fn dependent_with_unmet_other_dependency_is_not_eligible() {
        let t1 = task("TASK-001", TaskStatus::Complete, None, &[]);
        let t2 = task("TASK-002", TaskStatus::Ready, None, &[]);
        let t3 = task("TASK-003", TaskStatus::Blocked, None, &["TASK-001", "TASK-002"]);
        let graph = graph_with(vec![spec_with_tasks("FEAT-001", vec![t1, t2, t3])]);

        let engine = HandoffEngine::new(&graph);
        let result = engine.evaluate(&HandoffRequest {
            spec_id: "FEAT-001".into(),
            task_id: "TASK-001".into(),
            from_agent: "a".into(),
            context: serde_json::json!({}),
        });

        assert!(!result.handoff_needed);
        assert_eq!(result.reason, Some(reason::NO_DEPENDENTS));
    }

    #[test]
    fn cross_spec_dependency_is_resolved() {
        let t1 = task("TASK-001", TaskStatus::Complete, None, &[]);
        let upstream = spec_with_tasks("FEAT-001", vec![t1]);
        let downstream_task = task("TASK-001", TaskStatus::Ready, Some("b"), &["FEAT-001/TASK-001"]);
        let downstream = spec_with_tasks("FEAT-002", vec![downstream_task]);
        let graph = graph_with(vec![upstream, downstream]);

        let engine = HandoffEngine::new(&graph);
        let result = engine.evaluate(&HandoffRequest {
            spec_id: "FEAT-001".into(),
            task_id: "TASK-001".into(),
            from_agent: "a".into(),
            context: serde_json::json!({}),
        });

        assert!(result.handoff_needed);
        assert_eq!(result.next_task.as_deref(), Some("FEAT-002/TASK-001"));
    }
}
