//! Proves a proposed `(agent, spec, task)` assignment is committable before
//! the Workflow State Manager is asked to write anything. Pure: given the
//! same spec graph, assignment snapshot, and request, this always returns
//! the same result.

use workflow_constraints::{AgentContext, ConstraintEngine};
use workflow_core::{Priority, TaskStatus};
use workflow_router::CurrentAssignments;
use workflow_store::SpecGraph;

/// A proposed assignment to validate.
#[derive(Debug, Clone)]
pub struct AssignmentRequest {
    /// Spec the task belongs to.
    pub spec_id: String,
    /// Task within the spec.
    pub task_id: String,
    /// Explicit acknowledgement required to assign a `P0` task.
    pub confirm_critical: bool,
}

/// A single reason a proposed assignment cannot proceed. Each carries a
/// short, actionable message; the set of `code`s is the fixed taxonomy
/// referenced by the error handling design.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Stable code, e.g. `"task_not_found"`, `"already_assigned"`.
    pub code: &'static str,
    /// Human-readable, actionable message.
    pub message: String,
}

/// Result of validating an [`AssignmentRequest`].
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the request is structurally valid (task exists, is not
    /// already assigned).
    pub is_valid: bool,
    /// Whether all business rules also pass, i.e. the caller may proceed
    /// to `AssignTask`.
    pub can_proceed: bool,
    /// Confidence in `[0,1]`: `1.0` with no warnings, decreasing per
    /// warning present.
    pub confidence: f64,
    /// Hard failures. Non-empty implies `can_proceed == false`.
    pub violations: Vec<Violation>,
    /// Soft issues that do not block the assignment.
    pub warnings: Vec<String>,
    /// Scoring detail behind the capability/dependency checks, when the
    /// task was found.
    pub validation_details: Option<String>,
}

/// Validates proposed assignments against a spec graph and a snapshot of
/// current assignments. Stateless; never mutates anything.
pub struct AssignmentValidator<'a> {
    graph: &'a SpecGraph,
    engine: ConstraintEngine<'a>,
}

impl<'a> AssignmentValidator<'a> {
    /// Build a validator over `graph`, checking capability/dependency
    /// business rules with `engine`.
    pub fn new(graph: &'a SpecGraph, engine: ConstraintEngine<'a>) -> Self {
        Self { graph, engine }
    }

    /// Validate `request` for `agent`, given the current assignment
    /// snapshot.
    pub fn validate(
        &self,
        agent: &AgentContext,
        request: &AssignmentRequest,
        assignments: &CurrentAssignments,
    ) -> ValidationResult {
        let mut violations = Vec::new();
        let mut warnings = Vec::new();

        let Some(spec) = self.graph.get(&request.spec_id) else {
            violations.push(Violation {
                code: "spec_not_found",
                message: format!("spec '{}' does not exist", request.spec_id),
            });
            return self.finish(violations, warnings, None);
        };

        let Some(task) = spec.task(&request.task_id) else {
            violations.push(Violation {
                code: "task_not_found",
                message: format!("task '{}' does not exist in spec '{}'", request.task_id, request.spec_id),
            });
            return self.finish(violations, warnings, None);
        };

        if task.status != TaskStatus::Ready {
            violations.push(Violation {
                code: "task_not_ready",
                message: format!(
                    "task '{}' has status {:?}, not ready",
                    task.id, task.status
                ),
            });
        }

        if let Some(holder) = assignments.get(&(request.spec_id.clone(), request.task_id.clone())) {
            violations.push(Violation {
                code: "already_assigned",
                message: format!("task '{}' is already assigned to '{holder}'", task.id),
            });
        }

        let breakdown = self.engine.score(&request.spec_id, task, spec.priority, agent);
        if breakdown.skill_multiplier <= 0.0 {
            violations.push(Violation {
                code: "capability_mismatch",
                message: format!(
                    "agent '{}' does not hold the required capability for task '{}'",
                    agent.agent, task.id
                ),
            });
        }
        if breakdown.dependency_multiplier <= 0.0 {
            let chain = self.engine.dependency_chain(&request.spec_id, task);
            violations.push(Violation {
                code: "dependencies_unsatisfied",
                message: format!(
                    "task '{}' has unsatisfied dependencies: {}",
                    task.id,
                    if chain.is_empty() { "unknown".to_string() } else { chain.join(", ") }
                ),
            });
        }
        if breakdown.workload_multiplier <= 0.0 {
            violations.push(Violation {
                code: "concurrent_limit_exceeded",
                message: format!("agent '{}' is at its concurrent-task limit", agent.agent),
            });
        } else if breakdown.workload_multiplier < 1.0 {
            warnings.push(format!(
                "agent '{}' is above the soft concurrent-task limit; workload multiplier reduced to {:.2}",
                agent.agent, breakdown.workload_multiplier
            ));
        }

        if spec.priority == Priority::P0 && !request.confirm_critical {
            violations.push(Violation {
                code: "critical_confirmation_required",
                message: format!(
                    "task '{}' belongs to a P0 spec; pass confirm_critical to proceed",
                    task.id
                ),
            });
        }

        let details = Some(format!(
            "skill={:.2} workload={:.2} priority={:.2} dependency={:.2}",
            breakdown.skill_multiplier,
            breakdown.workload_multiplier,
            breakdown.priority_weight,
            breakdown.dependency_multiplier
        ));

        self.finish(violations, warnings, details)
    }

    fn finish(&self, violations: Vec<Violation>, warnings: Vec<String>, details: Option<String>) -> ValidationResult {
        let is_valid = !violations.iter().any(|v| v.code == "task_not_found" || v.code == "spec_not_found");
        let can_proceed = violations.is_empty();
        let confidence = (1.0 - 0.1 * warnings.len() as f64).clamp(0.0, 1.0);
        ValidationResult {
            is_valid,
            can_proceed,
            confidence,
            violations,
            warnings,
            validation_details: details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_core::WorkflowConfig;
    use workflow_store::parse_spec;

    fn agent(tags: &[&str]) -> AgentContext {
        AgentContext {
            agent: "cli-specialist".to_string(),
            capability_tags: tags.iter().map(|t| t.to_string()).collect(),
            in_progress_count: 0,
        }
    }

    #[test]
    fn valid_assignment_can_proceed() {
        let spec = parse_spec(
            "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: t\npriority: P1\ntasks:\n  - id: TASK-001\n    title: t\n    status: ready\n    agent: cli-specialist\n---\nbody\n",
            "docs/specs/backlog/feat-001-x.md",
        ).expect("parse").spec;
        let graph = SpecGraph::build(vec![spec], Vec::new(), Vec::new());
        let config = WorkflowConfig::default();
        let engine = ConstraintEngine::new(&graph, &config);
        let validator = AssignmentValidator::new(&graph, engine);

        let request = AssignmentRequest {
            spec_id: "FEAT-001".to_string(),
            task_id: "TASK-001".to_string(),
            confirm_critical: false,
        };
        let result = validator.validate(&agent(&["cli-specialist"]), &request, &CurrentAssignments::new());
        assert!(result.can_proceed);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn p0_requires_confirm_critical() {
        let spec = parse_spec(
            "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: t\npriority: P0\ntasks:\n  - id: TASK-001\n    title: t\n    status: ready\n    agent: cli-specialist\n---\nbody\n",
            "docs/specs/backlog/feat-001-x.md",
        ).expect("parse").spec;
        let graph = SpecGraph::build(vec![spec], Vec::new(), Vec::new());
        let config = WorkflowConfig::default();
        let engine = ConstraintEngine::new(&graph, &config);
        let validator = AssignmentValidator::new(&graph, engine);

        let request = AssignmentRequest {
            spec_id: "FEAT-001".to_string(),
            task_id: "TASK-001".to_string(),
            confirm_critical: false,
        };
        let result = validator.validate(&agent(&["cli-specialist"]), &request, &CurrentAssignments::new());
        assert!(!result.can_proceed);
        assert!(result.violations.iter().any(|v| v.code == "critical_confirmation_required"));
    }

    #[test]
    fn already_assigned_is_a_violation() {
        let spec = parse_spec(
            "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: t\npriority: P1\ntasks:\n  - id: TASK-001\n    title: t\n    status: ready\n    agent: cli-specialist\n---\nbody\n",
            "docs/specs/backlog/feat-001-x.md",
        ).expect("parse").spec;
        let graph = SpecGraph::build(vec![spec], Vec::new(), Vec::new());
        let config = WorkflowConfig::default();
        let engine = ConstraintEngine::new(&graph, &config);
        let validator = AssignmentValidator::new(&graph, engine);

        let mut assignments = CurrentAssignments::new();
        assignments.insert(("FEAT-001".to_string(), "TASK-001".to_string()), "someone-else".to_string());

        let request = AssignmentRequest {
            spec_id: "FEAT-001".to_string(),
            task_id: "TASK-001".to_string(),
            confirm_critical: false,
        };
        let result = validator.validate(&agent(&["cli-specialist"]), &request, &assignments);
        assert!(result.violations.iter().any(|v| v.code == "already_assigned"));
    }

    #[test]
    fn idempotent_across_repeated_calls() {
        let spec = parse_spec(
            "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: t\npriority: P1\ntasks:\n  - id: TASK-001\n    title: t\n    status: ready\n    agent: cli-specialist\n---\nbody\n",
            "docs/specs/backlog/feat-001-x.md",
        ).expect("parse").spec;
        let graph = SpecGraph::build(vec![spec], Vec::new(), Vec::new());
        let config = WorkflowConfig::default();
        let engine = ConstraintEngine::new(&graph, &config);
        let validator = AssignmentValidator::new(&graph, engine);

        let request = AssignmentRequest {
            spec_id: "FEAT-001".to_string(),
            task_id: "TASK-001".to_string(),
            confirm_critical: true,
        };
        let a = agent(&["cli-specialist"]);
        let r1 = validator.validate(&a, &request, &CurrentAssignments::new());
        let r2 = validator.validate(&a, &request, &CurrentAssignments::new());
        assert_eq!(r1.can_proceed, r2.can_proceed);
        assert_eq!(r1.violations, r2.violations);
    }
}
