//! Pure scoring: given a candidate `(agent, task)` pair and a snapshot of
//! the agent's current workload, compute the four multipliers the Task
//! Router and Assignment Validator both build on.
//!
//! Nothing here touches disk or the workflow-state document directly; the
//! caller supplies [`AgentContext`] built from whatever snapshot it holds.

use workflow_core::{Priority, Task, TaskStatus, WorkflowConfig};
use workflow_store::SpecGraph;

/// What the engine needs to know about a candidate agent, independent of
/// any one task. Callers (the Task Router, the Assignment Validator) build
/// this from a Workflow State snapshot plus agent capability config.
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    /// Agent identifier.
    pub agent: String,
    /// Capability tags this agent holds.
    pub capability_tags: Vec<String>,
    /// Count of tasks currently `in_progress` and assigned to this agent.
    pub in_progress_count: u32,
}

/// The breakdown behind a candidate's final score, kept around so the
/// Assignment Validator and Task Router can explain a decision rather than
/// just report a number.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    /// Capability match multiplier, in `[0, 1]`.
    pub skill_multiplier: f64,
    /// Concurrent-workload multiplier, in `[0, 1]`.
    pub workload_multiplier: f64,
    /// Static priority weight.
    pub priority_weight: f64,
    /// `1.0` if all dependencies are satisfied, `0.0` otherwise.
    pub dependency_multiplier: f64,
    /// Any explanatory violations discovered while scoring (zero
    /// multipliers always carry at least one).
    pub violations: Vec<String>,
}

impl ScoreBreakdown {
    /// Product of all four multipliers.
    pub fn total(&self) -> f64 {
        self.skill_multiplier * self.workload_multiplier * self.priority_weight * self.dependency_multiplier
    }
}

/// Scores candidate `(agent, task)` pairs against the spec graph and
/// engine configuration. Stateless and cheap to construct; holds only
/// borrowed references for the duration of a scoring call.
pub struct ConstraintEngine<'a> {
    graph: &'a SpecGraph,
    config: &'a WorkflowConfig,
}

impl<'a> ConstraintEngine<'a> {
    /// Build an engine over the given graph and configuration.
    pub fn new(graph: &'a SpecGraph, config: &'a WorkflowConfig) -> Self {
        Self { graph, config }
    }

    /// Score `task` (owned by `spec_id`) for `agent`.
    pub fn score(&self, spec_id: &str, task: &Task, priority: Priority, agent: &AgentContext) -> ScoreBreakdown {
        let mut violations = Vec::new();

        let skill_multiplier = match &task.agent {
            Some(required_tag) => {
                let m = self.config.skill_multiplier(required_tag, &agent.capability_tags);
                if m == 0.0 {
                    violations.push(format!(
                        "agent '{}' lacks capability '{required_tag}' (no adjacency credit either)",
                        agent.agent
                    ));
                }
                m
            }
            None => 1.0,
        };

        let workload_multiplier = self.workload_multiplier(agent, &mut violations);

        let dependency_multiplier = if self.is_blocked(spec_id, task) {
            violations.push(format!("task '{}' has unsatisfied dependencies", task.id));
            0.0
        } else {
            1.0
        };

        ScoreBreakdown {
            skill_multiplier,
            workload_multiplier,
            priority_weight: priority.weight(),
            dependency_multiplier,
            violations,
        }
    }

    fn workload_multiplier(&self, agent: &AgentContext, violations: &mut Vec<String>) -> f64 {
        let soft = self.config.soft_concurrent_per_agent();
        let hard = self.config.max_concurrent_per_agent();
        let current = agent.in_progress_count;

        if current >= hard {
            violations.push(format!(
                "agent '{}' is at the concurrent-task limit ({current}/{hard})",
                agent.agent
            ));
            return 0.0;
        }
        if current <= soft {
            return 1.0;
        }
        // Linear decay from 1.0 at `soft` to 0.0 at `hard`.
        let span = (hard - soft).max(1) as f64;
        let over = (current - soft) as f64;
        (1.0 - over / span).clamp(0.0, 1.0)
    }

    /// Whether `task` has any dependency (intra- or cross-spec) that is
    /// not yet [`TaskStatus::Complete`].
    pub fn is_blocked(&self, spec_id: &str, task: &Task) -> bool {
        task.depends_on.iter().any(|dep| match self.graph.resolve_task(spec_id, dep) {
            Some((_, dep_task)) => dep_task.status != TaskStatus::Complete,
            // An unresolvable reference is an Integrity Validator finding,
            // not something the scoring layer should silently pass through.
            None => true,
        })
    }

    /// The ordered chain of unmet dependencies blocking `task`, walked
    /// transitively. Stops at the first dependency of each link that is
    /// itself incomplete; does not attempt to break cycles (the Integrity
    /// Validator's acyclic-dependencies check owns that).
    pub fn dependency_chain(&self, spec_id: &str, task: &Task) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current_spec = spec_id.to_string();
        let mut current_task = task.clone();
        let mut guard = 0;
        loop {
            guard += 1;
            if guard > 256 {
                break;
            }
            let Some(next_dep) = current_task
                .depends_on
                .iter()
                .find(|dep| {
                    self.graph
                        .resolve_task(&current_spec, dep)
                        .map(|(_, t)| t.status != TaskStatus::Complete)
                        .unwrap_or(true)
                })
                .cloned()
            else {
                break;
            };
            chain.push(next_dep.clone());
            let Some((dep_spec, dep_task)) = self.graph.resolve_task(&current_spec, &next_dep) else {
                break;
            };
            current_spec = dep_spec.id.clone();
            current_task = dep_task.clone();
        }
        chain
    }
}
