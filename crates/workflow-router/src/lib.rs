//! Ranks every eligible task across the spec graph for a given agent and
//! recommends the best one, with runner-up alternatives for dry-run
//! display.

use std::collections::HashMap;

use workflow_constraints::{AgentContext, ConstraintEngine, ScoreBreakdown};
use workflow_core::{SpecStatus, Task, TaskStatus};
use workflow_store::SpecGraph;

/// Caller-supplied narrowing applied after scoring.
#[derive(Debug, Clone, Default)]
pub struct TaskFilters {
    /// Restrict to tasks whose owning spec has this priority.
    pub priority: Option<workflow_core::Priority>,
    /// Restrict to tasks whose owning spec carries this tag.
    pub tag: Option<String>,
    /// Restrict to a single spec.
    pub spec_id: Option<String>,
}

/// Who currently holds an in-progress assignment for a given `(spec_id,
/// task_id)`, as recorded by the Workflow State Manager. The Task Router
/// needs only this slice of state, not the full assignment history.
pub type CurrentAssignments = HashMap<(String, String), String>;

/// One scored candidate.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Spec the task belongs to.
    pub spec_id: String,
    /// The task itself.
    pub task: Task,
    /// Scoring breakdown behind `score`.
    pub breakdown: ScoreBreakdown,
}

impl Candidate {
    /// Convenience accessor for the final score.
    pub fn score(&self) -> f64 {
        self.breakdown.total()
    }
}

/// Result of [`TaskRouter::next_task`].
#[derive(Debug, Clone)]
pub struct NextTaskResult {
    /// Top-ranked candidate, if any eligible task survived scoring and
    /// filtering.
    pub task: Option<Candidate>,
    /// Runner-up candidates, for dry-run display.
    pub alternatives: Vec<Candidate>,
    /// Human-readable explanation of the top pick (or why there was none).
    pub reasoning: String,
    /// How many tasks were eligible (scored > 0) before filters were
    /// applied, and how many matched this agent's capability at all.
    pub metadata: NextTaskMetadata,
}

/// Summary counts surfaced alongside a [`NextTaskResult`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NextTaskMetadata {
    /// Count of eligible (non-zero score) tasks across the whole graph.
    pub total_available: usize,
    /// Count of those where the agent's capability tags scored > 0 on the
    /// skill multiplier specifically.
    pub agent_matches: usize,
}

const DEFAULT_ALTERNATIVES: usize = 3;

/// Selects and ranks tasks for an agent. Borrows the spec graph and
/// constraint engine for the duration of a call; build fresh per request
/// rather than holding one across a reload.
pub struct TaskRouter<'a> {
    graph: &'a SpecGraph,
    engine: ConstraintEngine<'a>,
}

impl<'a> TaskRouter<'a> {
    /// Build a router over `graph`, scoring with `engine`.
    pub fn new(graph: &'a SpecGraph, engine: ConstraintEngine<'a>) -> Self {
        Self { graph, engine }
    }

    /// Borrow the constraint engine this router scores with.
    pub fn constraint_engine(&self) -> &ConstraintEngine<'a> {
        &self.engine
    }

    /// Every task across all non-done specs eligible for assignment
    /// consideration (before scoring or filtering): `ready`, or
    /// `in_progress` and already held by `agent.agent` (self-resumption).
    pub fn all_tasks(&self, agent: &AgentContext, assignments: &CurrentAssignments) -> Vec<(String, Task)> {
        self.graph
            .all()
            .filter(|spec| spec.status != SpecStatus::Done)
            .flat_map(|spec| spec.tasks.iter().map(move |task| (spec.id.clone(), task.clone())))
            .filter(|(spec_id, task)| self.is_eligible_status(spec_id, task, agent, assignments))
            .collect()
    }

    fn is_eligible_status(
        &self,
        spec_id: &str,
        task: &Task,
        agent: &AgentContext,
        assignments: &CurrentAssignments,
    ) -> bool {
        match task.status {
            TaskStatus::Ready => true,
            TaskStatus::InProgress => assignments
                .get(&(spec_id.to_string(), task.id.clone()))
                .map(|holder| holder == &agent.agent)
                .unwrap_or(false),
            TaskStatus::Complete | TaskStatus::Blocked => false,
        }
    }

    /// The full dependency chain blocking `task_id` within `spec_id`, or an
    /// empty vec if it is not currently blocked or does not exist.
    pub fn dependency_chain(&self, spec_id: &str, task_id: &str) -> Vec<String> {
        let Some(spec) = self.graph.get(spec_id) else { return Vec::new() };
        let Some(task) = spec.task(task_id) else { return Vec::new() };
        self.engine.dependency_chain(spec_id, task)
    }

    /// Score, filter, and rank eligible tasks for `agent`, returning the
    /// top pick plus alternatives.
    pub fn next_task(
        &self,
        agent: &AgentContext,
        filters: &TaskFilters,
        assignments: &CurrentAssignments,
    ) -> NextTaskResult {
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut agent_matches = 0usize;

        for spec in self.graph.all() {
            if spec.status == SpecStatus::Done {
                continue;
            }
            if let Some(spec_id) = &filters.spec_id {
                if &spec.id != spec_id {
                    continue;
                }
            }
            if let Some(priority) = filters.priority {
                if spec.priority != priority {
                    continue;
                }
            }
            if let Some(tag) = &filters.tag {
                if !spec.tags.contains(tag) {
                    continue;
                }
            }

            for task in &spec.tasks {
                if !self.is_eligible_status(&spec.id, task, agent, assignments) {
                    continue;
                }
                let breakdown = self.engine.score(&spec.id, task, spec.priority, agent);
                if breakdown.skill_multiplier > 0.0 {
                    agent_matches += 1;
                }
                if breakdown.total() <= 0.0 {
                    continue;
                }
                candidates.push(Candidate {
                    spec_id: spec.id.clone(),
                    task: task.clone(),
                    breakdown,
                });
            }
        }

        let total_available = candidates.len();
        candidates.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| task_priority(self.graph, &a.spec_id).cmp(&task_priority(self.graph, &b.spec_id)))
                .then_with(|| spec_created(self.graph, &a.spec_id).cmp(&spec_created(self.graph, &b.spec_id)))
        });

        let top = candidates.first().cloned();
        let alternatives = candidates.iter().skip(1).take(DEFAULT_ALTERNATIVES).cloned().collect();

        let reasoning = match &top {
            Some(c) => format!(
                "selected {}/{} (score {:.3}: priority {:.2} x skill {:.2} x workload {:.2} x dependency {:.2})",
                c.spec_id,
                c.task.id,
                c.score(),
                c.breakdown.priority_weight,
                c.breakdown.skill_multiplier,
                c.breakdown.workload_multiplier,
                c.breakdown.dependency_multiplier
            ),
            None => "no eligible task scored above zero for this agent under the given filters".to_string(),
        };

        NextTaskResult {
            task: top,
            alternatives,
            reasoning,
            metadata: NextTaskMetadata {
                total_available,
                agent_matches,
            },
        }
    }
}

fn task_priority(graph: &SpecGraph, spec_id: &str) -> workflow_core::Priority {
    graph.get(spec_id).map(|s| s.priority).unwrap_or(workflow_core::Priority::P3)
}

fn spec_created(graph: &SpecGraph, spec_id: &str) -> chrono::DateTime<chrono::Utc> {
    graph
        .get(spec_id)
        .and_then(|s| s.created)
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC)
}
