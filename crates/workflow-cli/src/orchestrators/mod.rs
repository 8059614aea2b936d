pub mod complete_current;
pub mod start_next;

use std::collections::HashSet;

use workflow_constraints::AgentContext;
use workflow_core::{WorkflowError, WorkflowResult};
use workflow_router::CurrentAssignments;

use crate::services::Services;

/// Refuse to proceed if the Integrity Validator reports an error-severity
/// finding relevant to `spec_id` — the spec itself, or a spec it directly
/// references (dependencies/blocking/related). With `spec_id: None`, any
/// error anywhere in the graph blocks; used before a task has been chosen,
/// since a duplicate id poisons routing for every spec that shares it.
/// Grounded in spec.md §7: "IntegrityError ... [p]revents the
/// start-next/complete pipelines from running with affected specs."
pub fn integrity_gate(services: &Services, spec_id: Option<&str>) -> WorkflowResult<()> {
    let graph = services.store.graph();
    let report = workflow_integrity::validate(&graph, &services.config);

    let relevant: Vec<String> = match spec_id {
        None => report.errors().map(|f| f.message.clone()).collect(),
        Some(id) => {
            let neighbours: HashSet<&str> = graph
                .get(id)
                .map(|spec| {
                    spec.dependencies
                        .iter()
                        .chain(spec.blocking.iter())
                        .chain(spec.related.iter())
                        .map(String::as_str)
                        .collect()
                })
                .unwrap_or_default();
            report
                .errors()
                .filter(|f| f.spec_id == id || neighbours.contains(f.spec_id.as_str()))
                .map(|f| f.message.clone())
                .collect()
        }
    };

    if relevant.is_empty() {
        return Ok(());
    }
    Err(WorkflowError::IntegrityError(format!(
        "integrity validation failed, refusing to proceed: {}",
        relevant.join("; ")
    )))
}

/// Build the [`AgentContext`] and the current-assignments snapshot
/// `workflow-router`/`workflow-validator` need, from the live state
/// document. `agent_name` doubles as the capability tag an exact-match
/// task requires (`task.agent == agent_name`); `extra_capabilities`
/// extends it for agents that also hold adjacent tags.
pub fn agent_context(
    services: &Services,
    agent_name: &str,
    extra_capabilities: &[String],
) -> workflow_core::WorkflowResult<(AgentContext, CurrentAssignments)> {
    let assignments = services.state.current_assignments()?;

    let in_progress_count = assignments.iter().filter(|a| a.assigned_agent == agent_name).count() as u32;

    let mut capability_tags = vec![agent_name.to_string()];
    capability_tags.extend(extra_capabilities.iter().cloned());

    let context = AgentContext {
        agent: agent_name.to_string(),
        capability_tags,
        in_progress_count,
    };

    let current: CurrentAssignments = assignments
        .into_iter()
        .map(|a| ((a.spec_id, a.task_id), a.assigned_agent))
        .collect();

    Ok((context, current))
}
