//! The `start-next` pipeline: resolve an agent, ask the Task Router for a
//! recommendation, prove it with the Assignment Validator, then commit.

use std::time::Instant;

use uuid::Uuid;
use workflow_bus::topics;
use workflow_constraints::ConstraintEngine;
use workflow_core::{Priority, WorkflowResult};
use workflow_router::{TaskFilters, TaskRouter};
use workflow_validator::{AssignmentRequest, AssignmentValidator};

use crate::audit::AuditOutcome;
use crate::services::Services;

use super::{agent_context, integrity_gate};

/// Options accepted from the `start-next` subcommand.
pub struct StartNextOptions {
    pub agent: String,
    pub capabilities: Vec<String>,
    pub priority: Option<Priority>,
    pub tag: Option<String>,
    pub spec: Option<String>,
    pub dry_run: bool,
    pub confirm_critical: bool,
}

pub async fn run(services: &Services, options: StartNextOptions) -> WorkflowResult<serde_json::Value> {
    let start = Instant::now();
    let invocation_id = Uuid::new_v4();
    let audit = &services.audit;

    // Step 1: resolve agent. clap already rejects a missing/empty value
    // before we get here; record it so the pipeline's step numbering in
    // the audit log matches the design one-to-one.
    audit.record(invocation_id, "resolve_agent", serde_json::json!({"agent": options.agent}), AuditOutcome::Success);

    services.store.load_all()?;

    let filters = TaskFilters {
        priority: options.priority,
        tag: options.tag.clone(),
        spec_id: options.spec.clone(),
    };
    let (agent_ctx, current) = agent_context(services, &options.agent, &options.capabilities)?;

    // Step 2: Task Router recommendation.
    let recommendation = {
        let graph = services.store.graph();
        let engine = ConstraintEngine::new(&graph, &services.config);
        let router = TaskRouter::new(&graph, engine);
        router.next_task(&agent_ctx, &filters, &current)
    };
    audit.record(
        invocation_id,
        "task_router",
        serde_json::json!({"reasoning": recommendation.reasoning, "total_available": recommendation.metadata.total_available}),
        AuditOutcome::Success,
    );

    // Step 3: no recommendation -> suggestions, no error.
    let Some(candidate) = recommendation.task else {
        let suggestions = no_candidate_suggestions(&options.agent, &recommendation.metadata);
        audit.record(invocation_id, "no_recommendation", serde_json::json!({"suggestions": suggestions}), AuditOutcome::Warning);
        return Ok(serde_json::json!({
            "success": true,
            "assigned": false,
            "suggestions": suggestions,
            "performance": {"total_ms": start.elapsed().as_millis()},
        }));
    };

    // Step 3b: refuse to assign out of a spec (or a spec it references)
    // that the Integrity Validator flags — a duplicate id, a dangling
    // reference, a dependency cycle, etc. This runs after routing rather
    // than before, since the target spec is only known once the Task
    // Router has picked a candidate.
    if let Err(e) = integrity_gate(services, Some(&candidate.spec_id)) {
        audit.record(invocation_id, "integrity_gate", serde_json::json!({"error": e.to_string()}), AuditOutcome::Failure);
        return Err(e);
    }

    // Step 4: Assignment Validator.
    let request = AssignmentRequest {
        spec_id: candidate.spec_id.clone(),
        task_id: candidate.task.id.clone(),
        confirm_critical: options.confirm_critical,
    };
    let validation = {
        let graph = services.store.graph();
        let engine = ConstraintEngine::new(&graph, &services.config);
        let validator = AssignmentValidator::new(&graph, engine);
        validator.validate(&agent_ctx, &request, &current)
    };
    audit.record(
        invocation_id,
        "assignment_validator",
        serde_json::json!({"can_proceed": validation.can_proceed, "violations": violation_messages(&validation.violations)}),
        if validation.can_proceed { AuditOutcome::Success } else { AuditOutcome::Warning },
    );

    if !validation.can_proceed {
        return Ok(serde_json::json!({
            "success": false,
            "assigned": false,
            "violations": violation_messages(&validation.violations),
            "warnings": validation.warnings,
            "performance": {"total_ms": start.elapsed().as_millis()},
        }));
    }

    // Step 5: dry-run short-circuit.
    if options.dry_run {
        audit.record(invocation_id, "dry_run", serde_json::json!({"would_assign": &request.task_id}), AuditOutcome::Success);
        return Ok(serde_json::json!({
            "success": true,
            "assigned": false,
            "dry_run": true,
            "would_assign": {"spec_id": candidate.spec_id, "task_id": candidate.task.id},
            "performance": {"total_ms": start.elapsed().as_millis()},
        }));
    }

    // Step 6: commit the assignment.
    let assignment = services
        .state
        .assign_task(&candidate.spec_id, &candidate.task.id, &options.agent, workflow_state::AssignOptions::default())?;
    audit.record(
        invocation_id,
        "assign_task",
        serde_json::json!({"spec_id": assignment.spec_id, "task_id": assignment.task_id}),
        AuditOutcome::Success,
    );
    services.bus.publish(
        topics::ASSIGNMENT_MADE,
        serde_json::json!({"spec_id": assignment.spec_id, "task_id": assignment.task_id, "agent": assignment.assigned_agent}),
    );

    // Step 7: result.
    Ok(serde_json::json!({
        "success": true,
        "assigned": true,
        "task": {"spec_id": assignment.spec_id, "task_id": assignment.task_id},
        "performance": {"total_ms": start.elapsed().as_millis()},
    }))
}

fn no_candidate_suggestions(agent: &str, metadata: &workflow_router::NextTaskMetadata) -> Vec<String> {
    let mut suggestions = Vec::new();
    if metadata.total_available == 0 {
        suggestions.push("No tasks are currently ready for assignment".to_string());
    } else if metadata.agent_matches == 0 {
        suggestions.push(format!("No tasks match {agent} agent capabilities"));
    } else {
        suggestions.push("No tasks survived the applied filters; try relaxing priority/tag/spec filters".to_string());
    }
    suggestions
}

fn violation_messages(violations: &[workflow_validator::Violation]) -> Vec<String> {
    violations.iter().map(|v| v.message.clone()).collect()
}
