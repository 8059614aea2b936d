//! The `complete-current` pipeline: lint, test, commit the in-progress
//! task, then evaluate a handoff. Any failure from step 5 onward is
//! recorded as a warning, not a pipeline failure — the task is already
//! complete in workflow state by that point.

use std::time::Instant;

use uuid::Uuid;
use workflow_bus::topics;
use workflow_core::{WorkflowError, WorkflowResult};
use workflow_handoff::{HandoffEngine, HandoffRequest};

use crate::audit::AuditOutcome;
use crate::external;
use crate::services::Services;

use super::integrity_gate;

const MAX_COMMIT_RETRIES: u32 = 3;

/// Options accepted from the `complete-current` subcommand.
pub struct CompleteCurrentOptions {
    pub agent: String,
    pub spec: Option<String>,
    pub task: Option<String>,
    pub notes: Option<String>,
    pub skip_lint: bool,
    pub skip_tests: bool,
    pub skip_commit: bool,
}

pub async fn run(services: &Services, options: CompleteCurrentOptions) -> WorkflowResult<serde_json::Value> {
    let start = Instant::now();
    let invocation_id = Uuid::new_v4();
    let audit = &services.audit;
    let mut warnings: Vec<String> = Vec::new();

    // Step 1: determine target task.
    let (spec_id, task_id) = resolve_target(services, &options)?;
    audit.record(
        invocation_id,
        "resolve_target",
        serde_json::json!({"spec_id": spec_id, "task_id": task_id}),
        AuditOutcome::Success,
    );

    // Step 1b: refuse to complete a task out of a spec (or a spec it
    // references) the Integrity Validator flags.
    if let Err(e) = integrity_gate(services, Some(&spec_id)) {
        audit.record(invocation_id, "integrity_gate", serde_json::json!({"error": e.to_string()}), AuditOutcome::Failure);
        return Err(e);
    }

    // Step 2: begin file-tracking window. Best-effort: a VCS status
    // failure here is recorded but does not abort the pipeline, since
    // nothing has been staged yet.
    let tracked_before = file_tracking_snapshot(services).await;
    audit.record(invocation_id, "file_tracking_window_opened", serde_json::json!({}), AuditOutcome::Success);

    // Step 3: lint, with a single auto-fix retry.
    if !options.skip_lint {
        if let Some(lint) = services.config.lint_tool() {
            let first = external::run(lint, &[], None).await;
            let passed = match first {
                Ok(output) if output.success => true,
                _ => {
                    audit.record(invocation_id, "lint_retry", serde_json::json!({"attempt": 1}), AuditOutcome::Warning);
                    let autofix = external::run(lint, &["--fix"], None).await?;
                    autofix.success
                }
            };
            if !passed {
                audit.record(invocation_id, "lint", serde_json::json!({}), AuditOutcome::Failure);
                return Err(WorkflowError::ExternalToolFailure {
                    tool: "lint".to_string(),
                    detail: "lint failed after auto-fix retry".to_string(),
                });
            }
            audit.record(invocation_id, "lint", serde_json::json!({}), AuditOutcome::Success);
        }
    }

    // Step 4: tests.
    if !options.skip_tests {
        if let Some(test) = services.config.test_tool() {
            let result = external::run(test, &[], None).await?;
            if !result.success {
                audit.record(invocation_id, "test", serde_json::json!({"output": result.combined_output}), AuditOutcome::Failure);
                return Err(WorkflowError::ExternalToolFailure {
                    tool: "test".to_string(),
                    detail: result.combined_output,
                });
            }
            audit.record(invocation_id, "test", serde_json::json!({}), AuditOutcome::Success);
        }
    }

    // Step 5: commit the completion. Every failure from here on is a
    // warning; the task is already complete once this call returns.
    let completion = services.state.complete_task(&spec_id, &task_id, options.notes.clone(), &options.agent)?;
    audit.record(
        invocation_id,
        "complete_task",
        serde_json::json!({"spec_id": spec_id, "task_id": task_id, "duration_hours": completion.duration_hours}),
        AuditOutcome::Success,
    );
    services
        .bus
        .publish(topics::TASK_COMPLETED, serde_json::json!({"spec_id": spec_id, "task_id": task_id, "agent": options.agent}));

    // Step 6: stage and commit.
    if !options.skip_commit {
        match commit_with_retry(services, &spec_id, &task_id, tracked_before).await {
            Ok(()) => audit.record(invocation_id, "commit", serde_json::json!({}), AuditOutcome::Success),
            Err(e) => {
                audit.record(invocation_id, "commit", serde_json::json!({"error": e.to_string()}), AuditOutcome::Warning);
                warnings.push(format!("commit step failed: {e}"));
            }
        }
    }

    // Step 7: handoff evaluation.
    let handoff = {
        services.store.load_all()?;
        let graph = services.store.graph();
        let engine = HandoffEngine::new(&graph);
        engine.evaluate(&HandoffRequest {
            spec_id: spec_id.clone(),
            task_id: task_id.clone(),
            from_agent: options.agent.clone(),
            context: serde_json::json!({}),
        })
    };
    if handoff.handoff_needed {
        services.bus.publish(
            topics::HANDOFF_TRIGGERED,
            serde_json::json!({"from_spec": spec_id, "from_task": task_id, "next_task": handoff.next_task, "next_agent": handoff.next_agent}),
        );
    }
    audit.record(invocation_id, "handoff", serde_json::to_value(&handoff).unwrap_or_default(), AuditOutcome::Success);

    // Step 8: result.
    Ok(serde_json::json!({
        "success": true,
        "task_completed": {"spec_id": spec_id, "task_id": task_id},
        "handoff": handoff,
        "warnings": warnings,
        "performance": {"total_ms": start.elapsed().as_millis()},
    }))
}

fn resolve_target(services: &Services, options: &CompleteCurrentOptions) -> WorkflowResult<(String, String)> {
    let assignments = services.state.current_assignments()?;
    let mine: Vec<_> = assignments.into_iter().filter(|a| a.assigned_agent == options.agent).collect();

    if let (Some(spec_id), Some(task_id)) = (&options.spec, &options.task) {
        return if mine.iter().any(|a| &a.spec_id == spec_id && &a.task_id == task_id) {
            Ok((spec_id.clone(), task_id.clone()))
        } else {
            Err(WorkflowError::NotInProgress {
                spec_id: spec_id.clone(),
                task_id: task_id.clone(),
            })
        };
    }

    match mine.as_slice() {
        [only] => Ok((only.spec_id.clone(), only.task_id.clone())),
        [] => Err(WorkflowError::NotInProgress {
            spec_id: options.spec.clone().unwrap_or_default(),
            task_id: options.task.clone().unwrap_or_default(),
        }),
        many => Err(WorkflowError::ValidationViolation(format!(
            "agent '{}' has {} in-progress tasks; pass --spec/--task to disambiguate: {}",
            options.agent,
            many.len(),
            many.iter().map(|a| format!("{}/{}", a.spec_id, a.task_id)).collect::<Vec<_>>().join(", ")
        ))),
    }
}

async fn file_tracking_snapshot(services: &Services) -> Vec<String> {
    let Some(vcs) = services.config.vcs_tool() else { return Vec::new() };
    match external::run(vcs, &["status", "--porcelain"], None).await {
        Ok(output) => output.combined_output.lines().map(|l| l.trim().to_string()).collect(),
        Err(_) => Vec::new(),
    }
}

async fn commit_with_retry(services: &Services, spec_id: &str, task_id: &str, tracked_before: Vec<String>) -> WorkflowResult<()> {
    let Some(vcs) = services.config.vcs_tool() else { return Ok(()) };
    let message = format!("Complete {spec_id}/{task_id}");

    let current = file_tracking_snapshot(services).await;
    let newly_modified: Vec<String> = current.into_iter().filter(|l| !tracked_before.contains(l)).collect();
    if newly_modified.is_empty() && tracked_before.is_empty() {
        return Ok(());
    }

    external::run(vcs, &["add", "-A"], None).await?;

    let mut attempt = 0;
    loop {
        let result = external::run(vcs, &["commit", "-m", &message], None).await?;
        if result.success {
            return Ok(());
        }
        attempt += 1;
        if attempt >= MAX_COMMIT_RETRIES {
            return Err(WorkflowError::ExternalToolFailure {
                tool: "vcs".to_string(),
                detail: format!("commit failed after {attempt} attempts: {}", result.combined_output),
            });
        }
        // A pre-commit hook may have reformatted tracked files; re-stage
        // and try again.
        external::run(vcs, &["add", "-A"], None).await?;
    }
}
