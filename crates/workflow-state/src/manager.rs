use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use workflow_core::{WorkflowError, WorkflowResult};

use crate::document::{Assignment, AssignmentStatus, AuditEvent, StateDocument};
use crate::lock::StateLock;

/// Options accepted by [`StateManager::assign_task`].
#[derive(Debug, Clone, Default)]
pub struct AssignOptions {
    /// Caller-supplied notes to attach to the assignment at creation time.
    pub notes: Option<String>,
}

/// Result of [`StateManager::complete_task`].
#[derive(Debug, Clone)]
pub struct Completion {
    /// When the assignment was marked complete.
    pub completed_at: chrono::DateTime<Utc>,
    /// Elapsed hours between `started_at` and `completed_at`.
    pub duration_hours: f64,
    /// Notes supplied at completion time, if any.
    pub notes: Option<String>,
}

/// A callback invoked after a state mutation commits, to reflect the new
/// status into the owning spec file's front-matter. Takes `(spec_id,
/// task_id, new_status)`. Implemented by the caller (typically a thin
/// adapter over [`workflow_store::reflect_task_status`]) so this crate does
/// not itself depend on spec-file parsing.
pub trait SpecReflector: Send + Sync {
    /// Attempt to reflect `new_status` into the spec file owning
    /// `(spec_id, task_id)`. Failure here rolls back the state write that
    /// triggered it.
    fn reflect(&self, spec_id: &str, task_id: &str, new_status: &str) -> WorkflowResult<()>;
}

/// The single writer of the workflow state document. All mutating
/// operations acquire [`StateLock`] before reading, mutating, and
/// atomically rewriting the state file.
pub struct StateManager {
    state_path: PathBuf,
    lock_timeout: Duration,
    reflector: Box<dyn SpecReflector>,
    cached: RwLock<Option<StateDocument>>,
}

impl StateManager {
    /// Open a manager over `state_path`, creating an empty document on
    /// first use if the file does not yet exist.
    pub fn new(state_path: impl Into<PathBuf>, lock_timeout: Duration, reflector: Box<dyn SpecReflector>) -> Self {
        Self {
            state_path: state_path.into(),
            lock_timeout,
            reflector,
            cached: RwLock::new(None),
        }
    }

    fn read_document(&self) -> WorkflowResult<StateDocument> {
        if !self.state_path.exists() {
            return Ok(StateDocument::default());
        }
        let content = std::fs::read_to_string(&self.state_path)?;
        serde_json::from_str(&content).map_err(WorkflowError::Serialization)
    }

    fn write_document(&self, doc: &StateDocument) -> WorkflowResult<()> {
        let content = serde_json::to_string_pretty(doc)?;
        workflow_store::atomic_write(&self.state_path, &content)
    }

    /// Read-only snapshot of `current_assignments`. Takes the lock only
    /// long enough to read the file; does not block on writers for long.
    pub fn current_assignments(&self) -> WorkflowResult<Vec<Assignment>> {
        let _lock = StateLock::acquire(&self.state_path, self.lock_timeout)?;
        Ok(self.read_document()?.current_assignments)
    }

    /// Look up a completed assignment record, e.g. for conflict detection
    /// against an externally observed completion timestamp.
    pub fn find_completed(&self, spec_id: &str, task_id: &str) -> WorkflowResult<Option<Assignment>> {
        let _lock = StateLock::acquire(&self.state_path, self.lock_timeout)?;
        Ok(self
            .read_document()?
            .completed_assignments
            .into_iter()
            .find(|a| a.spec_id == spec_id && a.task_id == task_id))
    }

    /// Assign `task_id` in `spec_id` to `agent`. Fails with
    /// [`WorkflowError::AlreadyAssigned`] if another `in_progress` record
    /// for the same `(spec_id, task_id)` already exists.
    pub fn assign_task(
        &self,
        spec_id: &str,
        task_id: &str,
        agent: &str,
        options: AssignOptions,
    ) -> WorkflowResult<Assignment> {
        let _lock = StateLock::acquire(&self.state_path, self.lock_timeout)?;
        let mut doc = self.read_document()?;

        if let Some(existing) = doc.find_current(spec_id, task_id) {
            return Err(WorkflowError::AlreadyAssigned {
                spec_id: spec_id.to_string(),
                task_id: task_id.to_string(),
                assigned_agent: existing.assigned_agent.clone(),
            });
        }

        let now = Utc::now();
        let assignment = Assignment {
            spec_id: spec_id.to_string(),
            task_id: task_id.to_string(),
            assigned_agent: agent.to_string(),
            status: AssignmentStatus::InProgress,
            assigned_at: now,
            started_at: now,
            completed_at: None,
            notes: options.notes,
            audit: vec![AuditEvent::new(
                "assigned",
                serde_json::json!({"agent": agent}),
            )],
        };

        doc.current_assignments.push(assignment.clone());
        doc.refresh_progress();

        if let Err(e) = self.reflector.reflect(spec_id, task_id, "in_progress") {
            tracing::warn!(
                spec_id, task_id, error = %e,
                "spec-file reflection failed during assign_task; rolling back state write"
            );
            return Err(e);
        }

        self.write_document(&doc)?;
        Ok(assignment)
    }

    /// Complete `task_id` in `spec_id`. Fails with
    /// [`WorkflowError::NotInProgress`] if no `in_progress` record exists.
    pub fn complete_task(
        &self,
        spec_id: &str,
        task_id: &str,
        notes: Option<String>,
        completed_by: &str,
    ) -> WorkflowResult<Completion> {
        let _lock = StateLock::acquire(&self.state_path, self.lock_timeout)?;
        let mut doc = self.read_document()?;

        let Some(index) = doc
            .current_assignments
            .iter()
            .position(|a| a.spec_id == spec_id && a.task_id == task_id)
        else {
            return Err(WorkflowError::NotInProgress {
                spec_id: spec_id.to_string(),
                task_id: task_id.to_string(),
            });
        };

        let mut assignment = doc.current_assignments.remove(index);
        let completed_at = Utc::now();
        assignment.status = AssignmentStatus::Complete;
        assignment.completed_at = Some(completed_at);
        assignment.notes = notes.clone();
        assignment.audit.push(AuditEvent::new(
            "completed",
            serde_json::json!({"completed_by": completed_by}),
        ));
        let duration_hours = assignment.duration_hours().unwrap_or(0.0);

        doc.completed_assignments.push(assignment);
        doc.refresh_progress();

        if let Err(e) = self.reflector.reflect(spec_id, task_id, "complete") {
            tracing::warn!(
                spec_id, task_id, error = %e,
                "spec-file reflection failed during complete_task; rolling back state write"
            );
            return Err(e);
        }

        self.write_document(&doc)?;
        Ok(Completion {
            completed_at,
            duration_hours,
            notes,
        })
    }

    /// Reconcile an externally observed spec change with workflow state.
    /// If the spec says a task is complete but the state has it
    /// `in_progress`, completes it attributed to `"external"`. If the spec
    /// says `in_progress` but there is no record, creates a synthetic one
    /// attributed to `"external"` and returns a warning.
    pub fn sync_spec_state(
        &self,
        spec_id: &str,
        task_id: &str,
        observed_status: workflow_core::TaskStatus,
    ) -> WorkflowResult<Option<String>> {
        use workflow_core::TaskStatus;

        match observed_status {
            TaskStatus::Complete => {
                let has_in_progress = {
                    let _lock = StateLock::acquire(&self.state_path, self.lock_timeout)?;
                    self.read_document()?.find_current(spec_id, task_id).is_some()
                };
                if has_in_progress {
                    self.complete_task(spec_id, task_id, None, "external")?;
                    Ok(Some(format!(
                        "spec reported '{spec_id}/{task_id}' complete; reconciled from in_progress"
                    )))
                } else {
                    Ok(None)
                }
            }
            TaskStatus::InProgress => {
                let _lock = StateLock::acquire(&self.state_path, self.lock_timeout)?;
                let mut doc = self.read_document()?;
                if doc.find_current(spec_id, task_id).is_some() {
                    return Ok(None);
                }
                let now = Utc::now();
                doc.current_assignments.push(Assignment {
                    spec_id: spec_id.to_string(),
                    task_id: task_id.to_string(),
                    assigned_agent: "external".to_string(),
                    status: AssignmentStatus::InProgress,
                    assigned_at: now,
                    started_at: now,
                    completed_at: None,
                    notes: None,
                    audit: vec![AuditEvent::new("synthetic_external_assignment", serde_json::json!({}))],
                });
                doc.refresh_progress();
                self.write_document(&doc)?;
                Ok(Some(format!(
                    "spec reported '{spec_id}/{task_id}' in_progress with no workflow-state record; created a synthetic external assignment"
                )))
            }
            _ => Ok(None),
        }
    }

    /// Expose the configured state file path, e.g. for diagnostics.
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopReflector;
    impl SpecReflector for NoopReflector {
        fn reflect(&self, _spec_id: &str, _task_id: &str, _new_status: &str) -> WorkflowResult<()> {
            Ok(())
        }
    }

    struct FailingReflector;
    impl SpecReflector for FailingReflector {
        fn reflect(&self, spec_id: &str, task_id: &str, _new_status: &str) -> WorkflowResult<()> {
            Err(WorkflowError::IntegrityError(format!("cannot reflect {spec_id}/{task_id}")))
        }
    }

    fn manager(dir: &std::path::Path, reflector: Box<dyn SpecReflector>) -> StateManager {
        StateManager::new(dir.join("state.json"), Duration::from_millis(500), reflector)
    }

    #[test]
    fn assign_then_complete_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mgr = manager(dir.path(), Box::new(NoopReflector));

        let assignment = mgr.assign_task("FEAT-001", "TASK-001", "a1", AssignOptions::default()).expect("assign");
        assert_eq!(assignment.assigned_agent, "a1");

        let current = mgr.current_assignments().expect("current");
        assert_eq!(current.len(), 1);

        let completion = mgr.complete_task("FEAT-001", "TASK-001", Some("done".into()), "a1").expect("complete");
        assert!(completion.duration_hours >= 0.0);

        let current_after = mgr.current_assignments().expect("current after");
        assert!(current_after.is_empty());
    }

    #[test]
    fn double_assign_fails_with_already_assigned() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mgr = manager(dir.path(), Box::new(NoopReflector));
        mgr.assign_task("FEAT-001", "TASK-001", "a1", AssignOptions::default()).expect("assign");
        let second = mgr.assign_task("FEAT-001", "TASK-001", "a2", AssignOptions::default());
        assert!(matches!(second, Err(WorkflowError::AlreadyAssigned { .. })));
    }

    #[test]
    fn complete_without_assignment_fails_with_not_in_progress() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mgr = manager(dir.path(), Box::new(NoopReflector));
        let result = mgr.complete_task("FEAT-001", "TASK-001", None, "a1");
        assert!(matches!(result, Err(WorkflowError::NotInProgress { .. })));
    }

    #[test]
    fn reflection_failure_rolls_back_state_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mgr = manager(dir.path(), Box::new(FailingReflector));
        let result = mgr.assign_task("FEAT-001", "TASK-001", "a1", AssignOptions::default());
        assert!(result.is_err());
        let current = mgr.current_assignments().expect("current");
        assert!(current.is_empty());
    }

    #[test]
    fn sync_creates_synthetic_external_assignment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mgr = manager(dir.path(), Box::new(NoopReflector));
        let warning = mgr
            .sync_spec_state("FEAT-001", "TASK-001", workflow_core::TaskStatus::InProgress)
            .expect("sync");
        assert!(warning.is_some());
        let current = mgr.current_assignments().expect("current");
        assert_eq!(current[0].assigned_agent, "external");
    }
}
