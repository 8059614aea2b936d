//! The automated state-sync engine: consumes `change_analyzed`, decides
//! whether a change warrants validation, and reconciles workflow state
//! with the spec tree when it does.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use workflow_bus::{topics, Event, EventBus};
use workflow_core::{TaskStatus, WorkflowConfig};
use workflow_state::StateManager;
use workflow_store::SpecStore;
use workflow_watch::{ChangeAnalysis, ChangeType, Impact};

/// Decides whether an observed, classified change warrants a validation
/// and reconciliation pass, per the fixed decision rules: any `high`
/// impact change always does; a `medium` impact change only if it carries
/// a workflow-significant status or handoff transition, or is a change to
/// the workflow-state JSON document itself (its impact is only ever
/// reported as `medium` when something actually moved); everything else is
/// ignored.
pub fn should_trigger_validation(analysis: &ChangeAnalysis) -> bool {
    match analysis.impact {
        Impact::High => true,
        Impact::Medium => {
            analysis
                .status_change
                .as_ref()
                .is_some_and(|s| s.is_workflow_change)
                || analysis.assignment_change.as_ref().is_some_and(|a| a.is_handoff)
                || analysis.change_type == ChangeType::Json
        }
        Impact::Low => false,
    }
}

/// Reconciles workflow state against the spec tree in response to
/// classified filesystem changes, and tracks irreconcilable disagreements
/// as conflict records rather than overwriting either side.
pub struct SyncEngine {
    store: Arc<SpecStore>,
    state: Arc<StateManager>,
    bus: Arc<EventBus>,
    config: WorkflowConfig,
    conflicts_dir: PathBuf,
}

impl SyncEngine {
    /// Construct an engine writing conflict records under `conflicts_dir`.
    pub fn new(
        store: Arc<SpecStore>,
        state: Arc<StateManager>,
        bus: Arc<EventBus>,
        config: WorkflowConfig,
        conflicts_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            state,
            bus,
            config,
            conflicts_dir: conflicts_dir.into(),
        }
    }

    /// Subscribe to `change_analyzed` and drive the reconciliation pipeline
    /// for every event that passes [`should_trigger_validation`]. Returns
    /// the subscription handle; dropping the engine without unsubscribing
    /// leaves the background dispatch running.
    pub fn start(self: Arc<Self>) -> workflow_bus::Subscription {
        let engine = Arc::clone(&self);
        self.bus.subscribe(
            topics::CHANGE_ANALYZED,
            Arc::new(move |event: Event| {
                if let Ok(analysis) = serde_json::from_value::<ChangeAnalysis>(event.payload.clone()) {
                    engine.reconcile(&analysis);
                } else {
                    tracing::warn!("received malformed change_analyzed payload");
                }
            }),
        )
    }

    /// Run the reload -> validate -> reconcile pipeline for one classified
    /// change. Public so callers (and tests) can drive it synchronously
    /// without going through the event bus.
    pub fn reconcile(&self, analysis: &ChangeAnalysis) {
        if !should_trigger_validation(analysis) {
            return;
        }

        if let Err(e) = self.store.load_all() {
            tracing::error!(error = %e, "spec store reload failed during sync");
            self.bus.publish(
                topics::COMPONENT_ERROR,
                serde_json::json!({"component": "sync_engine", "detail": e.to_string()}),
            );
            return;
        }

        let report = {
            let graph = self.store.graph();
            workflow_integrity::validate(&graph, &self.config)
        };

        if report.has_errors() {
            tracing::warn!(
                errors = report.errors().count(),
                "integrity validation failed; skipping state reconciliation for this change"
            );
            return;
        }

        for task_change in &analysis.task_status_changes {
            let Some(spec_id) = &analysis.spec_id else { continue };
            if let Some(conflict) = self.detect_conflict(spec_id, &task_change.task_id, task_change.to) {
                self.record_conflict(spec_id, &task_change.task_id, &conflict);
                continue;
            }
            match self.state.sync_spec_state(spec_id, &task_change.task_id, task_change.to) {
                Ok(Some(note)) => tracing::info!(spec_id, task_id = %task_change.task_id, note, "reconciled workflow state"),
                Ok(None) => {}
                Err(e) => tracing::warn!(spec_id, task_id = %task_change.task_id, error = %e, "state reconciliation failed"),
            }
        }
    }

    /// Checks whether an externally observed completion disagrees with an
    /// already-recorded completion in a way neither side can unilaterally
    /// resolve (the spec file and workflow state both claim an outcome and
    /// those claims conflict).
    fn detect_conflict(&self, spec_id: &str, task_id: &str, observed_status: TaskStatus) -> Option<String> {
        if observed_status != TaskStatus::Complete {
            return None;
        }
        let spec = self.store.load(spec_id).ok().flatten()?;
        let task = spec.task(task_id)?;
        let recorded = self.state.find_completed(spec_id, task_id).ok().flatten()?;
        let (Some(spec_completed), Some(recorded_completed)) = (task.completed, recorded.completed_at) else {
            return None;
        };
        if (spec_completed - recorded_completed).num_seconds().abs() > 5 {
            return Some(format!(
                "spec reports completed_at={spec_completed}, workflow state already recorded completed_at={recorded_completed}"
            ));
        }
        None
    }

    fn record_conflict(&self, spec_id: &str, task_id: &str, detail: &str) {
        tracing::warn!(spec_id, task_id, detail, "conflict detected; leaving both sides untouched");
        if let Err(e) = write_conflict_record(&self.conflicts_dir, spec_id, task_id, detail) {
            tracing::error!(error = %e, "failed to write conflict record");
        }
        // Not one of the fixed dispatch-table topics in `workflow_bus::topics`
        // (those cover the core pipeline); topic names are plain strings so
        // this one is introduced here rather than touching that crate.
        self.bus.publish(
            "conflict_detected",
            serde_json::json!({
                "spec_id": spec_id,
                "task_id": task_id,
                "detail": detail,
            }),
        );
    }
}

fn write_conflict_record(dir: &Path, spec_id: &str, task_id: &str, detail: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let filename = format!("{spec_id}-{task_id}-{}.json", chrono::Utc::now().timestamp());
    let record = serde_json::json!({
        "spec_id": spec_id,
        "task_id": task_id,
        "detail": detail,
        "detected_at": chrono::Utc::now(),
    });
    workflow_store::atomic_write(&dir.join(filename), &serde_json::to_string_pretty(&record)?)
        .map_err(|e| std::io::Error::other(e.to_string()))
}
