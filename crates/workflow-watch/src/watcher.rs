//! Recursive, debounced filesystem watching over the spec tree and the
//! workflow-state document, publishing [`ChangeAnalysis`] events on the
//! shared [`EventBus`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::{EventKind, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};
use workflow_bus::{topics, EventBus};
use workflow_core::{Spec, WorkflowConfig, WorkflowResult};

use crate::classify::{self, ChangeAnalysis};

/// Snapshot of the last parse this watcher observed for each watched path,
/// so a later change can be diffed against it. `None` means the path is
/// the workflow-state JSON document rather than a spec file.
enum Snapshot {
    Spec(Option<Spec>),
    Json(Option<serde_json::Value>),
}

/// Holds the live debouncer and the bookkeeping needed to classify
/// subsequent events. Dropping this stops filesystem monitoring.
pub struct SpecWatcher {
    #[allow(dead_code)]
    debouncer: Debouncer<notify::RecommendedWatcher, FileIdMap>,
}

impl SpecWatcher {
    /// Start watching `specs_root` recursively and `state_path` (the
    /// workflow-state document), publishing `change_analyzed` events on
    /// `bus` once the configured debounce window elapses. Call
    /// [`prime`](Self::prime_snapshots) style seeding happens internally
    /// via an initial best-effort parse of every existing file before the
    /// watcher starts, so the first real edit has something to diff
    /// against.
    pub fn start(
        specs_root: impl Into<PathBuf>,
        state_path: impl Into<PathBuf>,
        config: &WorkflowConfig,
        bus: Arc<EventBus>,
    ) -> WorkflowResult<Self> {
        let specs_root = specs_root.into();
        let state_path = state_path.into();
        let debounce = Duration::from_millis(config.watch_debounce_ms());

        let snapshots = Arc::new(Mutex::new(initial_snapshots(&specs_root, &state_path)));
        let handle = tokio::runtime::Handle::current();
        let state_path_for_callback = state_path.clone();

        let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            let snapshots = Arc::clone(&snapshots);
            let bus = Arc::clone(&bus);
            let state_path = state_path_for_callback.clone();

            match result {
                Ok(events) => {
                    handle.spawn(async move {
                        for event in events {
                            process_event(&event.kind, &event.paths, &snapshots, &state_path, &bus);
                        }
                    });
                }
                Err(errors) => {
                    for error in errors {
                        tracing::warn!(error = %error, "filesystem watch error");
                    }
                }
            }
        })
        .map_err(|e| workflow_core::WorkflowError::Config(format!("failed to create file watcher: {e}")))?;

        debouncer
            .watcher()
            .watch(&specs_root, RecursiveMode::Recursive)
            .map_err(|e| workflow_core::WorkflowError::Config(format!("failed to watch '{}': {e}", specs_root.display())))?;

        if let Some(parent) = state_path.parent() {
            if parent.is_dir() {
                debouncer
                    .watcher()
                    .watch(parent, RecursiveMode::NonRecursive)
                    .map_err(|e| workflow_core::WorkflowError::Config(format!("failed to watch '{}': {e}", parent.display())))?;
            }
        }

        Ok(Self { debouncer })
    }
}

fn initial_snapshots(specs_root: &Path, state_path: &Path) -> HashMap<PathBuf, Snapshot> {
    let mut snapshots = HashMap::new();
    collect_markdown(specs_root, &mut snapshots);
    if let Ok(content) = std::fs::read_to_string(state_path) {
        if let Ok(value) = serde_json::from_str(&content) {
            snapshots.insert(state_path.to_path_buf(), Snapshot::Json(Some(value)));
        }
    }
    snapshots
}

fn collect_markdown(dir: &Path, out: &mut HashMap<PathBuf, Snapshot>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_markdown(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "md") {
            if let Ok(content) = std::fs::read_to_string(&path) {
                if let Ok(parsed) = workflow_store::parse_spec(&content, &path.display().to_string()) {
                    out.insert(path, Snapshot::Spec(Some(parsed.spec)));
                }
            }
        }
    }
}

/// Serialized per-path so two events on the same file never race: this is
/// called from within the debouncer's own async task, one event at a time,
/// in the order the debouncer delivered them.
fn process_event(
    kind: &EventKind,
    paths: &[PathBuf],
    snapshots: &Arc<Mutex<HashMap<PathBuf, Snapshot>>>,
    state_path: &Path,
    bus: &EventBus,
) {
    for path in paths {
        let is_state_file = path == state_path;
        let is_spec_file = path.extension().is_some_and(|ext| ext == "md");
        if !is_state_file && !is_spec_file {
            continue;
        }

        let analysis = if matches!(kind, EventKind::Remove(_)) {
            let mut guard = snapshots.lock().expect("snapshot lock poisoned");
            let previous = guard.remove(path);
            match previous {
                Some(Snapshot::Spec(spec)) => {
                    classify::classify_deleted_spec(&path.display().to_string(), spec.as_ref())
                }
                _ => continue,
            }
        } else if matches!(kind, EventKind::Modify(notify::event::ModifyKind::Name(_))) {
            let guard = snapshots.lock().expect("snapshot lock poisoned");
            let spec_id = match guard.get(path) {
                Some(Snapshot::Spec(Some(spec))) => Some(spec.id.clone()),
                _ => None,
            };
            drop(guard);
            classify::classify_rename(&path.display().to_string(), spec_id.as_deref())
        } else if is_state_file {
            let Ok(content) = std::fs::read_to_string(path) else {
                continue;
            };
            let Ok(current) = serde_json::from_str::<serde_json::Value>(&content) else {
                continue;
            };
            let mut guard = snapshots.lock().expect("snapshot lock poisoned");
            let previous = match guard.get(path) {
                Some(Snapshot::Json(v)) => v.clone(),
                _ => None,
            };
            let analysis = classify::classify_json_change(&path.display().to_string(), previous.as_ref(), &current);
            guard.insert(path.clone(), Snapshot::Json(Some(current)));
            analysis
        } else {
            let Ok(content) = std::fs::read_to_string(path) else {
                continue;
            };
            let Ok(parsed) = workflow_store::parse_spec(&content, &path.display().to_string()) else {
                continue;
            };
            let mut guard = snapshots.lock().expect("snapshot lock poisoned");
            let previous = match guard.get(path) {
                Some(Snapshot::Spec(s)) => s.clone(),
                _ => None,
            };
            let analysis = classify::classify_spec_change(&path.display().to_string(), previous.as_ref(), &parsed.spec);
            guard.insert(path.clone(), Snapshot::Spec(Some(parsed.spec)));
            analysis
        };

        publish(bus, &analysis);
    }
}

fn publish(bus: &EventBus, analysis: &ChangeAnalysis) {
    match serde_json::to_value(analysis) {
        Ok(payload) => bus.publish(topics::CHANGE_ANALYZED, payload),
        Err(e) => tracing::error!(error = %e, "failed to serialize change analysis"),
    }
}
