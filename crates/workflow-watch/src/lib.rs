//! Recursive spec-tree watching, debouncing, and change classification.
//!
//! Watches the spec tree and the workflow-state document for filesystem
//! changes, classifies each one by type and impact, and publishes
//! `change_analyzed` events on the shared event bus for the sync engine to
//! act on.

/// Change-type/impact classification and semantic diffing.
pub mod classify;
mod watcher;

pub use classify::{ChangeAnalysis, ChangeType, Impact, StatusChange, TaskStatusChange, AssignmentChange};
pub use watcher::SpecWatcher;
