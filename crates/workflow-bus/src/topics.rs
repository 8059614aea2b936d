//! Names of the topics the core subsystems publish and subscribe to.
//!
//! Topics are plain strings rather than an enum so that future components
//! can introduce their own without touching this crate, but the core
//! pipeline only ever uses the names below.

/// Raw filesystem events forwarded by the watcher task.
pub const FILE_CHANGE: &str = "file_change";
/// A classified, semantically-analyzed change (emitted by the change
/// detector once debouncing and classification are complete).
pub const CHANGE_ANALYZED: &str = "change_analyzed";
/// A task was assigned to an agent.
pub const ASSIGNMENT_MADE: &str = "assignment_made";
/// A task was marked complete.
pub const TASK_COMPLETED: &str = "task_completed";
/// The handoff engine routed work to a dependent task.
pub const HANDOFF_TRIGGERED: &str = "handoff_triggered";
/// A subsystem reported an internal error it could not surface to a caller
/// directly (e.g. a background sync failure).
pub const COMPONENT_ERROR: &str = "component_error";
/// The health monitor completed a liveness sweep.
pub const HEALTH_CHECK_COMPLETE: &str = "health_check_complete";
