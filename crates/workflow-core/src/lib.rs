//! Shared types for the workflow automation engine: the spec/task data
//! model, the error taxonomy, configuration, and audit primitives.
//!
//! Every other crate in the workspace depends on this one; it must stay
//! free of filesystem, networking, or process I/O.

/// Configuration loading and the closed set of recognized options.
pub mod config;
/// The error taxonomy and audit entry type.
pub mod error;
/// Spec data model.
pub mod spec;
/// Task data model.
pub mod task;

pub use config::{ExternalTool, WorkflowConfig};
pub use error::{AuditEntry, WorkflowError, WorkflowResult};
pub use spec::{is_valid_spec_id, spec_id_from_filename, Priority, Spec, SpecStatus, SpecType, VariantDetails};
pub use task::{Subtask, Task, TaskStatus};
