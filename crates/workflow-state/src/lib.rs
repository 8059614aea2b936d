//! The durable source of truth for who is working on what. All mutating
//! operations are serialized through an exclusive lock on the state file
//! and committed via atomic temp-file-then-rename writes.

/// The workflow state document schema.
pub mod document;
mod lock;
mod manager;

pub use document::{Assignment, AssignmentStatus, AuditEvent, ProjectProgress, StateDocument};
pub use lock::StateLock;
pub use manager::{AssignOptions, Completion, SpecReflector, StateManager};
