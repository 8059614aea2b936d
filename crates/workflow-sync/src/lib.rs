//! Automated, change-driven reconciliation between the spec tree and
//! workflow state, plus periodic component health aggregation.

mod engine;
/// Component liveness tracking and `health_check_complete` aggregation.
pub mod health;

pub use engine::{should_trigger_validation, SyncEngine};
pub use health::{spawn_periodic, Component, HealthMonitor, Liveness, Overall};
