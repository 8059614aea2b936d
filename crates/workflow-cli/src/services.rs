//! Shared, already-constructed components handed to each command
//! orchestrator, built once per invocation in `main`.

use std::sync::Arc;

use workflow_bus::EventBus;
use workflow_core::WorkflowConfig;
use workflow_state::StateManager;
use workflow_store::SpecStore;

use crate::audit::AuditLog;

pub struct Services {
    pub store: Arc<SpecStore>,
    pub state: Arc<StateManager>,
    pub config: Arc<WorkflowConfig>,
    pub bus: Arc<EventBus>,
    pub audit: Arc<AuditLog>,
}
