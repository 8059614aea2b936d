//! Adapter wiring [`workflow_state::SpecReflector`] to `workflow-store`'s
//! front-matter rewriter, so `workflow-state` never depends on spec-file
//! parsing directly.

use std::sync::Arc;

use workflow_core::{WorkflowError, WorkflowResult};
use workflow_state::SpecReflector;
use workflow_store::SpecStore;

pub struct StoreReflector {
    store: Arc<SpecStore>,
}

impl StoreReflector {
    pub fn new(store: Arc<SpecStore>) -> Self {
        Self { store }
    }
}

impl SpecReflector for StoreReflector {
    fn reflect(&self, spec_id: &str, task_id: &str, new_status: &str) -> WorkflowResult<()> {
        let path = {
            let graph = self.store.graph();
            graph
                .get(spec_id)
                .and_then(|s| s.file_path.clone())
                .ok_or_else(|| WorkflowError::IntegrityError(format!("spec '{spec_id}' has no known file path")))?
        };
        let path = std::path::Path::new(&path);
        workflow_store::reflect_task_status(path, task_id, new_status)?;
        self.store.invalidate(path);
        Ok(())
    }
}
