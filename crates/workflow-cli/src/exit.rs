//! Maps the error taxonomy onto the fixed process exit codes.
//!
//! | code | meaning |
//! |------|---------|
//! | 0 | success |
//! | 1 | validation error |
//! | 2 | I/O or lock error |
//! | 3 | external-tool failure |
//! | 4 | integrity error |

use workflow_core::WorkflowError;

pub const SUCCESS: i32 = 0;
pub const VALIDATION_ERROR: i32 = 1;
pub const IO_ERROR: i32 = 2;
pub const EXTERNAL_TOOL_FAILURE: i32 = 3;
pub const INTEGRITY_ERROR: i32 = 4;

/// Translate an error into the exit code a caller scripting against this
/// binary should see.
pub fn code_for(err: &WorkflowError) -> i32 {
    match err {
        WorkflowError::AlreadyAssigned { .. }
        | WorkflowError::NotInProgress { .. }
        | WorkflowError::ValidationViolation(_) => VALIDATION_ERROR,
        WorkflowError::Io(_) | WorkflowError::LockTimeout { .. } | WorkflowError::Config(_) | WorkflowError::Serialization(_) => {
            IO_ERROR
        }
        WorkflowError::ExternalToolFailure { .. } => EXTERNAL_TOOL_FAILURE,
        WorkflowError::ParseError { .. } | WorkflowError::IntegrityError(_) | WorkflowError::ConflictDetected { .. } => {
            INTEGRITY_ERROR
        }
    }
}
