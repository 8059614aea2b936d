use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use workflow_core::{WorkflowError, WorkflowResult};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// An exclusive, advisory file lock implemented via atomic creation of a
/// sibling `.lock` file (`create_new` fails if it already exists, which is
/// atomic on every target filesystem this engine runs on). Dropping the
/// guard removes the lock file.
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    /// Acquire the lock for `state_path`, polling until `timeout` elapses.
    /// Returns [`WorkflowError::LockTimeout`] if the lock is still held by
    /// someone else when the timeout is reached.
    pub fn acquire(state_path: &Path, timeout: Duration) -> WorkflowResult<Self> {
        let lock_path = state_path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let deadline = Instant::now() + timeout;
        loop {
            match std::fs::OpenOptions::new().write(true).create_new(true).open(&lock_path) {
                Ok(_) => return Ok(StateLock { path: lock_path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(WorkflowError::LockTimeout {
                            timeout_ms: timeout.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release state lock file");
        }
    }
}
