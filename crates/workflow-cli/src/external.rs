//! Runs the configured lint/test/VCS tools as child processes, bounded by
//! a timeout per the external-interfaces design (no env-var contract
//! beyond the inherited process environment).

use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use workflow_core::{ExternalTool, WorkflowError, WorkflowResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Captured stdout+stderr of a finished external tool run.
pub struct ToolOutput {
    pub success: bool,
    pub combined_output: String,
}

/// Run `tool` with an optional trailing argument appended (e.g. a commit
/// message), waiting at most `timeout_duration` (defaults to 5 minutes).
pub async fn run(tool: &ExternalTool, extra_args: &[&str], timeout_duration: Option<Duration>) -> WorkflowResult<ToolOutput> {
    let mut command = Command::new(&tool.command);
    command.args(&tool.args);
    command.args(extra_args);

    let run = command.output();
    let output = match timeout(timeout_duration.unwrap_or(DEFAULT_TIMEOUT), run).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(WorkflowError::ExternalToolFailure {
                tool: tool.command.clone(),
                detail: e.to_string(),
            })
        }
        Err(_) => {
            return Err(WorkflowError::ExternalToolFailure {
                tool: tool.command.clone(),
                detail: "timed out".to_string(),
            })
        }
    };

    let mut combined_output = String::from_utf8_lossy(&output.stdout).into_owned();
    combined_output.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(ToolOutput {
        success: output.status.success(),
        combined_output,
    })
}
