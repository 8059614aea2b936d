//! Append-only JSONL audit log for command-orchestrator pipeline steps.
//! Each `start-next`/`complete-current` invocation gets its own audit log
//! accumulated in memory and returned with the command result; this module
//! additionally drains entries to disk in the background, generalized from
//! the agent/tool-call audit shape to workflow step events.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// One step of a command-orchestrator pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub invocation_id: Uuid,
    pub step: String,
    pub details: serde_json::Value,
    pub outcome: AuditOutcome,
}

/// Outcome of a single pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Warning,
    Failure,
}

/// Append-only audit log that records command-orchestrator pipeline steps.
pub struct AuditLog {
    tx: mpsc::UnboundedSender<AuditEntry>,
}

impl AuditLog {
    /// Create a log whose entries are appended to `<log_dir>/audit.jsonl`
    /// by a background task, so callers never block on disk I/O.
    pub fn new(log_dir: PathBuf) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditEntry>();

        tokio::spawn(async move {
            let _ = tokio::fs::create_dir_all(&log_dir).await;
            let log_file = log_dir.join("audit.jsonl");

            while let Some(entry) = rx.recv().await {
                if let Ok(line) = serde_json::to_string(&entry) {
                    if let Ok(mut file) = tokio::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&log_file)
                        .await
                    {
                        use tokio::io::AsyncWriteExt;
                        let _ = file.write_all(format!("{line}\n").as_bytes()).await;
                    }
                }
            }
        });

        Self { tx }
    }

    /// Record one pipeline step. Logs at `info`/`warn` in addition to
    /// queuing the entry for disk persistence.
    pub fn record(&self, invocation_id: Uuid, step: impl Into<String>, details: serde_json::Value, outcome: AuditOutcome) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            invocation_id,
            step: step.into(),
            details,
            outcome,
        };
        match entry.outcome {
            AuditOutcome::Failure => tracing::error!(step = %entry.step, invocation_id = %entry.invocation_id, "pipeline step failed"),
            AuditOutcome::Warning => tracing::warn!(step = %entry.step, invocation_id = %entry.invocation_id, "pipeline step warned"),
            AuditOutcome::Success => tracing::info!(step = %entry.step, invocation_id = %entry.invocation_id, "pipeline step completed"),
        }
        let _ = self.tx.send(entry);
    }
}
