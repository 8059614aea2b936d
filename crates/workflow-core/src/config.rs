use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{WorkflowError, WorkflowResult};

/// An external tool invocation: a command plus its fixed argument list.
/// Tools inherit the process environment; there is no other env-var
/// contract (per the external-interfaces design).
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalTool {
    /// Executable to invoke.
    pub command: String,
    /// Fixed argument list.
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ExternalToolsConfig {
    lint: Option<ExternalTool>,
    test: Option<ExternalTool>,
    vcs: Option<ExternalTool>,
}

impl Default for ExternalToolsConfig {
    fn default() -> Self {
        Self {
            lint: None,
            test: None,
            vcs: Some(ExternalTool {
                command: "git".to_string(),
                args: Vec::new(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct WatchConfig {
    #[serde(rename = "debounceMs")]
    debounce_ms: u64,
    enabled: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct LocksConfig {
    #[serde(rename = "timeoutMs")]
    timeout_ms: u64,
}

impl Default for LocksConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ConstraintsConfig {
    #[serde(rename = "maxConcurrentPerAgent")]
    max_concurrent_per_agent: u32,
    #[serde(rename = "softConcurrentPerAgent")]
    soft_concurrent_per_agent: u32,
    /// Optional adjacency map from a capability tag to the partial-credit
    /// multiplier granted when an agent holds an adjacent (not exact) tag.
    /// Defaults to empty, i.e. exact-match only (Open Question 1).
    capability_adjacency: std::collections::HashMap<String, std::collections::HashMap<String, f64>>,
}

impl Default for ConstraintsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_agent: 3,
            soft_concurrent_per_agent: 2,
            capability_adjacency: std::collections::HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct SyncConfig {
    #[serde(rename = "healthIntervalMs")]
    health_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            health_interval_ms: 30_000,
        }
    }
}

/// The full, closed set of configuration options recognized by the engine
/// (external interfaces, §6). Unknown keys are rejected by serde's default
/// strictness; there is no free-form key/value escape hatch, per the
/// "dynamic named parameters" design note.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    #[serde(rename = "specsRoot")]
    specs_root: PathBuf,
    #[serde(rename = "statusFolders")]
    status_folders: Vec<String>,
    #[serde(rename = "supportedTypes")]
    supported_types: Vec<String>,
    priorities: Vec<String>,
    watch: WatchConfig,
    locks: LocksConfig,
    #[serde(rename = "externalTool")]
    external_tool: ExternalToolsConfig,
    constraints: ConstraintsConfig,
    sync: SyncConfig,
    /// Directory name used for archived specs (configurable; all other
    /// statuses use [`crate::spec::SpecStatus::default_dir_name`]).
    #[serde(rename = "archivedDir")]
    archived_dir: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            specs_root: PathBuf::from("docs/specs"),
            status_folders: vec![
                "backlog".into(),
                "active".into(),
                "done".into(),
                "archived".into(),
            ],
            supported_types: vec![
                "feature".into(),
                "bug".into(),
                "research-spike".into(),
                "maintenance".into(),
                "release".into(),
            ],
            priorities: vec!["P0".into(), "P1".into(), "P2".into(), "P3".into()],
            watch: WatchConfig::default(),
            locks: LocksConfig::default(),
            external_tool: ExternalToolsConfig::default(),
            constraints: ConstraintsConfig::default(),
            sync: SyncConfig::default(),
            archived_dir: "archived".to_string(),
        }
    }
}

impl WorkflowConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// any section the file omits.
    pub fn load(path: &std::path::Path) -> WorkflowResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WorkflowError::Config(format!("failed to read config '{}': {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            WorkflowError::Config(format!("failed to parse config '{}': {e}", path.display()))
        })
    }

    /// Root directory under which status-named subdirectories live.
    pub fn specs_root(&self) -> &std::path::Path {
        &self.specs_root
    }

    /// Ordered list of expected status-directory names.
    pub fn status_folders(&self) -> &[String] {
        &self.status_folders
    }

    /// The set of spec types the engine accepts.
    pub fn supported_types(&self) -> &[String] {
        &self.supported_types
    }

    /// Ordered priority tiers, `P0` first.
    pub fn priorities(&self) -> &[String] {
        &self.priorities
    }

    /// Debounce window for filesystem change batching.
    pub fn watch_debounce_ms(&self) -> u64 {
        self.watch.debounce_ms
    }

    /// Whether the file watcher subsystem should run at all.
    pub fn watch_enabled(&self) -> bool {
        self.watch.enabled
    }

    /// Timeout for acquiring the workflow-state file lock.
    pub fn lock_timeout_ms(&self) -> u64 {
        self.locks.timeout_ms
    }

    /// The configured lint tool, if any.
    pub fn lint_tool(&self) -> Option<&ExternalTool> {
        self.external_tool.lint.as_ref()
    }

    /// The configured test tool, if any.
    pub fn test_tool(&self) -> Option<&ExternalTool> {
        self.external_tool.test.as_ref()
    }

    /// The configured VCS tool, if any.
    pub fn vcs_tool(&self) -> Option<&ExternalTool> {
        self.external_tool.vcs.as_ref()
    }

    /// Hard concurrent-task limit per agent (workload multiplier reaches 0).
    pub fn max_concurrent_per_agent(&self) -> u32 {
        self.constraints.max_concurrent_per_agent
    }

    /// Soft concurrent-task limit per agent (below this, workload
    /// multiplier is 1.0; above it, linear decay to the hard limit).
    pub fn soft_concurrent_per_agent(&self) -> u32 {
        self.constraints.soft_concurrent_per_agent
    }

    /// Partial-credit multiplier for an agent holding `held_tag` against a
    /// task requiring `required_tag`. `1.0` for an exact match, the
    /// configured adjacency value for an adjacent tag, `0.0` otherwise.
    pub fn skill_multiplier(&self, required_tag: &str, held_tags: &[String]) -> f64 {
        if held_tags.iter().any(|t| t == required_tag) {
            return 1.0;
        }
        held_tags
            .iter()
            .filter_map(|held| {
                self.constraints
                    .capability_adjacency
                    .get(required_tag)
                    .and_then(|adj| adj.get(held))
                    .copied()
            })
            .fold(0.0_f64, f64::max)
    }

    /// Interval between health-monitor liveness polls.
    pub fn health_interval_ms(&self) -> u64 {
        self.sync.health_interval_ms
    }

    /// Directory name archived specs live under.
    pub fn archived_dir(&self) -> &str {
        &self.archived_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = WorkflowConfig::default();
        assert_eq!(cfg.specs_root(), std::path::Path::new("docs/specs"));
        assert_eq!(cfg.lock_timeout_ms(), 10_000);
        assert_eq!(cfg.watch_debounce_ms(), 1000);
        assert_eq!(cfg.max_concurrent_per_agent(), 3);
        assert_eq!(cfg.soft_concurrent_per_agent(), 2);
        assert_eq!(cfg.health_interval_ms(), 30_000);
    }

    #[test]
    fn skill_multiplier_exact_match() {
        let cfg = WorkflowConfig::default();
        assert_eq!(
            cfg.skill_multiplier("cli-specialist", &["cli-specialist".to_string()]),
            1.0
        );
        assert_eq!(
            cfg.skill_multiplier("cli-specialist", &["database-engineer".to_string()]),
            0.0
        );
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let result = WorkflowConfig::load(std::path::Path::new("/nonexistent/workflow.toml"));
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), "Config");
    }

    #[test]
    fn load_partial_toml_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("workflow.toml");
        std::fs::write(&path, "specsRoot = \"custom/specs\"\n").expect("write");
        let cfg = WorkflowConfig::load(&path).expect("parse");
        assert_eq!(cfg.specs_root(), std::path::Path::new("custom/specs"));
        assert_eq!(cfg.lock_timeout_ms(), 10_000);
    }
}
