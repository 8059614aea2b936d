use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Task;

/// Variant of a specification. Carried as a tag plus a per-variant payload
/// rather than modeled through inheritance, so the Integrity Validator and
/// Task Router can treat every variant uniformly via the shared base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpecType {
    /// A new capability or behavior.
    Feature,
    /// A defect to be corrected.
    Bug,
    /// An open-ended investigation with no fixed deliverable shape.
    ResearchSpike,
    /// Upkeep work (dependency bumps, cleanup, infra).
    Maintenance,
    /// A release-coordination spec.
    Release,
}

impl SpecType {
    /// All recognized spec types, in the order used for tie-breaks.
    pub fn all() -> [SpecType; 5] {
        [
            SpecType::Feature,
            SpecType::Bug,
            SpecType::ResearchSpike,
            SpecType::Maintenance,
            SpecType::Release,
        ]
    }

    /// The `TYPE` prefix expected in `id` and filenames, e.g. `"FEAT"` for
    /// `Feature`, `"BUG"` for `Bug`.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            SpecType::Feature => "FEAT",
            SpecType::Bug => "BUG",
            SpecType::ResearchSpike => "SPIKE",
            SpecType::Maintenance => "MAINT",
            SpecType::Release => "REL",
        }
    }
}

/// Lifecycle status of a spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecStatus {
    /// Not yet ready to be worked; still being authored.
    Draft,
    /// Ready to be picked up.
    Backlog,
    /// Currently being worked.
    Active,
    /// Finished.
    Done,
    /// Work is paused on an unmet dependency or decision.
    Blocked,
    /// Retired; kept for history.
    Archived,
}

impl SpecStatus {
    /// The conventional status-directory name this status lives under
    /// (`archived`'s directory is separately configurable; see
    /// [`crate::config::WorkflowConfig::archived_dir`]).
    pub fn default_dir_name(&self) -> &'static str {
        match self {
            SpecStatus::Draft => "draft",
            SpecStatus::Backlog => "backlog",
            SpecStatus::Active => "active",
            SpecStatus::Done => "done",
            SpecStatus::Blocked => "blocked",
            SpecStatus::Archived => "archived",
        }
    }
}

/// Priority tier, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    /// Critical; requires explicit confirmation to assign.
    P0,
    /// High.
    P1,
    /// Normal.
    P2,
    /// Low.
    P3,
}

impl Priority {
    /// The constraint-engine weight used when scoring candidate tasks.
    pub fn weight(&self) -> f64 {
        match self {
            Priority::P0 => 1.0,
            Priority::P1 => 0.7,
            Priority::P2 => 0.4,
            Priority::P3 => 0.2,
        }
    }
}

/// Variant-specific fields, present only for the spec types that define
/// them. `None` values are valid for variants that set no extension fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariantDetails {
    /// Bug severity, e.g. `"critical"`, `"major"`, `"minor"`. Bug variant only.
    #[serde(default, rename = "bugSeverity", skip_serializing_if = "Option::is_none")]
    pub bug_severity: Option<String>,
    /// Steps to reproduce a bug. Bug variant only.
    #[serde(default, rename = "reproductionSteps", skip_serializing_if = "Option::is_none")]
    pub reproduction_steps: Option<String>,
    /// The question a research spike is meant to answer. ResearchSpike only.
    #[serde(default, rename = "researchQuestion", skip_serializing_if = "Option::is_none")]
    pub research_question: Option<String>,
}

/// A uniquely identified unit of planned work, parsed from a single spec
/// document's front-matter and body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spec {
    /// Unique identifier, `TYPE-###` (e.g. `FEAT-001`).
    pub id: String,
    /// Which kind of spec this is.
    #[serde(rename = "type")]
    pub spec_type: SpecType,
    /// Current lifecycle status.
    pub status: SpecStatus,
    /// Human-readable title.
    pub title: String,
    /// Priority tier.
    pub priority: Priority,
    /// Free-text effort estimate (e.g. `"3d"`, `"1w"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<String>,
    /// Agent currently assigned at the spec level, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Free-text phase label (e.g. `"design"`, `"rollout"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Creation timestamp; `None` if absent or unparseable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Last-update timestamp; `None` if absent or unparseable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    /// Free-form tags. Insertion order is not meaningful.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Spec ids this spec depends on (must complete first).
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    /// Spec ids this spec blocks.
    #[serde(default)]
    pub blocking: BTreeSet<String>,
    /// Spec ids related to this one (undirected).
    #[serde(default)]
    pub related: BTreeSet<String>,
    /// Ordered child tasks.
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Free-text description body.
    #[serde(default)]
    pub description: String,
    /// Free-text acceptance criteria.
    #[serde(default)]
    pub acceptance_criteria: String,
    /// Free-text technical notes.
    #[serde(default)]
    pub technical_notes: String,
    /// Variant-specific extension fields.
    #[serde(default, flatten)]
    pub variant: VariantDetails,
    /// Absolute or root-relative path this spec was loaded from. Not part
    /// of the front-matter; populated by the Spec Store on load.
    #[serde(skip)]
    pub file_path: Option<String>,
}

impl Spec {
    /// The lowercase `id`, used to check filename-id agreement (check 5 of
    /// the Integrity Validator: the filename must begin with this).
    pub fn id_lower(&self) -> String {
        self.id.to_lowercase()
    }

    /// Find a task by its id within this spec.
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// Mutable lookup of a task by id within this spec.
    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }
}

/// Validate that a string matches the spec id format `TYPE-###`.
pub fn is_valid_spec_id(id: &str) -> bool {
    spec_id_regex().is_match(id)
}

fn spec_id_regex() -> &'static regex::Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^[A-Z]+-\d{3}$").expect("static regex is valid"))
}

/// Extract a spec id from a filename prefix, e.g. `feat-001-add-login.md` ->
/// `FEAT-001`. Returns `None` if no `TYPE-###` prefix is present.
pub fn spec_id_from_filename(filename: &str) -> Option<String> {
    use std::sync::OnceLock;
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        regex::Regex::new(r"^([A-Za-z]+-\d{3})").expect("static regex is valid")
    });
    re.captures(filename)
        .map(|c| c[1].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_spec_ids() {
        assert!(is_valid_spec_id("FEAT-001"));
        assert!(is_valid_spec_id("BUG-042"));
        assert!(!is_valid_spec_id("feat-001"));
        assert!(!is_valid_spec_id("FEAT-1"));
        assert!(!is_valid_spec_id("FEAT001"));
    }

    #[test]
    fn id_from_filename_prefix() {
        assert_eq!(
            spec_id_from_filename("feat-001-add-login.md"),
            Some("FEAT-001".to_string())
        );
        assert_eq!(spec_id_from_filename("notes.md"), None);
    }

    #[test]
    fn priority_weights_descend() {
        assert!(Priority::P0.weight() > Priority::P1.weight());
        assert!(Priority::P1.weight() > Priority::P2.weight());
        assert!(Priority::P2.weight() > Priority::P3.weight());
    }
}
