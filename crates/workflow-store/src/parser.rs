use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use workflow_core::{spec_id_from_filename, Priority, Spec, SpecStatus, SpecType, Subtask, Task, TaskStatus, VariantDetails};

use crate::front_matter;

/// A spec that parsed, plus any non-fatal issues noticed along the way
/// (missing id recovered from the filename, unparseable dates, etc).
#[derive(Debug)]
pub struct ParsedSpec {
    /// The resulting spec.
    pub spec: Spec,
    /// Human-readable warnings. Never empty-but-meaningful: an empty list
    /// means the file parsed cleanly.
    pub warnings: Vec<String>,
}

/// A spec document that failed to parse entirely.
#[derive(Debug, Clone)]
pub struct ParseFailure {
    /// Path of the offending file.
    pub path: String,
    /// Human-readable reason.
    pub reason: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawTask {
    id: String,
    title: String,
    status: Option<String>,
    agent: Option<String>,
    effort: Option<String>,
    #[serde(default)]
    progress: u8,
    started: Option<String>,
    completed: Option<String>,
    estimated_completion: Option<String>,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    subtasks: Vec<Subtask>,
}

#[derive(Debug, Deserialize, Default)]
struct RawSpec {
    id: Option<String>,
    #[serde(rename = "type")]
    spec_type: Option<String>,
    status: Option<String>,
    title: Option<String>,
    priority: Option<String>,
    effort: Option<String>,
    assignee: Option<String>,
    phase: Option<String>,
    created: Option<String>,
    updated: Option<String>,
    #[serde(default)]
    tags: BTreeSet<String>,
    #[serde(default)]
    dependencies: BTreeSet<String>,
    #[serde(default)]
    blocking: BTreeSet<String>,
    #[serde(default)]
    related: BTreeSet<String>,
    #[serde(default)]
    tasks: Vec<RawTask>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    acceptance_criteria: String,
    #[serde(default)]
    technical_notes: String,
    #[serde(default, rename = "bugSeverity")]
    bug_severity: Option<String>,
    #[serde(default, rename = "reproductionSteps")]
    reproduction_steps: Option<String>,
    #[serde(default, rename = "researchQuestion")]
    research_question: Option<String>,
}

fn parse_date(raw: &Option<String>, field: &str, warnings: &mut Vec<String>) -> Option<DateTime<Utc>> {
    let raw = raw.as_ref()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    warnings.push(format!("unparseable date in '{field}': {raw:?}"));
    None
}

fn parse_task_status(raw: &Option<String>) -> TaskStatus {
    match raw.as_deref() {
        Some("in_progress") => TaskStatus::InProgress,
        Some("complete") => TaskStatus::Complete,
        Some("blocked") => TaskStatus::Blocked,
        _ => TaskStatus::Ready,
    }
}

fn convert_task(raw: RawTask, warnings: &mut Vec<String>) -> Task {
    let mut task = Task {
        id: raw.id,
        title: raw.title,
        status: parse_task_status(&raw.status),
        agent: raw.agent,
        effort: raw.effort,
        progress: raw.progress,
        started: parse_date(&raw.started, "task.started", warnings),
        completed: parse_date(&raw.completed, "task.completed", warnings),
        estimated_completion: parse_date(&raw.estimated_completion, "task.estimated_completion", warnings),
        depends_on: raw.depends_on.into_iter().collect(),
        subtasks: raw.subtasks,
    };
    task.clamp_progress();
    task
}

/// Extract checklist-style task entries from the markdown body, e.g.:
///
/// ```text
/// - [ ] TASK-001: Implement parser
/// - [x] TASK-002: Add tests
/// ```
///
/// A line must carry a `TASK-###` id to be recognized; plain checklist
/// items with no id are body prose, not tasks.
pub fn extract_body_tasks(body: &str) -> Vec<Task> {
    use std::sync::OnceLock;
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        regex::Regex::new(r"(?m)^\s*-\s*\[( |x|X)\]\s*(TASK-\d{3})\s*:?\s*(.*)$")
            .expect("static regex is valid")
    });

    re.captures_iter(body)
        .map(|caps| {
            let checked = caps[1].eq_ignore_ascii_case("x");
            let id = caps[2].to_string();
            let title = caps[3].trim().to_string();
            Task {
                id,
                title,
                status: if checked { TaskStatus::Complete } else { TaskStatus::Ready },
                agent: None,
                effort: None,
                progress: if checked { 100 } else { 0 },
                started: None,
                completed: None,
                estimated_completion: None,
                depends_on: BTreeSet::new(),
                subtasks: Vec::new(),
            }
        })
        .collect()
}

/// Merge body-derived tasks with front-matter tasks. Front-matter entries
/// win on id conflict; body-only ids are appended, preserving the order
/// they appeared in the body.
fn merge_tasks(front_matter_tasks: Vec<Task>, body_tasks: Vec<Task>) -> Vec<Task> {
    let mut merged = front_matter_tasks;
    let known: BTreeSet<String> = merged.iter().map(|t| t.id.clone()).collect();
    for body_task in body_tasks {
        if !known.contains(&body_task.id) {
            merged.push(body_task);
        }
    }
    merged
}

fn parse_spec_type(raw: &str) -> Option<SpecType> {
    match raw {
        "feature" => Some(SpecType::Feature),
        "bug" => Some(SpecType::Bug),
        "research-spike" => Some(SpecType::ResearchSpike),
        "maintenance" => Some(SpecType::Maintenance),
        "release" => Some(SpecType::Release),
        _ => None,
    }
}

fn parse_status(raw: &str) -> Option<SpecStatus> {
    match raw {
        "draft" => Some(SpecStatus::Draft),
        "backlog" => Some(SpecStatus::Backlog),
        "active" => Some(SpecStatus::Active),
        "done" => Some(SpecStatus::Done),
        "blocked" => Some(SpecStatus::Blocked),
        "archived" => Some(SpecStatus::Archived),
        _ => None,
    }
}

fn parse_priority(raw: &str) -> Option<Priority> {
    match raw {
        "P0" => Some(Priority::P0),
        "P1" => Some(Priority::P1),
        "P2" => Some(Priority::P2),
        "P3" => Some(Priority::P3),
        _ => None,
    }
}

/// Parse a full spec document (front-matter + body) read from `path`.
///
/// Returns `Ok(ParsedSpec)` for anything that produces a usable `Spec`
/// (missing `id` is recovered from the filename with a warning; missing or
/// malformed `type`/`status`/`priority`/`title` are parse failures, since
/// there is no safe default for them and the Integrity Validator expects to
/// operate on a graph of well-typed specs).
pub fn parse_spec(content: &str, path: &str) -> Result<ParsedSpec, ParseFailure> {
    let Some((fm, body)) = front_matter::split(content) else {
        return Err(ParseFailure {
            path: path.to_string(),
            reason: "no parseable front-matter delimiter".to_string(),
        });
    };

    let raw: RawSpec = serde_yaml::from_str(fm).map_err(|e| ParseFailure {
        path: path.to_string(),
        reason: format!("front-matter parse error: {e}"),
    })?;

    let mut warnings = Vec::new();

    let filename = path.rsplit('/').next().unwrap_or(path);
    let id = match raw.id {
        Some(id) if !id.is_empty() => id,
        _ => match spec_id_from_filename(filename) {
            Some(id) => {
                warnings.push(format!("id missing from front-matter; derived '{id}' from filename"));
                id
            }
            None => {
                return Err(ParseFailure {
                    path: path.to_string(),
                    reason: "no id in front-matter and none derivable from filename".to_string(),
                });
            }
        },
    };

    let spec_type = raw
        .spec_type
        .as_deref()
        .and_then(parse_spec_type)
        .ok_or_else(|| ParseFailure {
            path: path.to_string(),
            reason: format!("missing or unrecognized 'type' ({:?})", raw.spec_type),
        })?;

    let status = raw
        .status
        .as_deref()
        .and_then(parse_status)
        .ok_or_else(|| ParseFailure {
            path: path.to_string(),
            reason: format!("missing or unrecognized 'status' ({:?})", raw.status),
        })?;

    let priority = raw
        .priority
        .as_deref()
        .and_then(parse_priority)
        .ok_or_else(|| ParseFailure {
            path: path.to_string(),
            reason: format!("missing or unrecognized 'priority' ({:?})", raw.priority),
        })?;

    let title = raw.title.filter(|t| !t.is_empty()).ok_or_else(|| ParseFailure {
        path: path.to_string(),
        reason: "missing 'title'".to_string(),
    })?;

    let front_matter_tasks: Vec<Task> = raw
        .tasks
        .into_iter()
        .map(|t| convert_task(t, &mut warnings))
        .collect();
    let body_tasks = extract_body_tasks(body);
    let tasks = merge_tasks(front_matter_tasks, body_tasks);

    let spec = Spec {
        id,
        spec_type,
        status,
        title,
        priority,
        effort: raw.effort,
        assignee: raw.assignee,
        phase: raw.phase,
        created: parse_date(&raw.created, "created", &mut warnings),
        updated: parse_date(&raw.updated, "updated", &mut warnings),
        tags: raw.tags,
        dependencies: raw.dependencies,
        blocking: raw.blocking,
        related: raw.related,
        tasks,
        description: if raw.description.is_empty() { body.trim().to_string() } else { raw.description },
        acceptance_criteria: raw.acceptance_criteria,
        technical_notes: raw.technical_notes,
        variant: VariantDetails {
            bug_severity: raw.bug_severity,
            reproduction_steps: raw.reproduction_steps,
            research_question: raw.research_question,
        },
        file_path: Some(path.to_string()),
    };

    Ok(ParsedSpec { spec, warnings })
}
