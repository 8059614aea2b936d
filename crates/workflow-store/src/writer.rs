use std::path::Path;

use workflow_core::{WorkflowError, WorkflowResult};

use crate::front_matter;

/// Atomically write `content` to `path` via a temp-file-then-rename, which
/// is atomic on the host filesystem. Never leaves `path` half-written.
pub fn atomic_write(path: &Path, content: &str) -> WorkflowResult<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Rewrite a single task's `status` field in a spec document's front-matter
/// in place, leaving everything else (including the body) untouched. Used
/// by the Workflow State Manager to reflect an assignment or completion
/// back into the spec file.
///
/// Returns `Err(IntegrityError)` if the task id is not present in the
/// front-matter's `tasks` list (body-only checklist tasks have nothing to
/// rewrite here; only front-matter-declared tasks carry a `status` field).
pub fn reflect_task_status(path: &Path, task_id: &str, new_status: &str) -> WorkflowResult<()> {
    let content = std::fs::read_to_string(path)?;
    let Some((fm, body)) = front_matter::split(&content) else {
        return Err(WorkflowError::ParseError {
            path: path.display().to_string(),
            reason: "no parseable front-matter delimiter".to_string(),
        });
    };

    let mut value: serde_yaml::Value = serde_yaml::from_str(fm).map_err(|e| WorkflowError::ParseError {
        path: path.display().to_string(),
        reason: format!("front-matter parse error: {e}"),
    })?;

    let found = set_task_status(&mut value, task_id, new_status);
    if !found {
        return Err(WorkflowError::IntegrityError(format!(
            "task '{task_id}' is not declared in front-matter of '{}'; cannot reflect status",
            path.display()
        )));
    }

    let new_fm = serde_yaml::to_string(&value).map_err(|e| WorkflowError::ParseError {
        path: path.display().to_string(),
        reason: format!("failed to re-serialize front-matter: {e}"),
    })?;

    let new_content = format!("---\n{new_fm}---\n{body}");
    atomic_write(path, &new_content)
}

fn set_task_status(value: &mut serde_yaml::Value, task_id: &str, new_status: &str) -> bool {
    let Some(mapping) = value.as_mapping_mut() else { return false };
    let Some(tasks) = mapping.get_mut("tasks").and_then(|v| v.as_sequence_mut()) else {
        return false;
    };
    for task in tasks {
        let Some(task_map) = task.as_mapping_mut() else { continue };
        let matches = task_map
            .get("id")
            .and_then(|v| v.as_str())
            .map(|id| id == task_id)
            .unwrap_or(false);
        if matches {
            task_map.insert(
                serde_yaml::Value::String("status".to_string()),
                serde_yaml::Value::String(new_status.to_string()),
            );
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflects_status_into_front_matter_task() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("feat-001-x.md");
        std::fs::write(
            &path,
            "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: x\npriority: P2\ntasks:\n  - id: TASK-001\n    title: t\n    status: ready\n---\nbody text\n",
        )
        .expect("write");

        reflect_task_status(&path, "TASK-001", "in_progress").expect("reflect");

        let rewritten = std::fs::read_to_string(&path).expect("read");
        assert!(rewritten.contains("status: in_progress"));
        assert!(rewritten.contains("body text"));
    }

    #[test]
    fn errors_when_task_not_in_front_matter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("feat-001-x.md");
        std::fs::write(
            &path,
            "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: x\npriority: P2\n---\nbody\n",
        )
        .expect("write");

        let result = reflect_task_status(&path, "TASK-999", "in_progress");
        assert!(result.is_err());
    }
}
