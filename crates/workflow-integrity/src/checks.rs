use std::collections::{HashMap, HashSet};

use workflow_core::{is_valid_spec_id, SpecStatus, TaskStatus, WorkflowConfig};
use workflow_store::SpecGraph;

use crate::report::{Check, Finding, IntegrityReport, Severity};

fn finding(
    check: Check,
    severity: Severity,
    spec_id: &str,
    task_id: Option<&str>,
    message: String,
    recommendation: Option<String>,
) -> Finding {
    Finding {
        check,
        severity,
        spec_id: spec_id.to_string(),
        task_id: task_id.map(str::to_string),
        message,
        recommendation,
    }
}

/// Run every structural check over `graph` and return the resulting
/// report. Never mutates `graph` or anything on disk.
pub fn validate(graph: &SpecGraph, config: &WorkflowConfig) -> IntegrityReport {
    let mut findings = Vec::new();

    check_duplicate_ids(graph, &mut findings);
    for spec in graph.all() {
        check_format(spec, &mut findings);
        check_required_fields(spec, &mut findings);
        check_file_location_agreement(spec, config, &mut findings);
        check_filename_id_match(spec, &mut findings);
        check_reference_validity(spec, graph, &mut findings);
        check_task_dependency_scope(spec, &mut findings);
        check_task_dependency_regression(spec, graph, &mut findings);
    }
    check_acyclic_dependencies(graph, &mut findings);

    IntegrityReport::new(findings, graph.len(), graph.errors.len())
}

fn check_duplicate_ids(graph: &SpecGraph, findings: &mut Vec<Finding>) {
    // The graph records every id collision it saw at load time, before the
    // colliding specs were folded down to one entry per id (see
    // `SpecGraph::build`), so this does not depend on `graph.all()` still
    // holding both copies.
    for (id, paths) in graph.duplicate_ids() {
        findings.push(finding(
            Check::DuplicateId,
            Severity::Error,
            id,
            None,
            format!("id '{id}' claimed by {} files: '{}'", paths.len(), paths.join("', '")),
            Some("rename one of the files to a unique id".to_string()),
        ));
    }
}

fn check_format(spec: &workflow_core::Spec, findings: &mut Vec<Finding>) {
    if !is_valid_spec_id(&spec.id) {
        findings.push(finding(
            Check::Format,
            Severity::Error,
            &spec.id,
            None,
            format!("id '{}' does not match TYPE-### format", spec.id),
            Some(format!(
                "rename to '{}-{}'",
                spec.spec_type.id_prefix(),
                spec.id.chars().filter(char::is_ascii_digit).collect::<String>()
            )),
        ));
    }
}

fn check_required_fields(spec: &workflow_core::Spec, findings: &mut Vec<Finding>) {
    if spec.title.trim().is_empty() {
        findings.push(finding(
            Check::RequiredFields,
            Severity::Error,
            &spec.id,
            None,
            "missing required field 'title'".to_string(),
            None,
        ));
    }
}

fn check_file_location_agreement(
    spec: &workflow_core::Spec,
    config: &WorkflowConfig,
    findings: &mut Vec<Finding>,
) {
    let Some(path) = spec.file_path.as_deref() else { return };
    let Some(parent_dir) = std::path::Path::new(path)
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
    else {
        return;
    };

    let expected = if spec.status == SpecStatus::Archived {
        config.archived_dir()
    } else {
        spec.status.default_dir_name()
    };

    if parent_dir != expected {
        findings.push(finding(
            Check::FileLocationAgreement,
            Severity::Error,
            &spec.id,
            None,
            format!("spec has status '{expected}' but lives under directory '{parent_dir}'"),
            Some(format!("move the file into the '{expected}' directory")),
        ));
    }
}

fn check_filename_id_match(spec: &workflow_core::Spec, findings: &mut Vec<Finding>) {
    let Some(path) = spec.file_path.as_deref() else { return };
    let Some(filename) = std::path::Path::new(path).file_name().and_then(|n| n.to_str()) else {
        return;
    };
    if !filename.starts_with(&spec.id_lower()) {
        findings.push(finding(
            Check::FilenameIdMatch,
            Severity::Error,
            &spec.id,
            None,
            format!("filename '{filename}' does not begin with id '{}'", spec.id_lower()),
            Some(format!("rename the file to start with '{}'", spec.id_lower())),
        ));
    }
}

fn check_reference_validity(
    spec: &workflow_core::Spec,
    graph: &SpecGraph,
    findings: &mut Vec<Finding>,
) {
    let mut check_ids = |ids: &std::collections::BTreeSet<String>, relation: &str| {
        for id in ids {
            if graph.get(id).is_none() {
                findings.push(finding(
                    Check::ReferenceValidity,
                    Severity::Error,
                    &spec.id,
                    None,
                    format!("{relation} references unknown spec '{id}'"),
                    None,
                ));
            }
        }
    };
    check_ids(&spec.dependencies, "dependencies");
    check_ids(&spec.blocking, "blocking");
    check_ids(&spec.related, "related");

    for task in &spec.tasks {
        for dep in &task.depends_on {
            if workflow_core::Task::is_cross_spec_dependency(dep) {
                if graph.resolve_task(&spec.id, dep).is_none() {
                    findings.push(finding(
                        Check::ReferenceValidity,
                        Severity::Error,
                        &spec.id,
                        Some(&task.id),
                        format!("depends_on references unknown cross-spec task '{dep}'"),
                        None,
                    ));
                }
            }
        }
    }
}

fn check_task_dependency_scope(spec: &workflow_core::Spec, findings: &mut Vec<Finding>) {
    for task in &spec.tasks {
        for dep in &task.depends_on {
            if !workflow_core::Task::is_cross_spec_dependency(dep) && spec.task(dep).is_none() {
                findings.push(finding(
                    Check::TaskDependencyScope,
                    Severity::Error,
                    &spec.id,
                    Some(&task.id),
                    format!("depends_on '{dep}' does not resolve to a task in this spec"),
                    Some("use the 'SPEC-ID/TASK-ID' form for cross-spec dependencies".to_string()),
                ));
            }
        }
    }
}

fn check_task_dependency_regression(
    spec: &workflow_core::Spec,
    graph: &SpecGraph,
    findings: &mut Vec<Finding>,
) {
    for task in &spec.tasks {
        if task.status != TaskStatus::InProgress && task.status != TaskStatus::Complete {
            continue;
        }
        for dep in &task.depends_on {
            let Some((_, dep_task)) = graph.resolve_task(&spec.id, dep) else { continue };
            if dep_task.status != TaskStatus::Complete {
                findings.push(finding(
                    Check::TaskDependencyRegression,
                    Severity::Error,
                    &spec.id,
                    Some(&task.id),
                    format!(
                        "task is {:?} but its dependency '{}' is {:?}, not complete; the dependency appears to have regressed",
                        task.status, dep, dep_task.status
                    ),
                    Some("re-validate whether the dependency was reopened intentionally".to_string()),
                ));
            }
        }
    }
}

fn check_acyclic_dependencies(graph: &SpecGraph, findings: &mut Vec<Finding>) {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();

    fn visit<'a>(
        id: &'a str,
        graph: &'a SpecGraph,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
        findings: &mut Vec<Finding>,
        reported: &mut HashSet<Vec<&'a str>>,
    ) {
        if let Some(Mark::Done) = marks.get(id) {
            return;
        }
        if stack.contains(&id) {
            let cycle_start = stack.iter().position(|s| *s == id).unwrap_or(0);
            let mut cycle: Vec<&str> = stack[cycle_start..].to_vec();
            cycle.push(id);
            let mut sorted_key = cycle.clone();
            sorted_key.sort_unstable();
            if reported.insert(sorted_key) {
                findings.push(finding(
                    Check::AcyclicDependencies,
                    Severity::Error,
                    id,
                    None,
                    format!("dependency cycle detected: {}", cycle.join(" -> ")),
                    Some("break the cycle by removing one dependency edge".to_string()),
                ));
            }
            return;
        }
        let Some(spec) = graph.get(id) else { return };
        marks.insert(id, Mark::Visiting);
        stack.push(id);
        for dep in &spec.dependencies {
            visit(dep, graph, marks, stack, findings, reported);
        }
        stack.pop();
        marks.insert(id, Mark::Done);
    }

    let mut reported = HashSet::new();
    for spec in graph.all() {
        visit(&spec.id, graph, &mut marks, &mut stack, findings, &mut reported);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_store::parse_spec;

    fn spec_with_path(doc: &str, path: &str) -> workflow_core::Spec {
        parse_spec(doc, path).expect("parses").spec
    }

    #[test]
    fn flags_invalid_id_format() {
        let spec = spec_with_path(
            "---\nid: feat-1\ntype: feature\nstatus: backlog\ntitle: x\npriority: P2\n---\nbody\n",
            "docs/specs/backlog/feat-1.md",
        );
        let graph = SpecGraph::build(vec![spec], Vec::new(), Vec::new());
        let report = validate(&graph, &WorkflowConfig::default());
        assert!(report.findings.iter().any(|f| f.check == Check::Format));
    }

    #[test]
    fn flags_duplicate_ids() {
        let a = spec_with_path(
            "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: x\npriority: P2\n---\nbody\n",
            "docs/specs/backlog/feat-001-a.md",
        );
        let b = spec_with_path(
            "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: y\npriority: P2\n---\nbody\n",
            "docs/specs/backlog/feat-001-b.md",
        );
        let graph = SpecGraph::build(vec![a, b], Vec::new(), Vec::new());
        let report = validate(&graph, &WorkflowConfig::default());
        assert!(report.has_errors());
        assert!(report
            .errors()
            .any(|f| f.check == Check::DuplicateId && f.spec_id == "FEAT-001"));
    }

    #[test]
    fn flags_file_location_mismatch() {
        let spec = spec_with_path(
            "---\nid: FEAT-001\ntype: feature\nstatus: active\ntitle: x\npriority: P2\n---\nbody\n",
            "docs/specs/backlog/feat-001-x.md",
        );
        let graph = SpecGraph::build(vec![spec], Vec::new(), Vec::new());
        let report = validate(&graph, &WorkflowConfig::default());
        assert!(report.findings.iter().any(|f| f.check == Check::FileLocationAgreement));
    }

    #[test]
    fn flags_unknown_dependency_reference() {
        let spec = spec_with_path(
            "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: x\npriority: P2\ndependencies: [FEAT-999]\n---\nbody\n",
            "docs/specs/backlog/feat-001-x.md",
        );
        let graph = SpecGraph::build(vec![spec], Vec::new(), Vec::new());
        let report = validate(&graph, &WorkflowConfig::default());
        assert!(report.findings.iter().any(|f| f.check == Check::ReferenceValidity));
    }

    #[test]
    fn detects_dependency_cycle() {
        let a = spec_with_path(
            "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: a\npriority: P2\ndependencies: [FEAT-002]\n---\nbody\n",
            "docs/specs/backlog/feat-001-a.md",
        );
        let b = spec_with_path(
            "---\nid: FEAT-002\ntype: feature\nstatus: backlog\ntitle: b\npriority: P2\ndependencies: [FEAT-001]\n---\nbody\n",
            "docs/specs/backlog/feat-002-b.md",
        );
        let graph = SpecGraph::build(vec![a, b], Vec::new(), Vec::new());
        let report = validate(&graph, &WorkflowConfig::default());
        assert!(report.findings.iter().any(|f| f.check == Check::AcyclicDependencies));
        assert!(report.has_errors());
    }

    #[test]
    fn flags_task_dependency_regression() {
        let doc = r#"---
id: FEAT-001
type: feature
status: active
title: x
priority: P2
tasks:
  - id: TASK-001
    title: depends on two
    status: ready
    depends_on: [TASK-002]
  - id: TASK-002
    title: dependency
    status: ready
---
body
"#;
        let mut spec = spec_with_path(doc, "docs/specs/active/feat-001-x.md");
        spec.task_mut("TASK-001").expect("task").status = TaskStatus::InProgress;
        let graph = SpecGraph::build(vec![spec], Vec::new(), Vec::new());
        let report = validate(&graph, &WorkflowConfig::default());
        assert!(report.findings.iter().any(|f| f.check == Check::TaskDependencyRegression));
    }
}
