//! Drives the `start-next`/`complete-current` pipelines directly against a
//! temporary spec tree, covering the literal scenarios worked through
//! during design: clean assignment, no capability match, a P0 task
//! without confirmation, duplicate id rejection, completion with a
//! handoff, and reconciling an externally-edited spec.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use workflow_bus::EventBus;
use workflow_core::WorkflowConfig;
use workflow_state::StateManager;
use workflow_store::SpecStore;

use workflow_cli::audit::AuditLog;
use workflow_cli::orchestrators::{complete_current, start_next};
use workflow_cli::reflector::StoreReflector;
use workflow_cli::Services;

fn write_spec(dir: &Path, filename: &str, content: &str) {
    std::fs::write(dir.join(filename), content).expect("write spec");
}

fn config_for(specs_root: &Path) -> WorkflowConfig {
    let config_path = specs_root.parent().unwrap().join("workflow.toml");
    std::fs::write(&config_path, format!("specsRoot = \"{}\"\n", specs_root.display())).expect("write config");
    WorkflowConfig::load(&config_path).expect("load config")
}

fn services_for(specs_root: &Path) -> Services {
    let config = Arc::new(config_for(specs_root));
    let store = Arc::new(SpecStore::new(config.specs_root()));
    store.load_all().expect("load_all");

    let state_path = specs_root.parent().unwrap().join("state.json");
    let reflector = Box::new(StoreReflector::new(store.clone()));
    let state = Arc::new(StateManager::new(state_path, Duration::from_millis(1000), reflector));

    let bus = Arc::new(EventBus::new());
    let audit = Arc::new(AuditLog::new(specs_root.parent().unwrap().join("audit")));

    Services { store, state, config, bus, audit }
}

#[tokio::test]
async fn clean_assignment_assigns_the_only_ready_task() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let specs_root = tmp.path().join("specs");
    std::fs::create_dir_all(specs_root.join("backlog")).expect("mkdir");
    write_spec(
        &specs_root.join("backlog"),
        "feat-001-a.md",
        "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: x\npriority: P2\ntasks:\n  - id: TASK-001\n    title: t\n    status: ready\n    agent: cli-specialist\n---\nbody\n",
    );

    let services = services_for(&specs_root);
    let options = start_next::StartNextOptions {
        agent: "cli-specialist".to_string(),
        capabilities: Vec::new(),
        priority: None,
        tag: None,
        spec: None,
        dry_run: false,
        confirm_critical: false,
    };

    let result = start_next::run(&services, options).await.expect("start-next");
    assert_eq!(result["success"], true);
    assert_eq!(result["assigned"], true);
    assert_eq!(result["task"]["spec_id"], "FEAT-001");
    assert_eq!(result["task"]["task_id"], "TASK-001");

    let current = services.state.current_assignments().expect("current");
    assert_eq!(current.len(), 1);

    let spec_path = specs_root.join("backlog/feat-001-a.md");
    let rewritten = std::fs::read_to_string(spec_path).expect("read spec");
    assert!(rewritten.contains("status: in_progress"));
}

#[tokio::test]
async fn no_capability_match_reports_a_suggestion() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let specs_root = tmp.path().join("specs");
    std::fs::create_dir_all(specs_root.join("backlog")).expect("mkdir");
    write_spec(
        &specs_root.join("backlog"),
        "feat-001-a.md",
        "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: x\npriority: P2\ntasks:\n  - id: TASK-001\n    title: t\n    status: ready\n    agent: database-engineer\n---\nbody\n",
    );

    let services = services_for(&specs_root);
    let options = start_next::StartNextOptions {
        agent: "frontend-developer".to_string(),
        capabilities: Vec::new(),
        priority: None,
        tag: None,
        spec: None,
        dry_run: false,
        confirm_critical: false,
    };

    let result = start_next::run(&services, options).await.expect("start-next");
    assert_eq!(result["success"], true);
    assert_eq!(result["assigned"], false);
    let suggestions = result["suggestions"].as_array().expect("suggestions array");
    assert!(suggestions.iter().any(|s| s.as_str().unwrap_or("").contains("frontend-developer")));
}

#[tokio::test]
async fn p0_task_without_confirmation_is_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let specs_root = tmp.path().join("specs");
    std::fs::create_dir_all(specs_root.join("backlog")).expect("mkdir");
    write_spec(
        &specs_root.join("backlog"),
        "feat-001-a.md",
        "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: x\npriority: P0\ntasks:\n  - id: TASK-001\n    title: t\n    status: ready\n    agent: cli-specialist\n---\nbody\n",
    );

    let services = services_for(&specs_root);
    let options = start_next::StartNextOptions {
        agent: "cli-specialist".to_string(),
        capabilities: Vec::new(),
        priority: None,
        tag: None,
        spec: None,
        dry_run: false,
        confirm_critical: false,
    };

    let result = start_next::run(&services, options).await.expect("start-next");
    assert_eq!(result["success"], false);
    let violations = result["violations"].as_array().expect("violations array");
    assert!(violations.iter().any(|v| v.as_str().unwrap_or("").contains("P0")));
}

#[tokio::test]
async fn duplicate_ids_fail_integrity_validation_before_assignment() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let specs_root = tmp.path().join("specs");
    std::fs::create_dir_all(specs_root.join("backlog")).expect("mkdir");
    write_spec(
        &specs_root.join("backlog"),
        "feat-001-a.md",
        "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: x\npriority: P2\ntasks:\n  - id: TASK-001\n    title: t\n    status: ready\n---\nbody\n",
    );
    write_spec(
        &specs_root.join("backlog"),
        "feat-001-b.md",
        "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: y\npriority: P2\ntasks:\n  - id: TASK-001\n    title: t\n    status: ready\n---\nbody\n",
    );

    let services = services_for(&specs_root);
    let report = {
        let graph = services.store.graph();
        workflow_integrity::validate(&graph, &services.config)
    };
    assert!(report.has_errors());
    assert!(report
        .errors()
        .any(|f| f.check == workflow_integrity::Check::DuplicateId && f.spec_id == "FEAT-001"));
}

#[tokio::test]
async fn start_next_refuses_to_assign_out_of_a_duplicated_spec() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let specs_root = tmp.path().join("specs");
    std::fs::create_dir_all(specs_root.join("backlog")).expect("mkdir");
    write_spec(
        &specs_root.join("backlog"),
        "feat-001-a.md",
        "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: x\npriority: P2\ntasks:\n  - id: TASK-001\n    title: t\n    status: ready\n    agent: cli-specialist\n---\nbody\n",
    );
    write_spec(
        &specs_root.join("backlog"),
        "feat-001-b.md",
        "---\nid: FEAT-001\ntype: feature\nstatus: backlog\ntitle: y\npriority: P2\ntasks:\n  - id: TASK-001\n    title: t\n    status: ready\n    agent: cli-specialist\n---\nbody\n",
    );

    let services = services_for(&specs_root);
    let options = start_next::StartNextOptions {
        agent: "cli-specialist".to_string(),
        capabilities: Vec::new(),
        priority: None,
        tag: None,
        spec: None,
        dry_run: false,
        confirm_critical: false,
    };

    let err = start_next::run(&services, options).await.expect_err("duplicated spec must not be assignable");
    assert!(matches!(err, workflow_core::WorkflowError::IntegrityError(_)));

    let current = services.state.current_assignments().expect("current");
    assert!(current.is_empty());
}

#[tokio::test]
async fn completing_a_task_triggers_a_single_eligible_handoff() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let specs_root = tmp.path().join("specs");
    std::fs::create_dir_all(specs_root.join("active")).expect("mkdir");
    write_spec(
        &specs_root.join("active"),
        "feat-001-a.md",
        "---\nid: FEAT-001\ntype: feature\nstatus: active\ntitle: x\npriority: P2\ntasks:\n  - id: TASK-001\n    title: t1\n    status: in_progress\n    agent: agent-a\n  - id: TASK-002\n    title: t2\n    status: blocked\n    agent: agent-b\n    depends_on:\n      - TASK-001\n---\nbody\n",
    );

    let services = services_for(&specs_root);
    services.state.assign_task("FEAT-001", "TASK-001", "agent-a", workflow_state::AssignOptions::default()).expect("seed assignment");

    let options = complete_current::CompleteCurrentOptions {
        agent: "agent-a".to_string(),
        spec: Some("FEAT-001".to_string()),
        task: Some("TASK-001".to_string()),
        notes: None,
        skip_lint: true,
        skip_tests: true,
        skip_commit: true,
    };

    let result = complete_current::run(&services, options).await.expect("complete-current");
    assert_eq!(result["success"], true);
    assert_eq!(result["handoff"]["handoff_needed"], true);
    assert_eq!(result["handoff"]["next_task"], "TASK-002");
    assert_eq!(result["handoff"]["next_agent"], "agent-b");
}

#[tokio::test]
async fn external_completion_edit_is_reconciled_by_sync_spec_state() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let specs_root = tmp.path().join("specs");
    std::fs::create_dir_all(specs_root.join("active")).expect("mkdir");
    write_spec(
        &specs_root.join("active"),
        "feat-001-a.md",
        "---\nid: FEAT-001\ntype: feature\nstatus: active\ntitle: x\npriority: P2\ntasks:\n  - id: TASK-001\n    title: t1\n    status: in_progress\n    agent: agent-a\n---\nbody\n",
    );

    let services = services_for(&specs_root);
    services.state.assign_task("FEAT-001", "TASK-001", "agent-a", workflow_state::AssignOptions::default()).expect("seed assignment");

    // Simulate an external editor marking the task complete directly in
    // the spec file, bypassing `complete-current` entirely.
    let warning = services
        .state
        .sync_spec_state("FEAT-001", "TASK-001", workflow_core::TaskStatus::Complete)
        .expect("sync");
    assert!(warning.is_some());

    let current = services.state.current_assignments().expect("current");
    assert!(current.is_empty());
}
