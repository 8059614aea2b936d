use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use workflow_bus::EventBus;
use workflow_core::{Priority, WorkflowConfig, WorkflowError};
use workflow_state::StateManager;
use workflow_store::SpecStore;
use workflow_sync::{HealthMonitor, SyncEngine};

use workflow_cli::audit::AuditLog;
use workflow_cli::exit as exit_codes;
use workflow_cli::orchestrators::{complete_current, start_next};
use workflow_cli::reflector::StoreReflector;
use workflow_cli::Services;

#[derive(Parser)]
#[command(name = "workflow", about = "Local multi-agent workflow automation engine")]
struct Cli {
    /// Path to the workflow config file.
    #[arg(short, long, default_value = "workflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend and assign the next task for an agent.
    StartNext {
        /// Agent identifier; also the exact-match capability tag.
        #[arg(long)]
        agent: String,
        /// Extra capability tags this agent holds beyond its own name.
        #[arg(long = "capability")]
        capabilities: Vec<String>,
        /// Restrict to a priority tier, e.g. `P0`.
        #[arg(long)]
        priority: Option<String>,
        /// Restrict to specs carrying this tag.
        #[arg(long)]
        tag: Option<String>,
        /// Restrict to a single spec id.
        #[arg(long)]
        spec: Option<String>,
        /// Compute the recommendation but do not assign it.
        #[arg(long)]
        dry_run: bool,
        /// Required to assign a P0 task.
        #[arg(long)]
        confirm_critical: bool,
    },
    /// Complete the calling agent's in-progress task and hand off.
    CompleteCurrent {
        /// Agent identifier.
        #[arg(long)]
        agent: String,
        #[arg(long)]
        spec: Option<String>,
        #[arg(long)]
        task: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        skip_lint: bool,
        #[arg(long)]
        skip_tests: bool,
        #[arg(long)]
        skip_commit: bool,
    },
    /// Run the fixed integrity checks and print a report.
    Validate,
    /// Watch the spec tree and reconcile workflow state on change.
    Watch,
    /// Print current assignment and health status.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let cli = Cli::parse();

    let config = match WorkflowConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(exit_codes::code_for(&e));
        }
    };
    let config = Arc::new(config);

    let store = Arc::new(SpecStore::new(config.specs_root()));
    if let Err(e) = store.load_all() {
        eprintln!("{e}");
        std::process::exit(exit_codes::code_for(&e));
    }

    let state_path = config.specs_root().join("..").join(".workflow-state.json");
    let reflector = Box::new(StoreReflector::new(store.clone()));
    let state = Arc::new(StateManager::new(state_path.clone(), Duration::from_millis(config.lock_timeout_ms()), reflector));

    let bus = Arc::new(EventBus::new());
    let audit_dir = state_path.parent().unwrap_or(std::path::Path::new(".")).join(".workflow-audit");
    let audit = Arc::new(AuditLog::new(audit_dir));

    let services = Services { store, state, config: config.clone(), bus, audit };

    let result: Result<(), WorkflowError> = match cli.command {
        Commands::StartNext { agent, capabilities, priority, tag, spec, dry_run, confirm_critical } => {
            let priority = match priority.as_deref().map(parse_priority) {
                Some(Ok(p)) => Some(p),
                Some(Err(e)) => {
                    eprintln!("{e}");
                    std::process::exit(exit_codes::VALIDATION_ERROR);
                }
                None => None,
            };
            let options = start_next::StartNextOptions { agent, capabilities, priority, tag, spec, dry_run, confirm_critical };
            match start_next::run(&services, options).await {
                Ok(value) => {
                    print_json(&value);
                    let success = value["success"].as_bool().unwrap_or(false);
                    std::process::exit(if success { exit_codes::SUCCESS } else { exit_codes::VALIDATION_ERROR });
                }
                Err(e) => Err(e),
            }
        }
        Commands::CompleteCurrent { agent, spec, task, notes, skip_lint, skip_tests, skip_commit } => {
            let options = complete_current::CompleteCurrentOptions { agent, spec, task, notes, skip_lint, skip_tests, skip_commit };
            match complete_current::run(&services, options).await {
                Ok(value) => {
                    print_json(&value);
                    std::process::exit(exit_codes::SUCCESS);
                }
                Err(e) => Err(e),
            }
        }
        Commands::Validate => {
            let report = {
                let graph = services.store.graph();
                workflow_integrity::validate(&graph, &services.config)
            };
            print_json(&serde_json::to_value(&report)?);
            std::process::exit(if report.has_errors() { exit_codes::INTEGRITY_ERROR } else { exit_codes::SUCCESS });
        }
        Commands::Watch => {
            info!(specs = services.store.graph().len(), "starting watch mode");
            let watcher = workflow_watch::SpecWatcher::start(
                services.config.specs_root(),
                state_path.clone(),
                &services.config,
                services.bus.clone(),
            )?;

            let sync_engine = Arc::new(SyncEngine::new(
                services.store.clone(),
                services.state.clone(),
                services.bus.clone(),
                (*services.config).clone(),
                state_path.parent().unwrap_or(std::path::Path::new(".")).join("conflicts"),
            ));
            let _sync_subscription = sync_engine.start();

            let health = Arc::new(HealthMonitor::new());
            let _health_task = workflow_sync::spawn_periodic(health, services.bus.clone(), Duration::from_millis(services.config.health_interval_ms()));

            info!("watching for spec changes; press ctrl-c to stop");
            tokio::signal::ctrl_c().await.ok();
            drop(watcher);
            std::process::exit(exit_codes::SUCCESS);
        }
        Commands::Status => {
            let assignments = services.state.current_assignments()?;
            print_json(&serde_json::json!({"current_assignments": assignments}));
            std::process::exit(exit_codes::SUCCESS);
        }
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(exit_codes::code_for(&e));
    }
    Ok(())
}

fn parse_priority(raw: &str) -> Result<Priority, String> {
    match raw.to_uppercase().as_str() {
        "P0" => Ok(Priority::P0),
        "P1" => Ok(Priority::P1),
        "P2" => Ok(Priority::P2),
        "P3" => Ok(Priority::P3),
        other => Err(format!("unrecognized priority '{other}'; expected one of P0, P1, P2, P3")),
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("failed to serialize result: {e}"),
    }
}
