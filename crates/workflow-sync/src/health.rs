//! Component liveness tracking and aggregation, published as
//! `health_check_complete` on a periodic interval.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// The sub-components the health monitor tracks liveness for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    SpecStore,
    Watcher,
    SyncEngine,
    StateManager,
    EventBus,
}

impl Component {
    /// All tracked components, in reporting order.
    pub fn all() -> [Component; 5] {
        [
            Component::SpecStore,
            Component::Watcher,
            Component::SyncEngine,
            Component::StateManager,
            Component::EventBus,
        ]
    }
}

/// Liveness of a single component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Healthy,
    Degraded,
    Failed,
    Stopped,
}

/// The aggregate liveness across all components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overall {
    Healthy,
    Degraded,
    Failed,
    Stopped,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ComponentState {
    liveness: Liveness,
    last_report: DateTime<Utc>,
    detail: Option<String>,
}

/// Tracks state reported by each sub-component and aggregates it into an
/// `overall` verdict on demand.
pub struct HealthMonitor {
    states: Arc<RwLock<HashMap<Component, ComponentState>>>,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
}

impl HealthMonitor {
    /// Create a monitor with every component initialized `healthy`.
    pub fn new() -> Self {
        let mut states = HashMap::new();
        for component in Component::all() {
            states.insert(
                component,
                ComponentState {
                    liveness: Liveness::Healthy,
                    last_report: Utc::now(),
                    detail: None,
                },
            );
        }
        Self {
            states: Arc::new(RwLock::new(states)),
            shutdown: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Report a component's current liveness.
    pub async fn report(&self, component: Component, liveness: Liveness, detail: Option<String>) {
        let mut states = self.states.write().await;
        states.insert(
            component,
            ComponentState {
                liveness,
                last_report: Utc::now(),
                detail,
            },
        );
    }

    /// Mark the monitor as shutting down; subsequent snapshots report
    /// `overall = shutdown` regardless of component state.
    pub fn begin_shutdown(&self) {
        self.shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Aggregate component liveness into a single `overall` verdict:
    /// `shutdown` if shutdown was requested, else `failed` if any
    /// component failed, `stopped` if any stopped, `degraded` if any
    /// degraded, else `healthy`.
    pub async fn snapshot(&self) -> serde_json::Value {
        let states = self.states.read().await;
        let overall = if self.shutdown.load(std::sync::atomic::Ordering::SeqCst) {
            Overall::Shutdown
        } else if states.values().any(|s| s.liveness == Liveness::Failed) {
            Overall::Failed
        } else if states.values().any(|s| s.liveness == Liveness::Stopped) {
            Overall::Stopped
        } else if states.values().any(|s| s.liveness == Liveness::Degraded) {
            Overall::Degraded
        } else {
            Overall::Healthy
        };

        serde_json::json!({
            "overall": overall,
            "components": states.iter().map(|(component, state)| {
                serde_json::json!({
                    "component": component,
                    "liveness": state.liveness,
                    "lastReport": state.last_report,
                    "detail": state.detail,
                })
            }).collect::<Vec<_>>(),
        })
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the periodic health-check task: every `interval` it snapshots
/// `monitor` and publishes the result on `health_check_complete`. Returns a
/// handle the caller can abort on shutdown.
pub fn spawn_periodic(
    monitor: Arc<HealthMonitor>,
    bus: Arc<workflow_bus::EventBus>,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let snapshot = monitor.snapshot().await;
            bus.publish(workflow_bus::topics::HEALTH_CHECK_COMPLETE, snapshot);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn all_healthy_by_default() {
        let monitor = HealthMonitor::new();
        let snapshot = monitor.snapshot().await;
        assert_eq!(snapshot["overall"], "healthy");
    }

    #[tokio::test]
    async fn one_failed_component_makes_overall_failed() {
        let monitor = HealthMonitor::new();
        monitor
            .report(Component::Watcher, Liveness::Failed, Some("lost fs handle".into()))
            .await;
        let snapshot = monitor.snapshot().await;
        assert_eq!(snapshot["overall"], "failed");
    }

    #[tokio::test]
    async fn shutdown_overrides_component_state() {
        let monitor = HealthMonitor::new();
        monitor.begin_shutdown();
        let snapshot = monitor.snapshot().await;
        assert_eq!(snapshot["overall"], "shutdown");
    }
}
