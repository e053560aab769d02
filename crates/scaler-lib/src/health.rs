//! Health check infrastructure for the priority scaler
//!
//! Tracks the control plane, the recommendation service and the control
//! loop, and reports status for Kubernetes liveness and readiness probes.
//! The control loop is reported unhealthy when no cycle has finished within
//! the stall threshold, so a wedged loop gets the pod restarted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Default time without a finished cycle before the loop counts as stalled
pub const DEFAULT_STALL_THRESHOLD: Duration = Duration::from_secs(120);

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Failing intermittently; the scaler still runs cycles
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
    /// Unix timestamp of the last finished control cycle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle_timestamp: Option<i64>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|h| h.status)
            .fold(ComponentStatus::Healthy, |worst, status| match (worst, status) {
                (ComponentStatus::Unhealthy, _) | (_, ComponentStatus::Unhealthy) => {
                    ComponentStatus::Unhealthy
                }
                (ComponentStatus::Degraded, _) | (_, ComponentStatus::Degraded) => {
                    ComponentStatus::Degraded
                }
                _ => ComponentStatus::Healthy,
            })
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const CONTROL_PLANE: &str = "control_plane";
    pub const RECOMMENDER: &str = "recommender";
    pub const CONTROL_LOOP: &str = "control_loop";
}

#[derive(Debug, Default)]
struct RegistryState {
    components: HashMap<String, ComponentHealth>,
    ready: bool,
    last_cycle_timestamp: Option<i64>,
}

/// Health registry shared between the control loop and the HTTP server
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
    stall_threshold: Duration,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
            stall_threshold: DEFAULT_STALL_THRESHOLD,
        }
    }

    /// Set the control-loop stall threshold
    pub fn with_stall_threshold(mut self, threshold: Duration) -> Self {
        self.stall_threshold = threshold;
        self
    }

    pub fn stall_threshold(&self) -> Duration {
        self.stall_threshold
    }

    /// Unix timestamp of the last finished cycle
    pub async fn last_cycle_timestamp(&self) -> Option<i64> {
        self.state.read().await.last_cycle_timestamp
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    /// Update component health status
    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut state = self.state.write().await;
        state.components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Set readiness status
    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.ready = ready;
    }

    /// Record that a control cycle finished (successfully or not)
    ///
    /// The first recorded cycle also marks the scaler ready.
    pub async fn record_cycle(&self) {
        let mut state = self.state.write().await;
        state.last_cycle_timestamp = Some(chrono::Utc::now().timestamp());
        state.ready = true;
    }

    /// Get health response
    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        let mut statuses = state.components.clone();

        if let (Some(last), Some(loop_health)) = (
            state.last_cycle_timestamp,
            statuses.get_mut(components::CONTROL_LOOP),
        ) {
            let idle = chrono::Utc::now().timestamp() - last;
            if idle > self.stall_threshold.as_secs() as i64 {
                *loop_health =
                    ComponentHealth::unhealthy(format!("no cycle finished in the last {idle}s"));
            }
        }

        HealthResponse {
            status: HealthResponse::compute_status(&statuses),
            components: statuses,
            last_cycle_timestamp: state.last_cycle_timestamp,
        }
    }

    /// Get readiness response
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = self.state.read().await.ready;
        let health = self.health().await;

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("Scaler has not completed a cycle yet".to_string()),
            }
        } else if health.status == ComponentStatus::Unhealthy {
            ReadinessResponse {
                ready: false,
                reason: Some("Component unhealthy".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
        assert!(health.last_cycle_timestamp.is_none());
    }

    #[tokio::test]
    async fn test_degraded_recommender_degrades_overall() {
        let registry = HealthRegistry::new();
        registry.register(components::CONTROL_PLANE).await;
        registry.register(components::RECOMMENDER).await;

        registry
            .set_degraded(components::RECOMMENDER, "recommendation timeouts")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert!(health.status.is_operational());
    }

    #[tokio::test]
    async fn test_unhealthy_wins_over_degraded() {
        let registry = HealthRegistry::new();
        registry.register(components::CONTROL_PLANE).await;
        registry.register(components::RECOMMENDER).await;

        registry.set_degraded(components::RECOMMENDER, "slow").await;
        registry
            .set_unhealthy(components::CONTROL_PLANE, "metrics API unreachable")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_record_cycle_marks_ready() {
        let registry = HealthRegistry::new();
        assert!(!registry.readiness().await.ready);

        registry.record_cycle().await;

        let readiness = registry.readiness().await;
        assert!(readiness.ready);
        assert!(registry.health().await.last_cycle_timestamp.is_some());
    }

    #[tokio::test]
    async fn test_readiness_not_ready_when_unhealthy() {
        let registry = HealthRegistry::new();
        registry.register(components::CONTROL_PLANE).await;
        registry.set_ready(true).await;
        registry.set_unhealthy(components::CONTROL_PLANE, "Failed").await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
    }

    #[tokio::test]
    async fn test_stalled_loop_reported_unhealthy() {
        let registry = HealthRegistry::new().with_stall_threshold(Duration::ZERO);
        registry.register(components::CONTROL_LOOP).await;
        registry.record_cycle().await;

        // Any whole second elapsed exceeds a zero threshold
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert_eq!(
            health.components[components::CONTROL_LOOP].status,
            ComponentStatus::Unhealthy
        );
    }
}
