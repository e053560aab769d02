//! HTTP API for liveness, readiness and Prometheus metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use scaler_lib::{
    health::{HealthRegistry, HealthResponse, ReadinessResponse},
    observability::ScalerMetrics,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    /// Instance name reported by the readiness endpoint
    pub instance: String,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, instance: impl Into<String>) -> Self {
        Self {
            health_registry,
            instance: instance.into(),
        }
    }
}

/// `/readyz` body: readiness plus how fresh the control loop is
#[derive(Debug, Serialize)]
pub struct ReadyzBody {
    #[serde(flatten)]
    pub readiness: ReadinessResponse,
    pub instance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_since_last_cycle: Option<i64>,
    pub stall_threshold_secs: u64,
}

/// Liveness: 503 only when a component is unhealthy, which includes a
/// control loop that has not finished a cycle within the stall threshold
async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let health = state.health_registry.health().await;

    let status_code = if health.status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyzBody>) {
    let registry = &state.health_registry;
    let readiness = registry.readiness().await;
    let last_cycle = registry.last_cycle_timestamp().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = ReadyzBody {
        readiness,
        instance: state.instance.clone(),
        last_cycle_timestamp: last_cycle,
        seconds_since_last_cycle: last_cycle
            .map(|ts| (chrono::Utc::now().timestamp() - ts).max(0)),
        stall_threshold_secs: registry.stall_threshold().as_secs(),
    };

    (status_code, Json(body))
}

async fn metrics() -> Response {
    match ScalerMetrics::new().encode_text() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
