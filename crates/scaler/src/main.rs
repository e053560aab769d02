//! Priority scaler - budget-constrained autoscaler for two workload classes
//!
//! Runs the control loop against the Kubernetes API and serves health and
//! Prometheus metrics over HTTP.

use anyhow::{Context, Result};
use priority_scaler::{api, config};
use scaler_lib::{
    collector::KubeControlPlane,
    engine::ControlCycle,
    health::{components, HealthRegistry},
    observability::{ScalerMetrics, StructuredLogger},
    recommender::HttpRecommender,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SCALER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting priority-scaler");

    let config = config::ScalerConfig::load()?;
    let engine_config = config.engine_config();
    engine_config.validate()?;
    info!(
        namespace = %config.namespace,
        critical = %config.critical_deployment,
        noncritical = %config.noncritical_deployment,
        recommender = %config.recommender_endpoint,
        "Scaler configured"
    );

    let health_registry = HealthRegistry::new().with_stall_threshold(config.stall_threshold());
    health_registry.register(components::CONTROL_PLANE).await;
    health_registry.register(components::RECOMMENDER).await;
    health_registry.register(components::CONTROL_LOOP).await;

    let metrics = ScalerMetrics::new();

    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(SCALER_VERSION, engine_config.limits.max_total_pods);

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), &config.instance_name));
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, "API server stopped");
        }
    });

    let plane = KubeControlPlane::try_default(config.class_targets())
        .await?
        .with_call_timeout(config.kube_timeout());
    let recommender = HttpRecommender::new(config.recommender_config())
        .context("Failed to create recommendation client")?;

    let cycle = ControlCycle::builder(Arc::new(plane), Arc::new(recommender))
        .config(engine_config)
        .metrics(metrics)
        .logger(logger.clone())
        .health(health_registry)
        .build()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(cycle.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());

    loop_handle.await.context("Control loop task failed")?;
    info!("Shutdown complete");

    Ok(())
}
