//! Integration tests for the scaler API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use priority_scaler::api::{create_router, AppState};
use scaler_lib::{
    health::{components, HealthRegistry},
    observability::ScalerMetrics,
    ScaleAction, ServiceClass,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new().with_stall_threshold(Duration::from_secs(90));
    health_registry.register(components::CONTROL_PLANE).await;
    health_registry.register(components::RECOMMENDER).await;
    health_registry.register(components::CONTROL_LOOP).await;

    let state = Arc::new(AppState::new(health_registry, "scaler-test"));
    let router = create_router(state.clone());

    (router, state)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["control_plane"].is_object());
    assert!(health["components"]["recommender"].is_object());
    assert!(health["components"]["control_loop"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_recommender_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::RECOMMENDER, "recommendation request timed out")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    // Degraded is still operational
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["recommender"]["message"],
        "recommendation request timed out"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::CONTROL_PLANE, "API server unreachable")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_before_first_cycle() {
    let (app, _state) = setup_test_app().await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
    assert_eq!(readiness["instance"], "scaler-test");
    assert_eq!(readiness["stall_threshold_secs"], 90);
    assert!(readiness.get("last_cycle_timestamp").is_none());
}

#[tokio::test]
async fn test_readyz_returns_ok_after_cycle() {
    let (app, state) = setup_test_app().await;

    state.health_registry.record_cycle().await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
    assert!(readiness["last_cycle_timestamp"].is_i64());
    assert!(readiness["seconds_since_last_cycle"].as_i64().unwrap() <= 1);
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let (app, state) = setup_test_app().await;

    state.health_registry.record_cycle().await;
    state
        .health_registry
        .set_unhealthy(components::CONTROL_PLANE, "Failed")
        .await;

    let (status, _) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, _state) = setup_test_app().await;
    let metrics = ScalerMetrics::new();

    metrics.set_replicas(ServiceClass::Critical, 3);
    metrics.set_cpu_percent(ServiceClass::NonCritical, 12.5);
    metrics.inc_scale_action(ServiceClass::Critical, ScaleAction::ScaleUp);
    metrics.inc_preemptions();
    metrics.set_balanced(true);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("priority_scaler_replicas"));
    assert!(metrics_text.contains("priority_scaler_cpu_percent"));
    assert!(metrics_text.contains("priority_scaler_scale_actions_total"));
    assert!(metrics_text.contains("priority_scaler_preemptions_total"));
    assert!(metrics_text.contains("priority_scaler_cluster_balanced"));
}

#[tokio::test]
async fn test_metrics_contains_histogram_buckets() {
    let (app, _state) = setup_test_app().await;
    let metrics = ScalerMetrics::new();

    metrics.observe_cycle_duration(0.2);
    metrics.observe_cycle_duration(1.5);
    metrics.observe_recommendation_latency(0.05);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("priority_scaler_cycle_duration_seconds_bucket"));
    assert!(metrics_text.contains("priority_scaler_cycle_duration_seconds_count"));
    assert!(metrics_text.contains("priority_scaler_recommendation_latency_seconds_sum"));
}

#[tokio::test]
async fn test_healthz_fails_when_control_loop_stalls() {
    let health_registry = HealthRegistry::new().with_stall_threshold(Duration::ZERO);
    health_registry.register(components::CONTROL_LOOP).await;
    health_registry.record_cycle().await;
    let app = create_router(Arc::new(AppState::new(health_registry, "scaler-test")));

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["components"]["control_loop"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
