//! Library for the priority pod scaler
//!
//! This crate provides the core functionality for:
//! - Telemetry gathering from the cluster control plane
//! - CPU spike and per-pod load imbalance detection
//! - Recommendation service access
//! - Budget-respecting replica allocation with priority preemption
//! - Health checks and observability

pub mod anomaly;
pub mod collector;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod recommender;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ScalerError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ScalerMetrics, StructuredLogger};
