//! Error taxonomy for the scaling engine

use crate::models::ServiceClass;
use thiserror::Error;

/// Failures the control cycle distinguishes between.
///
/// Only `RecommendationUnavailable` aborts a cycle; the other variants are
/// logged and absorbed where they occur.
#[derive(Debug, Error)]
pub enum ScalerError {
    /// A control-plane read failed or returned nothing usable
    #[error("telemetry unavailable for {class}: {reason}")]
    Telemetry { class: ServiceClass, reason: String },

    /// The recommendation service timed out, failed or sent garbage
    #[error("recommendation unavailable for {class}: {reason}")]
    RecommendationUnavailable { class: ServiceClass, reason: String },

    /// The control plane rejected a scale request
    #[error("scaling {class} to {target} replicas failed: {reason}")]
    ScaleCommand {
        class: ServiceClass,
        target: u32,
        reason: String,
    },

    /// A scale target would break the cluster budget or a class bound
    #[error(
        "budget violation: {class} -> {target} with critical={critical} \
         noncritical={noncritical} (max {max_total})"
    )]
    BudgetViolation {
        class: ServiceClass,
        target: u32,
        critical: u32,
        noncritical: u32,
        max_total: u32,
    },

    /// Startup configuration is inconsistent
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ScalerError {
    /// Returns true if the error should abort the remainder of the cycle
    pub fn aborts_cycle(&self) -> bool {
        matches!(self, ScalerError::RecommendationUnavailable { .. })
    }
}
