//! Per-cycle telemetry snapshot
//!
//! Gathers class utilisation, replica counts and request rate from the
//! control plane. A failed read degrades that metric to zero instead of
//! failing the cycle; the failures are kept for the caller to report.

use super::ClusterControlPlane;
use crate::error::ScalerError;
use crate::models::{ClassUsage, ReplicaCounts, ServiceClass, TelemetrySample};
use tracing::warn;

/// Telemetry for both classes, taken once at the start of a cycle
#[derive(Debug)]
pub struct ClusterSnapshot {
    pub critical: TelemetrySample,
    pub noncritical: TelemetrySample,
    pub replicas: ReplicaCounts,
    pub request_rate: u64,
    /// False when a replica count could not be read; scaling from a guessed
    /// count is unsafe
    pub replicas_known: bool,
    /// Reads that failed and were replaced by defaults
    pub degraded: Vec<ScalerError>,
}

impl ClusterSnapshot {
    /// Read the current cluster state
    pub async fn gather(plane: &dyn ClusterControlPlane) -> Self {
        let mut degraded = Vec::new();

        let critical_usage = match plane.class_usage(ServiceClass::Critical).await {
            Ok(usage) => usage,
            Err(e) => {
                degraded.push(telemetry_error(ServiceClass::Critical, e));
                ClassUsage::default()
            }
        };
        let noncritical_usage = match plane.class_usage(ServiceClass::NonCritical).await {
            Ok(usage) => usage,
            Err(e) => {
                degraded.push(telemetry_error(ServiceClass::NonCritical, e));
                ClassUsage::default()
            }
        };

        let mut replicas = ReplicaCounts::default();
        let mut replicas_known = true;
        for class in ServiceClass::ALL {
            match plane.replicas(class).await {
                Ok(count) => replicas.set(class, count),
                Err(e) => {
                    replicas_known = false;
                    degraded.push(telemetry_error(class, e));
                }
            }
        }

        let request_rate = match plane.request_rate().await {
            Ok(rate) => rate,
            Err(e) => {
                degraded.push(telemetry_error(ServiceClass::Critical, e));
                0
            }
        };

        for err in &degraded {
            warn!(error = %err, "Telemetry degraded to defaults");
        }

        Self {
            critical: TelemetrySample::new(
                ServiceClass::Critical,
                critical_usage,
                request_rate,
                replicas.critical,
            ),
            noncritical: TelemetrySample::new(
                ServiceClass::NonCritical,
                noncritical_usage,
                request_rate,
                replicas.noncritical,
            ),
            replicas,
            request_rate,
            replicas_known,
            degraded,
        }
    }

    pub fn sample(&self, class: ServiceClass) -> &TelemetrySample {
        match class {
            ServiceClass::Critical => &self.critical,
            ServiceClass::NonCritical => &self.noncritical,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

fn telemetry_error(class: ServiceClass, err: anyhow::Error) -> ScalerError {
    ScalerError::Telemetry {
        class,
        reason: format!("{err:#}"),
    }
}
