//! Cluster control-plane access
//!
//! This module defines the capability seam the engine uses to read replica
//! counts and pod usage and to issue scale, drain and delete requests. The
//! production implementation talks to the Kubernetes API; tests substitute
//! in-memory mocks.

mod kubernetes;
mod quantity;
mod snapshot;


pub use kubernetes::{ClassTargets, KubeControlPlane, DEFAULT_CALL_TIMEOUT, REQUEST_LOG_WINDOW_SECS};
pub use quantity::{parse_cpu_millicores, parse_memory_mib};
pub use snapshot::ClusterSnapshot;

use crate::models::{ClassUsage, PodSample, PodUsage, ServiceClass};
use anyhow::Result;
use std::time::Duration;

pub use async_trait::async_trait;

/// Trait for cluster control-plane implementations
///
/// Every call is expected to be bounded by a short timeout.
#[async_trait]
pub trait ClusterControlPlane: Send + Sync {
    /// Desired replica count of the class's deployment
    async fn replicas(&self, class: ServiceClass) -> Result<u32>;

    /// Set the desired replica count of the class's deployment
    async fn scale(&self, class: ServiceClass, replicas: u32) -> Result<()>;

    /// CPU and memory usage of every running pod of the class
    async fn pod_usage(&self, class: ServiceClass) -> Result<Vec<PodUsage>>;

    /// Number of requests served recently, counted from access logs
    async fn request_rate(&self) -> Result<u64>;

    /// Take a pod out of its deployment's selector so it stops receiving traffic
    async fn label_for_draining(&self, class: ServiceClass, pod_id: &str) -> Result<()>;

    /// Put a drained pod back under its deployment's selector
    async fn restore_label(&self, class: ServiceClass, pod_id: &str) -> Result<()>;

    /// Delete a pod with the given termination grace period
    async fn delete_pod(&self, pod_id: &str, grace: Duration) -> Result<()>;

    /// Aggregated class utilisation
    async fn class_usage(&self, class: ServiceClass) -> Result<ClassUsage> {
        let pods = self.pod_usage(class).await?;
        Ok(ClassUsage::from_pods(&pods))
    }

    /// Per-pod CPU used for imbalance detection
    async fn per_pod_cpu(&self, class: ServiceClass) -> Result<Vec<PodSample>> {
        let pods = self.pod_usage(class).await?;
        Ok(pods.iter().map(PodSample::from).collect())
    }
}
