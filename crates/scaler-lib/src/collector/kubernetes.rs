//! Kubernetes-backed control plane
//!
//! Reads deployment replica counts and pod metrics from the API server and
//! the `metrics.k8s.io` aggregation layer, and issues scale, relabel and
//! delete requests. Every request is bounded by a timeout.

use super::{parse_cpu_millicores, parse_memory_mib, ClusterControlPlane};
use crate::models::{PodUsage, ServiceClass};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, LogParams, Patch, PatchParams};
use kube::discovery::ApiResource;
use kube::{Client, ResourceExt};
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Default bound on a single control-plane request
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Log window used to count recent requests
pub const REQUEST_LOG_WINDOW_SECS: i64 = 5;

/// Deployment names backing each class
#[derive(Debug, Clone)]
pub struct ClassTargets {
    pub namespace: String,
    pub critical_deployment: String,
    pub noncritical_deployment: String,
}

impl ClassTargets {
    pub fn deployment(&self, class: ServiceClass) -> &str {
        match class {
            ServiceClass::Critical => &self.critical_deployment,
            ServiceClass::NonCritical => &self.noncritical_deployment,
        }
    }

    /// Label selector matching the class's pods
    pub fn selector(&self, class: ServiceClass) -> String {
        format!("app={}", self.deployment(class))
    }

    /// `app` label value that detaches a pod from its deployment
    pub fn draining_label(&self, class: ServiceClass) -> String {
        format!("{}-draining", self.deployment(class))
    }
}

impl Default for ClassTargets {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            critical_deployment: "critical-app".to_string(),
            noncritical_deployment: "noncritical-app".to_string(),
        }
    }
}

/// Control plane backed by the Kubernetes API
pub struct KubeControlPlane {
    client: Client,
    targets: ClassTargets,
    call_timeout: Duration,
}

impl KubeControlPlane {
    pub fn new(client: Client, targets: ClassTargets) -> Self {
        Self {
            client,
            targets,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Set a custom per-request timeout
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Connect using the in-cluster or local kubeconfig
    pub async fn try_default(targets: ClassTargets) -> Result<Self> {
        let client = Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?;
        Ok(Self::new(client, targets))
    }

    pub fn targets(&self) -> &ClassTargets {
        &self.targets
    }

    fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.targets.namespace)
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.targets.namespace)
    }

    fn pod_metrics(&self) -> Api<DynamicObject> {
        let ar = ApiResource {
            group: "metrics.k8s.io".into(),
            version: "v1beta1".into(),
            api_version: "metrics.k8s.io/v1beta1".into(),
            kind: "PodMetrics".into(),
            plural: "pods".into(),
        };
        Api::namespaced_with(self.client.clone(), &self.targets.namespace, &ar)
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result.with_context(|| format!("Failed to {what}")),
            Err(_) => Err(anyhow!(
                "Timed out after {}s trying to {what}",
                self.call_timeout.as_secs()
            )),
        }
    }

    /// Merge-patch the pod's `app` label, which the deployment selects on
    async fn set_app_label(&self, pod_id: &str, app: &str, what: &str) -> Result<()> {
        let patch = json!({ "metadata": { "labels": { "app": app } } });
        let api = self.pods();

        self.bounded(
            &format!("{what} {pod_id}"),
            api.patch(pod_id, &PatchParams::default(), &Patch::Merge(&patch)),
        )
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ClusterControlPlane for KubeControlPlane {
    async fn replicas(&self, class: ServiceClass) -> Result<u32> {
        let name = self.targets.deployment(class);
        let api = self.deployments();
        let deployment = self
            .bounded(&format!("get deployment {name}"), api.get(name))
            .await?;

        let replicas = deployment.spec.and_then(|s| s.replicas).unwrap_or(0);
        Ok(replicas.max(0) as u32)
    }

    async fn scale(&self, class: ServiceClass, replicas: u32) -> Result<()> {
        let name = self.targets.deployment(class);
        let patch = json!({ "spec": { "replicas": replicas } });
        let api = self.deployments();

        self.bounded(
            &format!("scale deployment {name} to {replicas}"),
            api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)),
        )
        .await?;

        Ok(())
    }

    async fn pod_usage(&self, class: ServiceClass) -> Result<Vec<PodUsage>> {
        let selector = self.targets.selector(class);
        let api = self.pod_metrics();
        let lp = ListParams::default().labels(&selector);
        let list = self
            .bounded(&format!("list pod metrics for {selector}"), api.list(&lp))
            .await?;

        let mut pods = Vec::new();
        for item in list {
            let pod_id = item.name_any();
            let mut cpu_milli = 0u64;
            let mut mem_mib = 0u64;

            if let Some(containers) = item.data.get("containers").and_then(|c| c.as_array()) {
                for container in containers {
                    let Some(usage) = container.get("usage") else {
                        continue;
                    };
                    if let Some(cpu) = usage.get("cpu").and_then(|v| v.as_str()) {
                        cpu_milli += parse_cpu_millicores(cpu);
                    }
                    if let Some(mem) = usage.get("memory").and_then(|v| v.as_str()) {
                        mem_mib += parse_memory_mib(mem);
                    }
                }
            }

            pods.push(PodUsage {
                pod_id,
                cpu_milli,
                mem_mib,
            });
        }

        debug!(class = %class, pods = pods.len(), "Fetched pod metrics");
        Ok(pods)
    }

    async fn request_rate(&self) -> Result<u64> {
        let selector = self.targets.selector(ServiceClass::Critical);
        let api = self.pods();
        let lp = ListParams::default().labels(&selector);
        let list = self
            .bounded(&format!("list pods for {selector}"), api.list(&lp))
            .await?;

        let Some(pod) = list.items.first() else {
            return Ok(0);
        };
        let name = pod.name_any();

        let params = LogParams {
            since_seconds: Some(REQUEST_LOG_WINDOW_SECS),
            ..LogParams::default()
        };
        let logs = self
            .bounded(&format!("read logs of {name}"), api.logs(&name, &params))
            .await?;

        Ok(count_requests(&logs))
    }

    async fn label_for_draining(&self, class: ServiceClass, pod_id: &str) -> Result<()> {
        let label = self.targets.draining_label(class);
        self.set_app_label(pod_id, &label, "relabel pod for draining")
            .await
    }

    async fn restore_label(&self, class: ServiceClass, pod_id: &str) -> Result<()> {
        let label = self.targets.deployment(class).to_string();
        self.set_app_label(pod_id, &label, "restore pod label").await
    }

    async fn delete_pod(&self, pod_id: &str, grace: Duration) -> Result<()> {
        let params = DeleteParams {
            grace_period_seconds: Some(grace.as_secs() as u32),
            ..DeleteParams::default()
        };
        let api = self.pods();

        self.bounded(&format!("delete pod {pod_id}"), api.delete(pod_id, &params))
            .await?;

        Ok(())
    }
}

/// Count HTTP requests in access log text
pub(crate) fn count_requests(logs: &str) -> u64 {
    (logs.matches("GET").count() + logs.matches("POST").count()) as u64
}
