//! In-memory doubles for the control plane and recommendation service

use crate::collector::ClusterControlPlane;
use crate::models::{
    FeatureVector, PodUsage, Recommendation, ReplicaCounts, ScaleAction, ServiceClass,
};
use crate::recommender::Recommender;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct PlaneState {
    replicas: ReplicaCounts,
    pods: HashMap<ServiceClass, Vec<PodUsage>>,
    request_rate: u64,
    fail_scale: HashSet<ServiceClass>,
    fail_replicas: bool,
    fail_usage: bool,
    fail_delete: bool,
    scale_calls: Vec<(ServiceClass, u32)>,
    drained: Vec<(ServiceClass, String)>,
    restored: Vec<(ServiceClass, String)>,
    deleted: Vec<String>,
}

/// Control plane that keeps replica counts in memory and records writes
pub struct MockControlPlane {
    state: Mutex<PlaneState>,
}

impl MockControlPlane {
    pub fn new(critical: u32, noncritical: u32) -> Self {
        Self {
            state: Mutex::new(PlaneState {
                replicas: ReplicaCounts::new(critical, noncritical),
                ..PlaneState::default()
            }),
        }
    }

    /// Give every pod of `class` the same CPU (millicores) and memory (MiB)
    pub fn set_uniform_usage(&self, class: ServiceClass, cpu_milli: u64, mem_mib: u64) {
        let mut state = self.state.lock().unwrap();
        let count = state.replicas.get(class).max(1);
        let pods = (0..count)
            .map(|i| PodUsage {
                pod_id: format!("{}-{i}", class.as_str()),
                cpu_milli,
                mem_mib,
            })
            .collect();
        state.pods.insert(class, pods);
    }

    pub fn set_pods(&self, class: ServiceClass, pods: Vec<PodUsage>) {
        self.state.lock().unwrap().pods.insert(class, pods);
    }

    pub fn set_request_rate(&self, rate: u64) {
        self.state.lock().unwrap().request_rate = rate;
    }

    pub fn fail_scale_for(&self, class: ServiceClass) {
        self.state.lock().unwrap().fail_scale.insert(class);
    }

    pub fn fail_replica_reads(&self) {
        self.state.lock().unwrap().fail_replicas = true;
    }

    pub fn fail_usage_reads(&self) {
        self.state.lock().unwrap().fail_usage = true;
    }

    pub fn fail_deletes(&self) {
        self.state.lock().unwrap().fail_delete = true;
    }

    pub fn replica_counts(&self) -> ReplicaCounts {
        self.state.lock().unwrap().replicas
    }

    pub fn scale_calls(&self) -> Vec<(ServiceClass, u32)> {
        self.state.lock().unwrap().scale_calls.clone()
    }

    pub fn drained(&self) -> Vec<(ServiceClass, String)> {
        self.state.lock().unwrap().drained.clone()
    }

    pub fn restored(&self) -> Vec<(ServiceClass, String)> {
        self.state.lock().unwrap().restored.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }
}

#[async_trait]
impl ClusterControlPlane for MockControlPlane {
    async fn replicas(&self, class: ServiceClass) -> Result<u32> {
        let state = self.state.lock().unwrap();
        if state.fail_replicas {
            return Err(anyhow!("deployment read refused"));
        }
        Ok(state.replicas.get(class))
    }

    async fn scale(&self, class: ServiceClass, replicas: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_scale.contains(&class) {
            return Err(anyhow!("scale of {class} rejected"));
        }
        state.scale_calls.push((class, replicas));
        state.replicas.set(class, replicas);
        Ok(())
    }

    async fn pod_usage(&self, class: ServiceClass) -> Result<Vec<PodUsage>> {
        let state = self.state.lock().unwrap();
        if state.fail_usage {
            return Err(anyhow!("metrics API unavailable"));
        }
        Ok(state.pods.get(&class).cloned().unwrap_or_default())
    }

    async fn request_rate(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().request_rate)
    }

    async fn label_for_draining(&self, class: ServiceClass, pod_id: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .drained
            .push((class, pod_id.to_string()));
        Ok(())
    }

    async fn restore_label(&self, class: ServiceClass, pod_id: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .restored
            .push((class, pod_id.to_string()));
        Ok(())
    }

    async fn delete_pod(&self, pod_id: &str, _grace: Duration) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_delete {
            return Err(anyhow!("pod {pod_id} delete forbidden"));
        }
        state.deleted.push(pod_id.to_string());
        for pods in state.pods.values_mut() {
            pods.retain(|p| p.pod_id != pod_id);
        }
        Ok(())
    }
}

/// Recommender returning a fixed action per class
pub struct MockRecommender {
    actions: Mutex<HashMap<ServiceClass, ScaleAction>>,
    failing: Mutex<HashSet<ServiceClass>>,
    calls: Mutex<Vec<FeatureVector>>,
}

impl MockRecommender {
    pub fn new(critical: ScaleAction, noncritical: ScaleAction) -> Self {
        let actions = HashMap::from([
            (ServiceClass::Critical, critical),
            (ServiceClass::NonCritical, noncritical),
        ]);
        Self {
            actions: Mutex::new(actions),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_for(&self, class: ServiceClass) {
        self.failing.lock().unwrap().insert(class);
    }

    pub fn calls(&self) -> Vec<FeatureVector> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Recommender for MockRecommender {
    async fn recommend(&self, features: &FeatureVector) -> Result<Recommendation> {
        self.calls.lock().unwrap().push(features.clone());

        let class = if features.0[8] == 0.0 {
            ServiceClass::Critical
        } else {
            ServiceClass::NonCritical
        };
        if self.failing.lock().unwrap().contains(&class) {
            return Err(anyhow!("recommendation service timed out"));
        }

        let action = self.actions.lock().unwrap()[&class];
        Ok(Recommendation {
            action,
            confidence: 0.9,
        })
    }
}
