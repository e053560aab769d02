//! Core data models for the priority scaler

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Workload priority tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceClass {
    Critical,
    NonCritical,
}

impl ServiceClass {
    /// Both classes in phase order
    pub const ALL: [ServiceClass; 2] = [ServiceClass::Critical, ServiceClass::NonCritical];

    /// Encoding used in the recommendation feature vector
    pub fn class_code(&self) -> u8 {
        match self {
            ServiceClass::Critical => 0,
            ServiceClass::NonCritical => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceClass::Critical => "critical",
            ServiceClass::NonCritical => "noncritical",
        }
    }
}

impl fmt::Display for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(ServiceClass::Critical),
            "noncritical" | "non_critical" | "non-critical" => Ok(ServiceClass::NonCritical),
            other => Err(format!("unknown service class: {other}")),
        }
    }
}

/// Scaling action, as named on the recommendation wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleAction {
    ScaleUp,
    ScaleDown,
    Stable,
}

impl ScaleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleAction::ScaleUp => "scale_up",
            ScaleAction::ScaleDown => "scale_down",
            ScaleAction::Stable => "stable",
        }
    }
}

impl fmt::Display for ScaleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScaleAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "scale_up" => Ok(ScaleAction::ScaleUp),
            "scale_down" => Ok(ScaleAction::ScaleDown),
            "stable" => Ok(ScaleAction::Stable),
            other => Err(format!("unknown scale action: {other}")),
        }
    }
}

/// Replica counts of both classes as last observed or successfully written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaCounts {
    pub critical: u32,
    pub noncritical: u32,
}

impl ReplicaCounts {
    pub fn new(critical: u32, noncritical: u32) -> Self {
        Self {
            critical,
            noncritical,
        }
    }

    pub fn get(&self, class: ServiceClass) -> u32 {
        match class {
            ServiceClass::Critical => self.critical,
            ServiceClass::NonCritical => self.noncritical,
        }
    }

    pub fn set(&mut self, class: ServiceClass, replicas: u32) {
        match class {
            ServiceClass::Critical => self.critical = replicas,
            ServiceClass::NonCritical => self.noncritical = replicas,
        }
    }

    pub fn total(&self) -> u32 {
        self.critical + self.noncritical
    }

    /// Counts after moving `class` to `replicas`
    pub fn with(&self, class: ServiceClass, replicas: u32) -> Self {
        let mut next = *self;
        next.set(class, replicas);
        next
    }
}

/// Resource usage of a single pod from the metrics API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodUsage {
    pub pod_id: String,
    pub cpu_milli: u64,
    pub mem_mib: u64,
}

/// Per-pod CPU sample used for imbalance detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSample {
    pub pod_id: String,
    pub cpu_milli: f64,
}

impl PodSample {
    pub fn new(pod_id: impl Into<String>, cpu_milli: f64) -> Self {
        Self {
            pod_id: pod_id.into(),
            cpu_milli,
        }
    }
}

impl From<&PodUsage> for PodSample {
    fn from(usage: &PodUsage) -> Self {
        Self {
            pod_id: usage.pod_id.clone(),
            cpu_milli: usage.cpu_milli as f64,
        }
    }
}

/// Aggregated CPU and memory utilisation of a class
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassUsage {
    pub cpu_percent: f64,
    pub mem_percent: f64,
}

impl ClassUsage {
    /// Aggregate pod usage into class utilisation.
    ///
    /// CPU weights the hottest pod: `0.8 * max + 0.2 * mean` over millicores.
    /// Memory is the largest pod's MiB divided by ten. Both are capped at 100.
    pub fn from_pods(pods: &[PodUsage]) -> Self {
        if pods.is_empty() {
            return Self::default();
        }

        let max_cpu = pods.iter().map(|p| p.cpu_milli).max().unwrap_or(0) as f64;
        let mean_cpu = pods.iter().map(|p| p.cpu_milli as f64).sum::<f64>() / pods.len() as f64;
        let max_mem = pods.iter().map(|p| p.mem_mib).max().unwrap_or(0) as f64;

        Self {
            cpu_percent: (0.8 * max_cpu + 0.2 * mean_cpu).min(100.0),
            mem_percent: (max_mem / 10.0).min(100.0),
        }
    }
}

/// One cycle's telemetry for a class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub class: ServiceClass,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub latency_ms: f64,
    pub error_count: u32,
    pub request_rate: u64,
    pub replicas: u32,
    pub predicted_load: f64,
}

impl TelemetrySample {
    /// Build a sample, deriving latency and predicted load from utilisation
    pub fn new(class: ServiceClass, usage: ClassUsage, request_rate: u64, replicas: u32) -> Self {
        let latency_ms = 50.0 + 0.5 * usage.cpu_percent;
        let predicted_load =
            0.5 * usage.cpu_percent + 0.3 * usage.mem_percent + 0.2 * (latency_ms / 2.0);

        Self {
            class,
            cpu_percent: usage.cpu_percent,
            mem_percent: usage.mem_percent,
            latency_ms,
            error_count: 0,
            request_rate,
            replicas,
            predicted_load,
        }
    }
}

/// Number of values in a recommendation feature vector
pub const FEATURE_COUNT: usize = 9;

/// Ordered feature vector sent to the recommendation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    /// `[cpu, mem, latency, errors, request_rate, replicas, predicted_load, service_type, class]`
    pub fn from_sample(sample: &TelemetrySample, service_type_code: u32) -> Self {
        Self([
            sample.cpu_percent,
            sample.mem_percent,
            sample.latency_ms,
            sample.error_count as f64,
            sample.request_rate as f64,
            sample.replicas as f64,
            sample.predicted_load,
            service_type_code as f64,
            sample.class.class_code() as f64,
        ])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Recommendation returned for a feature vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: ScaleAction,
    pub confidence: f32,
}
