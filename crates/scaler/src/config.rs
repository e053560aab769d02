//! Scaler configuration

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::ConfigBuilder;
use scaler_lib::collector::ClassTargets;
use scaler_lib::engine::{EngineConfig, ScalingLimits};
use scaler_lib::recommender::RecommenderConfig;
use serde::Deserialize;
use std::time::Duration;

/// Daemon configuration, read from `SCALER_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ScalerConfig {
    /// Instance name attached to every structured log event
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Recommendation service base URL
    #[serde(default = "default_recommender_endpoint")]
    pub recommender_endpoint: String,

    #[serde(default = "default_recommender_timeout")]
    pub recommender_timeout_secs: u64,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_critical_deployment")]
    pub critical_deployment: String,

    #[serde(default = "default_noncritical_deployment")]
    pub noncritical_deployment: String,

    /// Bound on a single Kubernetes API request
    #[serde(default = "default_kube_timeout")]
    pub kube_timeout_secs: u64,

    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    #[serde(default = "default_failure_pause")]
    pub failure_pause_secs: u64,

    #[serde(default = "default_max_total_pods")]
    pub max_total_pods: u32,

    #[serde(default = "default_critical_floor")]
    pub critical_floor: u32,

    #[serde(default = "default_noncritical_floor")]
    pub noncritical_floor: u32,

    #[serde(default = "default_critical_ceiling")]
    pub critical_ceiling: u32,

    /// Non-critical ceiling while critical is not stressed
    #[serde(default = "default_noncritical_ceiling")]
    pub noncritical_ceiling: u32,

    #[serde(default = "default_stress_cpu")]
    pub stress_cpu_percent: f64,

    #[serde(default = "default_spike_factor")]
    pub spike_factor: f64,

    #[serde(default = "default_imbalance_ratio")]
    pub imbalance_ratio: f64,

    #[serde(default = "default_imbalance_min_cpu")]
    pub imbalance_min_cpu_milli: f64,

    /// Service-type code sent to the recommendation service
    #[serde(default = "default_service_type_code")]
    pub service_type_code: u32,

    /// Time without a finished cycle before liveness fails
    #[serde(default = "default_stall_threshold")]
    pub stall_threshold_secs: u64,
}

fn default_instance_name() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| "priority-scaler".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_recommender_endpoint() -> String {
    "http://recommender:8000".to_string()
}

fn default_recommender_timeout() -> u64 {
    5
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_critical_deployment() -> String {
    "critical-app".to_string()
}

fn default_noncritical_deployment() -> String {
    "noncritical-app".to_string()
}

fn default_kube_timeout() -> u64 {
    10
}

fn default_cooldown() -> u64 {
    15
}

fn default_cycle_interval() -> u64 {
    6
}

fn default_failure_pause() -> u64 {
    5
}

fn default_max_total_pods() -> u32 {
    8
}

fn default_critical_floor() -> u32 {
    2
}

fn default_noncritical_floor() -> u32 {
    1
}

fn default_critical_ceiling() -> u32 {
    7
}

fn default_noncritical_ceiling() -> u32 {
    3
}

fn default_stress_cpu() -> f64 {
    60.0
}

fn default_spike_factor() -> f64 {
    1.4
}

fn default_imbalance_ratio() -> f64 {
    3.0
}

fn default_imbalance_min_cpu() -> f64 {
    50.0
}

fn default_service_type_code() -> u32 {
    5
}

fn default_stall_threshold() -> u64 {
    120
}

impl ScalerConfig {
    /// Load configuration from environment and an optional config file
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("priority-scaler").required(false))
            .add_source(config::Environment::with_prefix("SCALER").try_parsing(true));

        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration values")
    }

    pub fn engine_config(&self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            limits: ScalingLimits {
                max_total_pods: self.max_total_pods,
                critical_floor: self.critical_floor,
                noncritical_floor: self.noncritical_floor,
                critical_ceiling: self.critical_ceiling,
                noncritical_safe_ceiling: self.noncritical_ceiling,
                stress_cpu: self.stress_cpu_percent,
                ..ScalingLimits::default()
            },
            cooldown: Duration::from_secs(self.cooldown_secs),
            cycle_interval: Duration::from_secs(self.cycle_interval_secs),
            failure_pause: Duration::from_secs(self.failure_pause_secs),
            spike_factor: self.spike_factor,
            imbalance_ratio: self.imbalance_ratio,
            imbalance_min_cpu: self.imbalance_min_cpu_milli,
            service_type_code: self.service_type_code,
            ..defaults
        }
    }

    pub fn class_targets(&self) -> ClassTargets {
        ClassTargets {
            namespace: self.namespace.clone(),
            critical_deployment: self.critical_deployment.clone(),
            noncritical_deployment: self.noncritical_deployment.clone(),
        }
    }

    pub fn recommender_config(&self) -> RecommenderConfig {
        RecommenderConfig {
            endpoint: self.recommender_endpoint.clone(),
            timeout: Duration::from_secs(self.recommender_timeout_secs),
            ..RecommenderConfig::default()
        }
    }

    pub fn kube_timeout(&self) -> Duration {
        Duration::from_secs(self.kube_timeout_secs)
    }

    pub fn stall_threshold(&self) -> Duration {
        Duration::from_secs(self.stall_threshold_secs)
    }
}
