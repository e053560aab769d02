//! Engine configuration and scaling limits

use crate::anomaly::{
    DEFAULT_IMBALANCE_MIN_CPU, DEFAULT_IMBALANCE_RATIO, DEFAULT_SPIKE_FACTOR,
    DEFAULT_WINDOW_CAPACITY, MIN_SAMPLES_FOR_DETECTION,
};
use crate::error::ScalerError;
use crate::models::{ReplicaCounts, ServiceClass};
use std::time::Duration;

/// Replica bounds and CPU thresholds shared by the resolver and allocator
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingLimits {
    /// Cluster-wide pod budget across both classes
    pub max_total_pods: u32,
    pub critical_floor: u32,
    pub noncritical_floor: u32,
    pub critical_ceiling: u32,
    /// Non-critical ceiling while critical is not stressed
    pub noncritical_safe_ceiling: u32,
    /// Critical CPU above which critical counts as stressed
    pub stress_cpu: f64,
    /// Critical CPU below which a stable critical class is trimmed
    pub critical_idle_cpu: f64,
    /// Non-critical CPU below which a stable non-critical class is trimmed
    pub noncritical_idle_cpu: f64,
    /// Both classes below this CPU (and at floor) count as balanced
    pub balanced_cpu: f64,
}

impl Default for ScalingLimits {
    fn default() -> Self {
        Self {
            max_total_pods: 8,
            critical_floor: 2,
            noncritical_floor: 1,
            critical_ceiling: 7,
            noncritical_safe_ceiling: 3,
            stress_cpu: 60.0,
            critical_idle_cpu: 25.0,
            noncritical_idle_cpu: 20.0,
            balanced_cpu: 40.0,
        }
    }
}

impl ScalingLimits {
    pub fn floor(&self, class: ServiceClass) -> u32 {
        match class {
            ServiceClass::Critical => self.critical_floor,
            ServiceClass::NonCritical => self.noncritical_floor,
        }
    }

    /// Highest count the allocator will ever raise a class to
    pub fn ceiling(&self, class: ServiceClass) -> u32 {
        match class {
            ServiceClass::Critical => self.critical_ceiling,
            ServiceClass::NonCritical => self.noncritical_safe_ceiling,
        }
    }

    pub fn is_stressed(&self, critical_cpu: f64) -> bool {
        critical_cpu > self.stress_cpu
    }

    /// Critical target while stressed, before the budget clamp
    pub fn stressed_critical_target(&self) -> u32 {
        self.max_total_pods
            .saturating_sub(self.noncritical_floor)
            .min(self.critical_ceiling)
    }

    /// Both classes at floor and both quiet
    pub fn is_balanced(
        &self,
        counts: &ReplicaCounts,
        critical_cpu: f64,
        noncritical_cpu: f64,
    ) -> bool {
        critical_cpu < self.balanced_cpu
            && noncritical_cpu < self.balanced_cpu
            && counts.critical == self.critical_floor
            && counts.noncritical == self.noncritical_floor
    }
}

/// Full engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub limits: ScalingLimits,
    /// Minimum time between two successful scaling actions
    pub cooldown: Duration,
    /// Pause between cycles
    pub cycle_interval: Duration,
    /// Pause before restarting after a recommendation failure
    pub failure_pause: Duration,
    /// Pause between preempting non-critical and raising critical
    pub preemption_settle: Duration,
    /// Wait between relabelling a hot pod and deleting it
    pub drain_grace: Duration,
    /// Termination grace period for deleted hot pods
    pub delete_grace: Duration,
    pub spike_factor: f64,
    pub spike_window: usize,
    pub spike_min_samples: usize,
    pub imbalance_ratio: f64,
    /// Minimum hot-pod CPU in millicores
    pub imbalance_min_cpu: f64,
    /// Service-type code sent in the feature vector
    pub service_type_code: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: ScalingLimits::default(),
            cooldown: Duration::from_secs(15),
            cycle_interval: Duration::from_secs(6),
            failure_pause: Duration::from_secs(5),
            preemption_settle: Duration::from_secs(2),
            drain_grace: Duration::from_secs(5),
            delete_grace: Duration::from_secs(10),
            spike_factor: DEFAULT_SPIKE_FACTOR,
            spike_window: DEFAULT_WINDOW_CAPACITY,
            spike_min_samples: MIN_SAMPLES_FOR_DETECTION,
            imbalance_ratio: DEFAULT_IMBALANCE_RATIO,
            imbalance_min_cpu: DEFAULT_IMBALANCE_MIN_CPU,
            service_type_code: 5,
        }
    }
}

impl EngineConfig {
    /// Reject configurations the allocator cannot honour
    pub fn validate(&self) -> Result<(), ScalerError> {
        let l = &self.limits;
        let invalid = |msg: String| Err(ScalerError::InvalidConfig(msg));

        if l.critical_floor + l.noncritical_floor > l.max_total_pods {
            return invalid(format!(
                "floors ({} + {}) exceed max_total_pods {}",
                l.critical_floor, l.noncritical_floor, l.max_total_pods
            ));
        }
        if l.critical_ceiling < l.critical_floor {
            return invalid(format!(
                "critical_ceiling {} is below critical_floor {}",
                l.critical_ceiling, l.critical_floor
            ));
        }
        if l.critical_ceiling > l.max_total_pods {
            return invalid(format!(
                "critical_ceiling {} exceeds max_total_pods {}",
                l.critical_ceiling, l.max_total_pods
            ));
        }
        if l.noncritical_safe_ceiling < l.noncritical_floor {
            return invalid(format!(
                "noncritical_safe_ceiling {} is below noncritical_floor {}",
                l.noncritical_safe_ceiling, l.noncritical_floor
            ));
        }
        if self.spike_window < 2
            || self.spike_min_samples < 2
            || self.spike_min_samples > self.spike_window
        {
            return invalid(format!(
                "spike window {} / min samples {} must satisfy 2 <= min <= window",
                self.spike_window, self.spike_min_samples
            ));
        }
        if !(self.spike_factor.is_finite() && self.spike_factor > 0.0) {
            return invalid(format!("spike_factor {} must be positive", self.spike_factor));
        }
        if !(self.imbalance_ratio.is_finite() && self.imbalance_ratio > 0.0) {
            return invalid(format!(
                "imbalance_ratio {} must be positive",
                self.imbalance_ratio
            ));
        }
        if self.cycle_interval.is_zero() {
            return invalid("cycle_interval must be non-zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_floors_above_budget_rejected() {
        let mut config = EngineConfig::default();
        config.limits.max_total_pods = 2;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("floors"));
    }

    #[test]
    fn test_inverted_ceiling_rejected() {
        let mut config = EngineConfig::default();
        config.limits.noncritical_safe_ceiling = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.limits.critical_ceiling = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spike_window_bounds() {
        let mut config = EngineConfig::default();
        config.spike_min_samples = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stressed_target() {
        let limits = ScalingLimits::default();
        assert_eq!(limits.stressed_critical_target(), 7);
        assert!(limits.is_stressed(60.5));
        assert!(!limits.is_stressed(60.0));
    }

    #[test]
    fn test_balanced_requires_floor_and_quiet() {
        let limits = ScalingLimits::default();

        assert!(limits.is_balanced(&ReplicaCounts::new(2, 1), 30.0, 30.0));
        assert!(!limits.is_balanced(&ReplicaCounts::new(3, 1), 30.0, 30.0));
        assert!(!limits.is_balanced(&ReplicaCounts::new(2, 1), 45.0, 30.0));
    }
}
