//! Observability infrastructure for the priority scaler
//!
//! Provides:
//! - Prometheus metrics (replicas, CPU, scale actions, preemptions, anomalies, errors)
//! - Structured JSON logging with tracing

use crate::models::{ScaleAction, ServiceClass};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, register_int_gauge_vec, Encoder, GaugeVec, Histogram, IntCounter,
    IntCounterVec, IntGauge, IntGaugeVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for cycle and request latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ScalerMetricsInner> = OnceLock::new();

struct ScalerMetricsInner {
    replicas: IntGaugeVec,
    cpu_percent: GaugeVec,
    cluster_balanced: IntGauge,
    scale_actions: IntCounterVec,
    preemptions: IntCounter,
    spikes: IntCounter,
    imbalance_corrections: IntCounter,
    recommendation_errors: IntCounter,
    scale_errors: IntCounter,
    telemetry_errors: IntCounter,
    cycle_duration_seconds: Histogram,
    recommendation_latency_seconds: Histogram,
}

impl ScalerMetricsInner {
    fn new() -> Self {
        Self {
            replicas: register_int_gauge_vec!(
                "priority_scaler_replicas",
                "Replica count per service class as last observed or written",
                &["class"]
            )
            .expect("Failed to register replicas"),

            cpu_percent: register_gauge_vec!(
                "priority_scaler_cpu_percent",
                "Aggregated CPU utilisation per service class",
                &["class"]
            )
            .expect("Failed to register cpu_percent"),

            cluster_balanced: register_int_gauge!(
                "priority_scaler_cluster_balanced",
                "1 when both classes sit at their floor with low CPU"
            )
            .expect("Failed to register cluster_balanced"),

            scale_actions: register_int_counter_vec!(
                "priority_scaler_scale_actions_total",
                "Successful scale requests per class and direction",
                &["class", "direction"]
            )
            .expect("Failed to register scale_actions"),

            preemptions: register_int_counter!(
                "priority_scaler_preemptions_total",
                "Non-critical reductions made to free budget for critical"
            )
            .expect("Failed to register preemptions"),

            spikes: register_int_counter!(
                "priority_scaler_spikes_total",
                "Critical CPU spikes detected"
            )
            .expect("Failed to register spikes"),

            imbalance_corrections: register_int_counter!(
                "priority_scaler_imbalance_corrections_total",
                "Hot pods drained and deleted to rebalance load"
            )
            .expect("Failed to register imbalance_corrections"),

            recommendation_errors: register_int_counter!(
                "priority_scaler_recommendation_errors_total",
                "Failed recommendation requests"
            )
            .expect("Failed to register recommendation_errors"),

            scale_errors: register_int_counter!(
                "priority_scaler_scale_errors_total",
                "Scale requests rejected by the control plane"
            )
            .expect("Failed to register scale_errors"),

            telemetry_errors: register_int_counter!(
                "priority_scaler_telemetry_errors_total",
                "Telemetry reads replaced by defaults"
            )
            .expect("Failed to register telemetry_errors"),

            cycle_duration_seconds: register_histogram!(
                "priority_scaler_cycle_duration_seconds",
                "Time spent in one control cycle, excluding the inter-cycle pause",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            recommendation_latency_seconds: register_histogram!(
                "priority_scaler_recommendation_latency_seconds",
                "Round-trip time of recommendation requests",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register recommendation_latency_seconds"),
        }
    }
}

/// Scaler metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ScalerMetrics {
    _private: (),
}

impl Default for ScalerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalerMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ScalerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ScalerMetricsInner {
        GLOBAL_METRICS.get_or_init(ScalerMetricsInner::new)
    }

    pub fn set_replicas(&self, class: ServiceClass, replicas: u32) {
        self.inner()
            .replicas
            .with_label_values(&[class.as_str()])
            .set(replicas as i64);
    }

    pub fn set_cpu_percent(&self, class: ServiceClass, cpu: f64) {
        self.inner()
            .cpu_percent
            .with_label_values(&[class.as_str()])
            .set(cpu);
    }

    pub fn set_balanced(&self, balanced: bool) {
        self.inner().cluster_balanced.set(balanced as i64);
    }

    /// Count a successful scale request
    pub fn inc_scale_action(&self, class: ServiceClass, direction: ScaleAction) {
        self.inner()
            .scale_actions
            .with_label_values(&[class.as_str(), direction.as_str()])
            .inc();
    }

    pub fn inc_preemptions(&self) {
        self.inner().preemptions.inc();
    }

    pub fn inc_spikes(&self) {
        self.inner().spikes.inc();
    }

    pub fn inc_imbalance_corrections(&self) {
        self.inner().imbalance_corrections.inc();
    }

    pub fn inc_recommendation_errors(&self) {
        self.inner().recommendation_errors.inc();
    }

    pub fn inc_scale_errors(&self) {
        self.inner().scale_errors.inc();
    }

    pub fn inc_telemetry_errors(&self) {
        self.inner().telemetry_errors.inc();
    }

    pub fn observe_cycle_duration(&self, duration_secs: f64) {
        self.inner().cycle_duration_seconds.observe(duration_secs);
    }

    pub fn observe_recommendation_latency(&self, duration_secs: f64) {
        self.inner()
            .recommendation_latency_seconds
            .observe(duration_secs);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn encode_text(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(buffer)
    }
}

/// Structured logger for scaler events
///
/// Provides consistent JSON-formatted logging for scaling decisions,
/// anomalies and the per-cycle cluster status.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Log a recommendation received for a class
    pub fn log_recommendation(&self, class: ServiceClass, action: ScaleAction, confidence: f32) {
        info!(
            event = "recommendation",
            instance = %self.instance,
            class = %class,
            action = %action,
            confidence = confidence,
            "Recommendation received"
        );
    }

    /// Log a failed recommendation request
    pub fn log_recommendation_failed(&self, class: ServiceClass, reason: &str) {
        warn!(
            event = "recommendation_failed",
            instance = %self.instance,
            class = %class,
            reason = %reason,
            "Recommendation unavailable, abandoning cycle"
        );
    }

    /// Log an applied scale request
    pub fn log_scale(&self, class: ServiceClass, from: u32, to: u32, reason: &str) {
        info!(
            event = "scale_applied",
            instance = %self.instance,
            class = %class,
            from = from,
            to = to,
            reason = %reason,
            "Scaled deployment"
        );
    }

    /// Log a scale request the control plane rejected
    pub fn log_scale_failed(&self, class: ServiceClass, target: u32, reason: &str) {
        warn!(
            event = "scale_failed",
            instance = %self.instance,
            class = %class,
            target = target,
            reason = %reason,
            "Scale request failed, keeping previous replica count"
        );
    }

    /// Log a step refused by the budget check
    pub fn log_budget_violation(&self, detail: &str) {
        error!(
            event = "budget_violation",
            instance = %self.instance,
            detail = %detail,
            "Refusing scale step that would break the cluster budget"
        );
    }

    /// Log a drained pod that could be neither deleted nor returned to its deployment
    pub fn log_orphaned_pod(&self, class: ServiceClass, pod_id: &str, reason: &str) {
        error!(
            event = "pod_orphaned",
            instance = %self.instance,
            class = %class,
            pod = %pod_id,
            reason = %reason,
            "Drained pod is outside its deployment selector and still running"
        );
    }

    /// Log non-critical replicas being reclaimed for critical
    pub fn log_preemption(&self, from: u32, to: u32) {
        warn!(
            event = "preemption",
            instance = %self.instance,
            noncritical_from = from,
            noncritical_to = to,
            freed = from.saturating_sub(to),
            "Preempting non-critical replicas for critical"
        );
    }

    /// Log a CPU spike detection
    pub fn log_cpu_spike(&self, current_usage: f64, baseline_usage: f64, threshold: f64) {
        warn!(
            event = "cpu_spike_detected",
            instance = %self.instance,
            class = "critical",
            current_usage = current_usage,
            baseline_usage = baseline_usage,
            threshold = threshold,
            "CPU spike detected"
        );
    }

    /// Log a load imbalance and its correction
    pub fn log_imbalance(
        &self,
        class: ServiceClass,
        pod_id: &str,
        cpu_milli: f64,
        mean_cpu_milli: f64,
        corrected: bool,
    ) {
        warn!(
            event = "load_imbalance",
            instance = %self.instance,
            class = %class,
            pod = %pod_id,
            cpu_milli = cpu_milli,
            mean_cpu_milli = mean_cpu_milli,
            corrected = corrected,
            "Load imbalance detected"
        );
    }

    /// Log a phase skipped because the cooldown has not elapsed
    pub fn log_cooldown_active(&self, class: ServiceClass, remaining_secs: u64) {
        info!(
            event = "cooldown_active",
            instance = %self.instance,
            class = %class,
            remaining_secs = remaining_secs,
            "Cooldown active, skipping phase"
        );
    }

    /// Log the per-cycle cluster status line
    pub fn log_cluster_status(
        &self,
        critical: u32,
        noncritical: u32,
        max_total: u32,
        critical_cpu: f64,
        noncritical_cpu: f64,
        balanced: bool,
    ) {
        info!(
            event = "cluster_status",
            instance = %self.instance,
            critical = critical,
            noncritical = noncritical,
            total = critical + noncritical,
            max_total = max_total,
            critical_cpu = critical_cpu,
            noncritical_cpu = noncritical_cpu,
            balanced = balanced,
            "Cluster status"
        );
    }

    /// Log scaler startup
    pub fn log_startup(&self, version: &str, max_total: u32) {
        info!(
            event = "scaler_started",
            instance = %self.instance,
            scaler_version = %version,
            max_total_pods = max_total,
            "Priority scaler started"
        );
    }

    /// Log scaler shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "scaler_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Priority scaler shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaler_metrics_creation() {
        // Global registry: every handle shares one set of metrics
        let metrics = ScalerMetrics::new();
        let other = ScalerMetrics::new();

        metrics.set_replicas(ServiceClass::Critical, 3);
        other.set_cpu_percent(ServiceClass::NonCritical, 12.5);
        metrics.inc_scale_action(ServiceClass::Critical, ScaleAction::ScaleUp);
        metrics.inc_preemptions();
        metrics.observe_cycle_duration(0.2);
        metrics.set_balanced(true);

        let text = String::from_utf8(metrics.encode_text().unwrap()).unwrap();
        assert!(text.contains("priority_scaler_replicas{class=\"critical\"}"));
        assert!(text.contains("priority_scaler_preemptions_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("scaler-0");
        assert_eq!(logger.instance(), "scaler-0");
    }
}
