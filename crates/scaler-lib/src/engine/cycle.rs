//! Control cycle
//!
//! Runs imbalance correction, gathers telemetry, then the critical and
//! non-critical phases, and finally reports cluster status. A failed
//! recommendation abandons the rest of the cycle.

use super::{
    resolve, AllocationStep, Allocator, CooldownTimer, EngineConfig, PhaseOutcome, Resolution,
};
use crate::anomaly::{ImbalanceDetector, SpikeDetector};
use crate::collector::{ClusterControlPlane, ClusterSnapshot};
use crate::error::ScalerError;
use crate::health::{components, HealthRegistry};
use crate::models::{FeatureVector, ReplicaCounts, ScaleAction, ServiceClass, TelemetrySample};
use crate::observability::{ScalerMetrics, StructuredLogger};
use crate::recommender::Recommender;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// State carried from one cycle to the next
#[derive(Debug, Clone)]
pub struct EngineState {
    pub spike: SpikeDetector,
    pub cooldown: CooldownTimer,
}

impl EngineState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            spike: SpikeDetector::new(config.spike_factor)
                .with_capacity(config.spike_window)
                .with_min_samples(config.spike_min_samples),
            cooldown: CooldownTimer::new(config.cooldown),
        }
    }
}

/// What one cycle observed and did
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Replica counts after both phases
    pub replicas: ReplicaCounts,
    pub critical_cpu: f64,
    pub noncritical_cpu: f64,
    pub stressed: bool,
    pub spiked: bool,
    pub balanced: bool,
    /// Pods drained and deleted during imbalance correction
    pub drained_pods: Vec<String>,
    /// Accepted scale requests in issue order
    pub steps: Vec<AllocationStep>,
    /// Absorbed failures: degraded telemetry, refused or failed scale requests
    pub failures: Vec<ScalerError>,
}

impl CycleReport {
    pub fn actions(&self, class: ServiceClass) -> impl Iterator<Item = &AllocationStep> {
        self.steps.iter().filter(move |s| s.class == class)
    }
}

/// The autoscaling control loop
pub struct ControlCycle {
    plane: Arc<dyn ClusterControlPlane>,
    recommender: Arc<dyn Recommender>,
    config: EngineConfig,
    allocator: Allocator,
    imbalance: ImbalanceDetector,
    state: EngineState,
    metrics: ScalerMetrics,
    logger: StructuredLogger,
    health: HealthRegistry,
}

impl ControlCycle {
    pub fn builder(
        plane: Arc<dyn ClusterControlPlane>,
        recommender: Arc<dyn Recommender>,
    ) -> ControlCycleBuilder {
        ControlCycleBuilder::new(plane, recommender)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Run cycles until `shutdown` fires
    ///
    /// Sleeps the cycle interval after a completed cycle and the shorter
    /// failure pause after an abandoned one. Shutdown is only observed
    /// between cycles.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.cycle_interval.as_secs(),
            cooldown_secs = self.config.cooldown.as_secs(),
            "Starting control loop"
        );

        loop {
            let pause = match self.run_once().await {
                Ok(report) => {
                    debug!(
                        steps = report.steps.len(),
                        failures = report.failures.len(),
                        "Cycle complete"
                    );
                    self.health.set_healthy(components::CONTROL_LOOP).await;
                    self.config.cycle_interval
                }
                Err(e) => {
                    warn!(error = %e, "Cycle abandoned");
                    self.config.failure_pause
                }
            };
            self.health.record_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.recv() => {
                    self.logger.log_shutdown("shutdown signal received");
                    break;
                }
            }
        }
    }

    /// Run a single cycle
    ///
    /// Only a recommendation failure returns an error; every other failure
    /// is absorbed and listed in the report.
    pub async fn run_once(&mut self) -> Result<CycleReport, ScalerError> {
        let started = Instant::now();
        let mut report = CycleReport::default();

        for class in ServiceClass::ALL {
            if let Some(pod) = self.correct_imbalance(class).await {
                report.drained_pods.push(pod);
            }
        }

        let snapshot = ClusterSnapshot::gather(self.plane.as_ref()).await;
        if snapshot.is_degraded() {
            for _ in &snapshot.degraded {
                self.metrics.inc_telemetry_errors();
            }
            self.health
                .set_degraded(
                    components::CONTROL_PLANE,
                    format!("{} telemetry reads failed", snapshot.degraded.len()),
                )
                .await;
        } else {
            self.health.set_healthy(components::CONTROL_PLANE).await;
        }

        let limits = self.config.limits.clone();
        let critical_cpu = snapshot.critical.cpu_percent;
        let noncritical_cpu = snapshot.noncritical.cpu_percent;
        for class in ServiceClass::ALL {
            self.metrics
                .set_cpu_percent(class, snapshot.sample(class).cpu_percent);
        }

        // Computed once; the non-critical phase reuses it after critical scaled.
        let stressed = limits.is_stressed(critical_cpu);
        let mut counts = snapshot.replicas;

        let critical = self.recommend(&snapshot.critical).await?;
        // Fed every cycle, including under cooldown and on a scale-up recommendation
        let spiked = match self.state.spike.record(critical_cpu) {
            Some(spike) => {
                self.metrics.inc_spikes();
                self.logger.log_cpu_spike(
                    spike.current_usage,
                    spike.baseline_usage,
                    spike.threshold,
                );
                true
            }
            None => false,
        };
        let resolution = resolve(
            ServiceClass::Critical,
            critical,
            stressed,
            spiked,
            &snapshot.critical,
            &limits,
        );
        if snapshot.replicas_known {
            let outcome = self
                .phase(
                    ServiceClass::Critical,
                    resolution,
                    stressed,
                    critical_cpu,
                    &mut counts,
                )
                .await;
            report.absorb(outcome);
        }

        let mut noncritical_sample = snapshot.noncritical.clone();
        noncritical_sample.replicas = counts.noncritical;
        let noncritical = self.recommend(&noncritical_sample).await?;
        let resolution = resolve(
            ServiceClass::NonCritical,
            noncritical,
            stressed,
            false,
            &noncritical_sample,
            &limits,
        );
        if snapshot.replicas_known {
            let outcome = self
                .phase(
                    ServiceClass::NonCritical,
                    resolution,
                    stressed,
                    noncritical_cpu,
                    &mut counts,
                )
                .await;
            report.absorb(outcome);
        } else {
            warn!("Replica counts unknown, skipping allocation this cycle");
        }

        let balanced = limits.is_balanced(&counts, critical_cpu, noncritical_cpu);
        self.logger.log_cluster_status(
            counts.critical,
            counts.noncritical,
            limits.max_total_pods,
            critical_cpu,
            noncritical_cpu,
            balanced,
        );
        if snapshot.replicas_known {
            for class in ServiceClass::ALL {
                self.metrics.set_replicas(class, counts.get(class));
            }
        }
        self.metrics.set_balanced(balanced);
        self.metrics
            .observe_cycle_duration(started.elapsed().as_secs_f64());

        report.failures.extend(snapshot.degraded);
        report.replicas = counts;
        report.critical_cpu = critical_cpu;
        report.noncritical_cpu = noncritical_cpu;
        report.stressed = stressed;
        report.spiked = spiked;
        report.balanced = balanced;
        Ok(report)
    }

    /// Run one class's allocation phase if the shared cooldown allows it
    async fn phase(
        &mut self,
        class: ServiceClass,
        resolution: Resolution,
        stressed: bool,
        class_cpu: f64,
        counts: &mut ReplicaCounts,
    ) -> PhaseOutcome {
        let now = Instant::now();
        if !self.state.cooldown.is_elapsed(now) {
            let remaining = self.state.cooldown.remaining(now);
            self.logger
                .log_cooldown_active(class, remaining.as_secs());
            return PhaseOutcome::default();
        }

        let outcome = match class {
            ServiceClass::Critical => {
                self.allocator
                    .critical_phase(resolution, stressed, counts)
                    .await
            }
            ServiceClass::NonCritical => {
                self.allocator
                    .noncritical_phase(resolution, stressed, class_cpu, counts)
                    .await
            }
        };

        if outcome.changed() {
            self.state.cooldown.mark(Instant::now());
        }
        outcome
    }

    /// Fetch a recommendation, mapping any failure to `RecommendationUnavailable`
    async fn recommend(&self, sample: &TelemetrySample) -> Result<ScaleAction, ScalerError> {
        let class = sample.class;
        let features = FeatureVector::from_sample(sample, self.config.service_type_code);
        let started = Instant::now();
        let result = self.recommender.recommend(&features).await;
        self.metrics
            .observe_recommendation_latency(started.elapsed().as_secs_f64());

        match result {
            Ok(recommendation) => {
                self.logger
                    .log_recommendation(class, recommendation.action, recommendation.confidence);
                self.health.set_healthy(components::RECOMMENDER).await;
                Ok(recommendation.action)
            }
            Err(e) => {
                let reason = format!("{e:#}");
                self.metrics.inc_recommendation_errors();
                self.logger.log_recommendation_failed(class, &reason);
                self.health
                    .set_degraded(components::RECOMMENDER, reason.clone())
                    .await;
                Err(ScalerError::RecommendationUnavailable { class, reason })
            }
        }
    }

    /// Drain and delete one hot pod of `class`, if any
    ///
    /// Returns the corrected pod. Failures are logged and the cycle goes on.
    async fn correct_imbalance(&self, class: ServiceClass) -> Option<String> {
        let pods = match self.plane.per_pod_cpu(class).await {
            Ok(pods) => pods,
            Err(e) => {
                self.metrics.inc_telemetry_errors();
                debug!(class = %class, error = %e, "Skipping imbalance check");
                return None;
            }
        };

        let hot = self.imbalance.check(&pods)?;

        if let Err(e) = self.plane.label_for_draining(class, &hot.pod_id).await {
            warn!(class = %class, pod = %hot.pod_id, error = %e, "Failed to drain hot pod");
            self.logger
                .log_imbalance(class, &hot.pod_id, hot.cpu_milli, hot.mean_cpu_milli, false);
            return None;
        }

        if !self.config.drain_grace.is_zero() {
            tokio::time::sleep(self.config.drain_grace).await;
        }

        if let Err(e) = self
            .plane
            .delete_pod(&hot.pod_id, self.config.delete_grace)
            .await
        {
            warn!(class = %class, pod = %hot.pod_id, error = %e, "Failed to delete hot pod");
            self.logger
                .log_imbalance(class, &hot.pod_id, hot.cpu_milli, hot.mean_cpu_milli, false);
            if let Err(e) = self.plane.restore_label(class, &hot.pod_id).await {
                self.logger.log_orphaned_pod(class, &hot.pod_id, &e.to_string());
            }
            return None;
        }

        self.metrics.inc_imbalance_corrections();
        self.logger
            .log_imbalance(class, &hot.pod_id, hot.cpu_milli, hot.mean_cpu_milli, true);
        Some(hot.pod_id)
    }
}

impl CycleReport {
    fn absorb(&mut self, outcome: PhaseOutcome) {
        self.steps.extend(outcome.steps);
        self.failures.extend(outcome.failures);
    }
}

/// Builder for [`ControlCycle`]
pub struct ControlCycleBuilder {
    plane: Arc<dyn ClusterControlPlane>,
    recommender: Arc<dyn Recommender>,
    config: EngineConfig,
    metrics: Option<ScalerMetrics>,
    logger: Option<StructuredLogger>,
    health: Option<HealthRegistry>,
}

impl ControlCycleBuilder {
    pub fn new(plane: Arc<dyn ClusterControlPlane>, recommender: Arc<dyn Recommender>) -> Self {
        Self {
            plane,
            recommender,
            config: EngineConfig::default(),
            metrics: None,
            logger: None,
            health: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn metrics(mut self, metrics: ScalerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Validate the configuration and build the cycle
    pub fn build(self) -> Result<ControlCycle, ScalerError> {
        self.config.validate()?;

        let metrics = self.metrics.unwrap_or_default();
        let logger = self
            .logger
            .unwrap_or_else(|| StructuredLogger::new("priority-scaler"));
        let allocator = Allocator::new(
            self.plane.clone(),
            self.config.clone(),
            metrics.clone(),
            logger.clone(),
        );

        Ok(ControlCycle {
            plane: self.plane,
            recommender: self.recommender,
            imbalance: ImbalanceDetector::new(
                self.config.imbalance_ratio,
                self.config.imbalance_min_cpu,
            ),
            state: EngineState::new(&self.config),
            allocator,
            config: self.config,
            metrics,
            logger,
            health: self.health.unwrap_or_default(),
        })
    }
}
