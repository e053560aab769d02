//! Budget-respecting replica allocation
//!
//! The allocator turns a resolved action into concrete scale requests. Each
//! request is checked against [`ClusterBudget`] before it is issued, and the
//! tracked replica counts only advance when the control plane accepts it.

use super::{DecisionReason, EngineConfig, Resolution, ScalingLimits};
use crate::collector::ClusterControlPlane;
use crate::error::ScalerError;
use crate::models::{ReplicaCounts, ScaleAction, ServiceClass};
use crate::observability::{ScalerMetrics, StructuredLogger};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Why a single scale request was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepReason {
    /// Followed the recommendation by one replica
    Recommendation,
    /// Critical CPU spike
    Spike,
    /// Critical idle above its floor
    IdleReduction,
    /// Non-critical reduced to make room for critical
    Preemption,
    /// Critical raised to fill the budget while stressed
    StressFill,
    /// Non-critical brought back up to its floor
    RestoreFloor,
    /// Non-critical grown back toward its ceiling
    Recovery,
    /// Non-critical idle above its floor
    IdleTrim,
}

impl StepReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepReason::Recommendation => "recommendation",
            StepReason::Spike => "cpu_spike",
            StepReason::IdleReduction => "idle_reduction",
            StepReason::Preemption => "preemption",
            StepReason::StressFill => "stress_fill",
            StepReason::RestoreFloor => "restore_floor",
            StepReason::Recovery => "recovery",
            StepReason::IdleTrim => "idle_trim",
        }
    }
}

impl fmt::Display for StepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scale request the control plane accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationStep {
    pub class: ServiceClass,
    pub from: u32,
    pub to: u32,
    pub reason: StepReason,
}

impl AllocationStep {
    pub fn direction(&self) -> ScaleAction {
        if self.to > self.from {
            ScaleAction::ScaleUp
        } else if self.to < self.from {
            ScaleAction::ScaleDown
        } else {
            ScaleAction::Stable
        }
    }
}

/// Result of one allocation phase
#[derive(Debug, Default)]
pub struct PhaseOutcome {
    /// Accepted requests, in issue order
    pub steps: Vec<AllocationStep>,
    /// Requests that were refused by the budget check or the control plane
    pub failures: Vec<ScalerError>,
}

impl PhaseOutcome {
    /// True if at least one request changed the cluster
    pub fn changed(&self) -> bool {
        !self.steps.is_empty()
    }
}

/// Validates scale targets against the class bounds and the pod budget
#[derive(Debug, Clone)]
pub struct ClusterBudget {
    limits: ScalingLimits,
}

impl ClusterBudget {
    pub fn new(limits: ScalingLimits) -> Self {
        Self { limits }
    }

    /// Check that moving `class` to `target` keeps the cluster within bounds
    ///
    /// Increases must stay under the class ceiling and keep the total within
    /// the budget. Decreases must not go below the class floor; they are
    /// allowed even when the cluster is currently over budget.
    pub fn check_step(
        &self,
        counts: &ReplicaCounts,
        class: ServiceClass,
        target: u32,
    ) -> Result<(), ScalerError> {
        let current = counts.get(class);
        let after = counts.with(class, target);

        let ok = if target > current {
            target <= self.limits.ceiling(class) && after.total() <= self.limits.max_total_pods
        } else if target < current {
            target >= self.limits.floor(class)
        } else {
            true
        };

        if ok {
            Ok(())
        } else {
            Err(ScalerError::BudgetViolation {
                class,
                target,
                critical: counts.critical,
                noncritical: counts.noncritical,
                max_total: self.limits.max_total_pods,
            })
        }
    }
}

/// Issues scale requests for the critical and non-critical phases
pub struct Allocator {
    plane: Arc<dyn ClusterControlPlane>,
    config: EngineConfig,
    budget: ClusterBudget,
    metrics: ScalerMetrics,
    logger: StructuredLogger,
}

impl Allocator {
    pub fn new(
        plane: Arc<dyn ClusterControlPlane>,
        config: EngineConfig,
        metrics: ScalerMetrics,
        logger: StructuredLogger,
    ) -> Self {
        let budget = ClusterBudget::new(config.limits.clone());
        Self {
            plane,
            config,
            budget,
            metrics,
            logger,
        }
    }

    pub fn budget(&self) -> &ClusterBudget {
        &self.budget
    }

    /// Critical phase
    ///
    /// The caller is responsible for the cooldown precondition and for
    /// resetting the cooldown when the outcome changed the cluster.
    pub async fn critical_phase(
        &self,
        resolution: Resolution,
        stressed: bool,
        counts: &mut ReplicaCounts,
    ) -> PhaseOutcome {
        let limits = &self.config.limits;
        let mut outcome = PhaseOutcome::default();

        match resolution.action {
            ScaleAction::ScaleUp if stressed => {
                let floor = limits.noncritical_floor;
                if counts.noncritical > floor {
                    self.preempt(counts, floor, &mut outcome).await;
                }

                let target = limits
                    .stressed_critical_target()
                    .min(limits.max_total_pods.saturating_sub(counts.noncritical));
                if target > counts.critical {
                    self.apply(
                        counts,
                        ServiceClass::Critical,
                        target,
                        StepReason::StressFill,
                        &mut outcome,
                    )
                    .await;
                }
            }
            ScaleAction::ScaleUp => {
                let reason = match resolution.reason {
                    DecisionReason::Spike => StepReason::Spike,
                    _ => StepReason::Recommendation,
                };
                let target = counts.critical + 1;

                if counts.critical >= limits.critical_ceiling {
                    debug!(replicas = counts.critical, "Critical already at its ceiling");
                } else if counts.total() < limits.max_total_pods {
                    self.apply(counts, ServiceClass::Critical, target, reason, &mut outcome)
                        .await;
                } else if counts.noncritical > limits.noncritical_floor {
                    let preempt_to = counts.noncritical - 1;
                    let freed = self.preempt(counts, preempt_to, &mut outcome).await;
                    if freed {
                        self.apply(counts, ServiceClass::Critical, target, reason, &mut outcome)
                            .await;
                    }
                } else {
                    debug!(
                        critical = counts.critical,
                        noncritical = counts.noncritical,
                        "Budget exhausted with non-critical at its floor"
                    );
                }
            }
            ScaleAction::ScaleDown => {
                if counts.critical > limits.critical_floor {
                    let target = counts.critical - 1;
                    let reason = match resolution.reason {
                        DecisionReason::IdleReduction => StepReason::IdleReduction,
                        _ => StepReason::Recommendation,
                    };
                    self.apply(
                        counts,
                        ServiceClass::Critical,
                        target,
                        reason,
                        &mut outcome,
                    )
                    .await;
                }
            }
            ScaleAction::Stable => {}
        }

        outcome
    }

    /// Non-critical phase
    ///
    /// `stressed` is the value computed at the start of the cycle, before the
    /// critical phase ran.
    pub async fn noncritical_phase(
        &self,
        resolution: Resolution,
        stressed: bool,
        noncritical_cpu: f64,
        counts: &mut ReplicaCounts,
    ) -> PhaseOutcome {
        let limits = &self.config.limits;
        let class = ServiceClass::NonCritical;
        let mut outcome = PhaseOutcome::default();

        match resolution.action {
            ScaleAction::ScaleUp => {
                if stressed || resolution.reason == DecisionReason::BlockedByStress {
                    debug!("Non-critical scale-up blocked while critical is stressed");
                } else if counts.noncritical < limits.noncritical_safe_ceiling
                    && counts.total() < limits.max_total_pods
                {
                    let target = counts.noncritical + 1;
                    self.apply(
                        counts,
                        class,
                        target,
                        StepReason::Recommendation,
                        &mut outcome,
                    )
                    .await;
                } else {
                    debug!(
                        replicas = counts.noncritical,
                        total = counts.total(),
                        "Non-critical at its ceiling or cluster full"
                    );
                }
            }
            ScaleAction::ScaleDown => {
                if counts.noncritical > limits.noncritical_floor {
                    let target = counts.noncritical - 1;
                    self.apply(
                        counts,
                        class,
                        target,
                        StepReason::Recommendation,
                        &mut outcome,
                    )
                    .await;
                }
            }
            ScaleAction::Stable => {
                if !stressed {
                    if counts.noncritical < limits.noncritical_floor {
                        self.apply(
                            counts,
                            class,
                            limits.noncritical_floor,
                            StepReason::RestoreFloor,
                            &mut outcome,
                        )
                        .await;
                    } else if counts.noncritical < limits.noncritical_safe_ceiling
                        && counts.total() < limits.max_total_pods
                    {
                        let target = counts.noncritical + 1;
                        self.apply(
                            counts,
                            class,
                            target,
                            StepReason::Recovery,
                            &mut outcome,
                        )
                        .await;
                    }
                }

                // Evaluated after recovery on the updated count, so both can fire.
                if noncritical_cpu < limits.noncritical_idle_cpu
                    && counts.noncritical > limits.noncritical_floor
                {
                    let target = counts.noncritical - 1;
                    self.apply(
                        counts,
                        class,
                        target,
                        StepReason::IdleTrim,
                        &mut outcome,
                    )
                    .await;
                }
            }
        }

        outcome
    }

    /// Reduce non-critical to `target` to free room for critical, then wait
    /// for the freed pods to settle. Returns true if the reduction was applied.
    async fn preempt(
        &self,
        counts: &mut ReplicaCounts,
        target: u32,
        outcome: &mut PhaseOutcome,
    ) -> bool {
        let from = counts.noncritical;
        let applied = self
            .apply(
                counts,
                ServiceClass::NonCritical,
                target,
                StepReason::Preemption,
                outcome,
            )
            .await;

        if applied {
            self.metrics.inc_preemptions();
            self.logger.log_preemption(from, target);
            if !self.config.preemption_settle.is_zero() {
                tokio::time::sleep(self.config.preemption_settle).await;
            }
        }
        applied
    }

    /// Validate and issue one scale request
    ///
    /// `counts` only advances when the request is accepted.
    async fn apply(
        &self,
        counts: &mut ReplicaCounts,
        class: ServiceClass,
        target: u32,
        reason: StepReason,
        outcome: &mut PhaseOutcome,
    ) -> bool {
        let from = counts.get(class);

        if let Err(violation) = self.budget.check_step(counts, class, target) {
            self.logger.log_budget_violation(&violation.to_string());
            outcome.failures.push(violation);
            return false;
        }

        match self.plane.scale(class, target).await {
            Ok(()) => {
                counts.set(class, target);
                let step = AllocationStep {
                    class,
                    from,
                    to: target,
                    reason,
                };
                self.metrics.inc_scale_action(class, step.direction());
                self.metrics.set_replicas(class, target);
                self.logger.log_scale(class, from, target, reason.as_str());
                outcome.steps.push(step);
                true
            }
            Err(e) => {
                let reason = format!("{e:#}");
                self.metrics.inc_scale_errors();
                self.logger.log_scale_failed(class, target, &reason);
                outcome.failures.push(ScalerError::ScaleCommand {
                    class,
                    target,
                    reason,
                });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockControlPlane;
    use std::time::Duration;

    fn config() -> EngineConfig {
        EngineConfig {
            preemption_settle: Duration::ZERO,
            ..EngineConfig::default()
        }
    }

    fn allocator(plane: Arc<MockControlPlane>) -> Allocator {
        Allocator::new(
            plane,
            config(),
            ScalerMetrics::new(),
            StructuredLogger::new("test"),
        )
    }

    fn up(reason: DecisionReason) -> Resolution {
        Resolution {
            action: ScaleAction::ScaleUp,
            reason,
        }
    }

    fn stable() -> Resolution {
        Resolution {
            action: ScaleAction::Stable,
            reason: DecisionReason::Hold,
        }
    }

    #[test]
    fn test_budget_rejects_increase_past_total() {
        let budget = ClusterBudget::new(ScalingLimits::default());
        let counts = ReplicaCounts::new(5, 3);

        assert!(budget
            .check_step(&counts, ServiceClass::Critical, 6)
            .is_err());
        assert!(budget.check_step(&counts, ServiceClass::Critical, 4).is_ok());
    }

    #[test]
    fn test_budget_rejects_below_floor_and_above_ceiling() {
        let budget = ClusterBudget::new(ScalingLimits::default());
        let counts = ReplicaCounts::new(2, 1);

        assert!(budget.check_step(&counts, ServiceClass::Critical, 1).is_err());
        assert!(budget
            .check_step(&counts, ServiceClass::NonCritical, 0)
            .is_err());
        assert!(budget
            .check_step(&counts, ServiceClass::NonCritical, 4)
            .is_err());
    }

    #[test]
    fn test_budget_allows_scale_down_when_overfull() {
        let budget = ClusterBudget::new(ScalingLimits::default());
        let counts = ReplicaCounts::new(7, 3);

        assert!(budget
            .check_step(&counts, ServiceClass::NonCritical, 2)
            .is_ok());
    }

    #[tokio::test]
    async fn test_stressed_scale_up_preempts_then_fills() {
        let plane = Arc::new(MockControlPlane::new(2, 3));
        let alloc = allocator(plane.clone());
        let mut counts = ReplicaCounts::new(2, 3);

        let outcome = alloc
            .critical_phase(up(DecisionReason::Recommendation), true, &mut counts)
            .await;

        assert_eq!(counts, ReplicaCounts::new(7, 1));
        assert_eq!(outcome.steps.len(), 2);
        assert_eq!(outcome.steps[0].reason, StepReason::Preemption);
        assert_eq!(outcome.steps[1].reason, StepReason::StressFill);
        assert_eq!(
            plane.scale_calls(),
            vec![(ServiceClass::NonCritical, 1), (ServiceClass::Critical, 7)]
        );
    }

    #[tokio::test]
    async fn test_unstressed_scale_up_with_room() {
        let plane = Arc::new(MockControlPlane::new(3, 2));
        let alloc = allocator(plane.clone());
        let mut counts = ReplicaCounts::new(3, 2);

        let outcome = alloc
            .critical_phase(up(DecisionReason::Spike), false, &mut counts)
            .await;

        assert_eq!(counts, ReplicaCounts::new(4, 2));
        assert_eq!(outcome.steps[0].reason, StepReason::Spike);
    }

    #[tokio::test]
    async fn test_unstressed_scale_up_preempts_one_when_full() {
        let plane = Arc::new(MockControlPlane::new(5, 3));
        let alloc = allocator(plane.clone());
        let mut counts = ReplicaCounts::new(5, 3);

        alloc
            .critical_phase(up(DecisionReason::Recommendation), false, &mut counts)
            .await;

        assert_eq!(counts, ReplicaCounts::new(6, 2));
        assert_eq!(
            plane.scale_calls(),
            vec![(ServiceClass::NonCritical, 2), (ServiceClass::Critical, 6)]
        );
    }

    #[tokio::test]
    async fn test_unstressed_scale_up_noop_at_floors() {
        let plane = Arc::new(MockControlPlane::new(7, 1));
        let alloc = allocator(plane.clone());
        let mut counts = ReplicaCounts::new(7, 1);

        let outcome = alloc
            .critical_phase(up(DecisionReason::Recommendation), false, &mut counts)
            .await;

        assert!(!outcome.changed());
        assert!(plane.scale_calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_preemption_does_not_raise_critical() {
        let plane = Arc::new(MockControlPlane::new(5, 3));
        plane.fail_scale_for(ServiceClass::NonCritical);
        let alloc = allocator(plane.clone());
        let mut counts = ReplicaCounts::new(5, 3);

        let outcome = alloc
            .critical_phase(up(DecisionReason::Recommendation), false, &mut counts)
            .await;

        assert_eq!(counts, ReplicaCounts::new(5, 3));
        assert!(!outcome.changed());
        assert_eq!(outcome.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_scale_failure_leaves_counts() {
        let plane = Arc::new(MockControlPlane::new(4, 1));
        plane.fail_scale_for(ServiceClass::Critical);
        let alloc = allocator(plane.clone());
        let mut counts = ReplicaCounts::new(4, 1);

        let outcome = alloc
            .critical_phase(
                Resolution {
                    action: ScaleAction::ScaleDown,
                    reason: DecisionReason::Recommendation,
                },
                false,
                &mut counts,
            )
            .await;

        assert_eq!(counts.critical, 4);
        assert!(matches!(
            outcome.failures[0],
            ScalerError::ScaleCommand { target: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_noncritical_scale_up_blocked_by_stress() {
        let plane = Arc::new(MockControlPlane::new(2, 1));
        let alloc = allocator(plane.clone());
        let mut counts = ReplicaCounts::new(2, 1);

        let outcome = alloc
            .noncritical_phase(
                up(DecisionReason::BlockedByStress),
                true,
                50.0,
                &mut counts,
            )
            .await;

        assert!(!outcome.changed());
        assert!(plane.scale_calls().is_empty());
    }

    #[tokio::test]
    async fn test_noncritical_restores_floor() {
        let plane = Arc::new(MockControlPlane::new(3, 0));
        let alloc = allocator(plane.clone());
        let mut counts = ReplicaCounts::new(3, 0);

        alloc
            .noncritical_phase(stable(), false, 50.0, &mut counts)
            .await;

        assert_eq!(counts.noncritical, 1);
    }

    #[tokio::test]
    async fn test_recovery_then_idle_trim_in_one_pass() {
        let plane = Arc::new(MockControlPlane::new(2, 1));
        let alloc = allocator(plane.clone());
        let mut counts = ReplicaCounts::new(2, 1);

        let outcome = alloc
            .noncritical_phase(stable(), false, 10.0, &mut counts)
            .await;

        assert_eq!(counts.noncritical, 1);
        let reasons: Vec<_> = outcome.steps.iter().map(|s| s.reason).collect();
        assert_eq!(reasons, vec![StepReason::Recovery, StepReason::IdleTrim]);
        assert_eq!(
            plane.scale_calls(),
            vec![(ServiceClass::NonCritical, 2), (ServiceClass::NonCritical, 1)]
        );
    }

    #[tokio::test]
    async fn test_idle_trim_applies_while_stressed() {
        let plane = Arc::new(MockControlPlane::new(2, 3));
        let alloc = allocator(plane.clone());
        let mut counts = ReplicaCounts::new(2, 3);

        alloc
            .noncritical_phase(stable(), true, 5.0, &mut counts)
            .await;

        assert_eq!(counts.noncritical, 2);
    }
}
