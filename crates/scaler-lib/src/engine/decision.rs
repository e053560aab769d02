//! Decision resolution
//!
//! Combines the external recommendation with the local spike and stress
//! signals into the action a phase acts on. Pure: the same inputs always
//! give the same resolution.

use super::ScalingLimits;
use crate::models::{ScaleAction, ServiceClass, TelemetrySample};
use std::fmt;

/// Why a resolution was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// The recommendation was taken as-is
    Recommendation,
    /// A critical CPU spike forced a scale-up
    Spike,
    /// A stable critical class was idle and above its floor
    IdleReduction,
    /// Non-critical scale-up requested while critical is stressed
    BlockedByStress,
    /// Nothing to do
    Hold,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::Recommendation => "recommendation",
            DecisionReason::Spike => "cpu_spike",
            DecisionReason::IdleReduction => "idle_reduction",
            DecisionReason::BlockedByStress => "blocked_by_critical_stress",
            DecisionReason::Hold => "hold",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved action for one class in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub action: ScaleAction,
    pub reason: DecisionReason,
}

impl Resolution {
    fn new(action: ScaleAction, reason: DecisionReason) -> Self {
        Self { action, reason }
    }
}

/// Resolve the action for `class`
///
/// Critical scales up on a scale-up recommendation or a spike, down on a
/// scale-down recommendation, and otherwise holds unless it is idle above
/// its floor. Non-critical never looks at spikes; a scale-up requested while
/// critical is stressed is marked blocked and left for the allocator to
/// refuse.
pub fn resolve(
    class: ServiceClass,
    recommendation: ScaleAction,
    stressed: bool,
    spiked: bool,
    sample: &TelemetrySample,
    limits: &ScalingLimits,
) -> Resolution {
    match class {
        ServiceClass::Critical => {
            if recommendation == ScaleAction::ScaleUp {
                Resolution::new(ScaleAction::ScaleUp, DecisionReason::Recommendation)
            } else if spiked {
                Resolution::new(ScaleAction::ScaleUp, DecisionReason::Spike)
            } else if recommendation == ScaleAction::ScaleDown {
                Resolution::new(ScaleAction::ScaleDown, DecisionReason::Recommendation)
            } else if sample.cpu_percent < limits.critical_idle_cpu
                && sample.replicas > limits.critical_floor
            {
                Resolution::new(ScaleAction::ScaleDown, DecisionReason::IdleReduction)
            } else {
                Resolution::new(ScaleAction::Stable, DecisionReason::Hold)
            }
        }
        ServiceClass::NonCritical => match recommendation {
            ScaleAction::ScaleUp if stressed => {
                Resolution::new(ScaleAction::ScaleUp, DecisionReason::BlockedByStress)
            }
            ScaleAction::ScaleUp | ScaleAction::ScaleDown => {
                Resolution::new(recommendation, DecisionReason::Recommendation)
            }
            ScaleAction::Stable => Resolution::new(ScaleAction::Stable, DecisionReason::Hold),
        },
    }
}
