//! Autoscaling decision-and-allocation engine
//!
//! One control cycle runs imbalance correction, then the critical phase,
//! then the non-critical phase, then reports cluster status. The spike
//! window and the shared cooldown timer are the only state carried from one
//! cycle to the next; both live in [`EngineState`].

mod allocator;
mod config;
mod cooldown;
mod cycle;
mod decision;

pub use allocator::{AllocationStep, Allocator, ClusterBudget, PhaseOutcome, StepReason};
pub use config::{EngineConfig, ScalingLimits};
pub use cooldown::CooldownTimer;
pub use cycle::{ControlCycle, ControlCycleBuilder, CycleReport, EngineState};
pub use decision::{resolve, DecisionReason, Resolution};
