//! Shared cooldown between scaling actions

use std::time::{Duration, Instant};

/// Single timer gating every scaling action, across both classes
#[derive(Debug, Clone)]
pub struct CooldownTimer {
    period: Duration,
    last_scaled: Option<Instant>,
}

impl CooldownTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_scaled: None,
        }
    }

    /// True when no action has happened yet or the period has passed
    pub fn is_elapsed(&self, now: Instant) -> bool {
        self.remaining(now).is_zero()
    }

    /// Time left until the next action is allowed
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_scaled {
            None => Duration::ZERO,
            Some(last) => self
                .period
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }

    /// Record a successful scaling action
    pub fn mark(&mut self, now: Instant) {
        self.last_scaled = Some(now);
    }

    pub fn last_scaled(&self) -> Option<Instant> {
        self.last_scaled
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
