//! CPU spike detection
//!
//! Keeps a short sliding window of critical-class CPU samples and flags the
//! newest sample when it jumps well above the average of the ones before it.

use std::collections::VecDeque;

/// Default number of samples retained in the window
pub const DEFAULT_WINDOW_CAPACITY: usize = 5;

/// Minimum samples (including the newest) required for spike detection
pub const MIN_SAMPLES_FOR_DETECTION: usize = 3;

/// Default multiple of the baseline mean that counts as a spike
pub const DEFAULT_SPIKE_FACTOR: f64 = 1.4;

/// Detects sudden CPU jumps over a rolling window
#[derive(Debug, Clone)]
pub struct SpikeDetector {
    /// Multiple of the baseline mean the newest sample must exceed
    pub factor: f64,
    /// Maximum samples kept; oldest evicted first
    pub capacity: usize,
    /// Samples needed before anything is flagged
    pub min_samples: usize,
    samples: VecDeque<f64>,
}

impl SpikeDetector {
    /// Create a new spike detector with the given factor
    pub fn new(factor: f64) -> Self {
        Self {
            factor,
            capacity: DEFAULT_WINDOW_CAPACITY,
            min_samples: MIN_SAMPLES_FOR_DETECTION,
            samples: VecDeque::with_capacity(DEFAULT_WINDOW_CAPACITY + 1),
        }
    }

    /// Set custom window capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Set custom minimum sample count
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Record a CPU sample and report whether it is a spike
    pub fn observe(&mut self, cpu: f64) -> bool {
        self.record(cpu).is_some()
    }

    /// Record a CPU sample and return spike details if it is one
    ///
    /// The sample is appended before evaluation, so it always enters the
    /// window whether or not it is flagged.
    pub fn record(&mut self, cpu: f64) -> Option<SpikeAnomaly> {
        self.samples.push_back(cpu);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }

        if self.samples.len() < self.min_samples.max(2) {
            return None;
        }

        let prior = self.samples.len() - 1;
        let baseline = self.samples.iter().take(prior).sum::<f64>() / prior as f64;
        let threshold = baseline * self.factor;

        if cpu > threshold {
            Some(SpikeAnomaly {
                current_usage: cpu,
                baseline_usage: baseline,
                threshold,
            })
        } else {
            None
        }
    }

    /// Number of samples currently in the window
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean of every sample in the window
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    /// Window contents, oldest first
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}

impl Default for SpikeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_SPIKE_FACTOR)
    }
}

/// CPU spike details
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeAnomaly {
    /// Sample that triggered the spike
    pub current_usage: f64,
    /// Mean of the samples before it
    pub baseline_usage: f64,
    /// Value the sample had to exceed
    pub threshold: f64,
}

impl SpikeAnomaly {
    /// Get the percentage above the baseline
    pub fn percentage_above_baseline(&self) -> f64 {
        if self.baseline_usage < f64::EPSILON {
            return 0.0;
        }
        ((self.current_usage - self.baseline_usage) / self.baseline_usage) * 100.0
    }
}
