//! Anomaly detection for scaling decisions
//!
//! This module provides detection for:
//! - CPU spikes (latest critical sample jumping above its recent average)
//! - Load imbalance (one pod carrying a disproportionate share of class CPU)

mod imbalance;
mod spike_detector;

pub use imbalance::{HotPod, ImbalanceDetector, DEFAULT_IMBALANCE_MIN_CPU, DEFAULT_IMBALANCE_RATIO};
pub use spike_detector::{
    SpikeAnomaly, SpikeDetector, DEFAULT_SPIKE_FACTOR, DEFAULT_WINDOW_CAPACITY,
    MIN_SAMPLES_FOR_DETECTION,
};
