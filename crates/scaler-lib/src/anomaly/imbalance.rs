//! Per-pod load imbalance detection
//!
//! Flags a single pod whose CPU is both high in absolute terms and a large
//! multiple of its class average. Correcting the imbalance (draining and
//! deleting the pod) is left to the caller.

use crate::models::PodSample;

/// Default hot-pod to class-average ratio that counts as imbalance
pub const DEFAULT_IMBALANCE_RATIO: f64 = 3.0;

/// Default minimum hot-pod CPU in millicores
pub const DEFAULT_IMBALANCE_MIN_CPU: f64 = 50.0;

/// Detects one overloaded pod within a class
#[derive(Debug, Clone, Copy)]
pub struct ImbalanceDetector {
    pub ratio: f64,
    pub min_cpu: f64,
}

impl ImbalanceDetector {
    pub fn new(ratio: f64, min_cpu: f64) -> Self {
        Self { ratio, min_cpu }
    }

    /// Return the hot pod if the samples are imbalanced
    ///
    /// Needs at least two pods. Ties for the hottest pod resolve to the first.
    pub fn check(&self, pods: &[PodSample]) -> Option<HotPod> {
        if pods.len() < 2 {
            return None;
        }

        let mean = pods.iter().map(|p| p.cpu_milli).sum::<f64>() / pods.len() as f64;

        let mut hottest = &pods[0];
        for pod in &pods[1..] {
            if pod.cpu_milli > hottest.cpu_milli {
                hottest = pod;
            }
        }

        if hottest.cpu_milli < self.min_cpu || mean <= 0.0 {
            return None;
        }

        let ratio = hottest.cpu_milli / mean;
        if ratio >= self.ratio {
            Some(HotPod {
                pod_id: hottest.pod_id.clone(),
                cpu_milli: hottest.cpu_milli,
                mean_cpu_milli: mean,
                ratio,
            })
        } else {
            None
        }
    }
}

impl Default for ImbalanceDetector {
    fn default() -> Self {
        Self::new(DEFAULT_IMBALANCE_RATIO, DEFAULT_IMBALANCE_MIN_CPU)
    }
}

/// An overloaded pod selected for draining
#[derive(Debug, Clone, PartialEq)]
pub struct HotPod {
    pub pod_id: String,
    pub cpu_milli: f64,
    pub mean_cpu_milli: f64,
    pub ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pods(values: &[(&str, f64)]) -> Vec<PodSample> {
        values
            .iter()
            .map(|(id, cpu)| PodSample::new(*id, *cpu))
            .collect()
    }

    #[test]
    fn test_single_pod_never_imbalanced() {
        let detector = ImbalanceDetector::default();
        assert!(detector.check(&pods(&[("a", 500.0)])).is_none());
        assert!(detector.check(&[]).is_none());
    }

    #[test]
    fn test_two_pods_below_ratio() {
        let detector = ImbalanceDetector::default();

        // avg 35, ratio 1.71
        assert!(detector.check(&pods(&[("a", 60.0), ("b", 10.0)])).is_none());
        // avg 50, ratio 1.8
        assert!(detector.check(&pods(&[("a", 90.0), ("b", 10.0)])).is_none());
    }

    #[test]
    fn test_three_pods_below_ratio() {
        let detector = ImbalanceDetector::default();

        // avg 33.3, ratio 2.7
        assert!(detector
            .check(&pods(&[("a", 90.0), ("b", 5.0), ("c", 5.0)]))
            .is_none());
    }

    #[test]
    fn test_four_pods_triggers_correction() {
        let detector = ImbalanceDetector::default();

        let hot = detector
            .check(&pods(&[("a", 90.0), ("b", 5.0), ("c", 5.0), ("d", 5.0)]))
            .expect("imbalance expected");

        assert_eq!(hot.pod_id, "a");
        assert_eq!(hot.cpu_milli, 90.0);
        assert!((hot.mean_cpu_milli - 26.25).abs() < 1e-9);
        assert!(hot.ratio > 3.4);
    }

    #[test]
    fn test_hot_pod_below_min_cpu() {
        let detector = ImbalanceDetector::default();

        // Ratio 3.43 but the hot pod only uses 45m
        assert!(detector
            .check(&pods(&[("a", 45.0), ("b", 2.5), ("c", 2.5), ("d", 2.5)]))
            .is_none());
    }

    #[test]
    fn test_idle_class_not_flagged() {
        let detector = ImbalanceDetector::default();
        assert!(detector.check(&pods(&[("a", 0.0), ("b", 0.0)])).is_none());
    }

    #[test]
    fn test_hot_pod_is_not_first() {
        let detector = ImbalanceDetector::default();

        let hot = detector
            .check(&pods(&[("a", 5.0), ("b", 5.0), ("c", 120.0), ("d", 5.0)]))
            .expect("imbalance expected");
        assert_eq!(hot.pod_id, "c");
    }
}
