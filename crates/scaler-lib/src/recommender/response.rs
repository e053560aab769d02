//! Recommendation response validation

use crate::models::{Recommendation, ScaleAction};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Confidence below which a recommendation is logged as uncertain
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Raw response body of the recommendation service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    #[serde(default)]
    pub predicted_action: Option<String>,
    /// Older services name the field `action`
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl RecommendationResponse {
    /// Validate the response into a recommendation
    ///
    /// `predicted_action` wins over `action` when both are present. A
    /// missing or unknown action is an error. Confidence is clamped to
    /// [0, 1] and defaults to 0 when absent.
    pub fn into_recommendation(self) -> Result<Recommendation> {
        let action = self
            .predicted_action
            .or(self.action)
            .ok_or_else(|| anyhow!("Response has no predicted_action"))?;
        let action: ScaleAction = action.parse().map_err(|e: String| anyhow!(e))?;

        let confidence = self
            .confidence
            .filter(|c| c.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0) as f32;

        Ok(Recommendation { action, confidence })
    }
}

impl Recommendation {
    pub fn is_low_confidence(&self) -> bool {
        self.confidence < LOW_CONFIDENCE_THRESHOLD
    }
}
