//! Recommendation service access
//!
//! The recommendation service is a black box mapping a feature vector to a
//! scaling action and a confidence. The engine only depends on the
//! [`Recommender`] trait; [`HttpRecommender`] is the production client.

mod client;
mod response;

pub use client::{HttpRecommender, RecommenderConfig, DEFAULT_RECOMMENDATION_TIMEOUT};
pub use response::{RecommendationResponse, LOW_CONFIDENCE_THRESHOLD};

use crate::models::{FeatureVector, Recommendation};
use anyhow::Result;
use async_trait::async_trait;

/// Trait for recommendation sources
#[async_trait]
pub trait Recommender: Send + Sync {
    /// Get the recommended action for a feature vector
    async fn recommend(&self, features: &FeatureVector) -> Result<Recommendation>;
}
