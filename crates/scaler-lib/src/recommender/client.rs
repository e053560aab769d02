//! HTTP client for the recommendation service

use super::{RecommendationResponse, Recommender};
use crate::models::{FeatureVector, Recommendation};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default recommendation request timeout
pub const DEFAULT_RECOMMENDATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the recommendation client
#[derive(Debug, Clone)]
pub struct RecommenderConfig {
    /// Service base URL (e.g., "http://recommender:8000")
    pub endpoint: String,
    /// Path of the prediction route, relative to the endpoint
    pub predict_path: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://recommender:8000".to_string(),
            predict_path: "predict".to_string(),
            timeout: DEFAULT_RECOMMENDATION_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    features: &'a [f64],
}

/// Recommendation service client over HTTP/JSON
pub struct HttpRecommender {
    client: Client,
    predict_url: Url,
}

impl HttpRecommender {
    /// Create a new client
    pub fn new(config: RecommenderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let mut base = Url::parse(&config.endpoint).context("Invalid recommender URL")?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let predict_url = base
            .join(&config.predict_path)
            .context("Invalid predict path")?;

        Ok(Self {
            client,
            predict_url,
        })
    }

    /// Create a client for an endpoint with default settings
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        Self::new(RecommenderConfig {
            endpoint: endpoint.into(),
            ..RecommenderConfig::default()
        })
    }

    pub fn predict_url(&self) -> &Url {
        &self.predict_url
    }
}

#[async_trait]
impl Recommender for HttpRecommender {
    async fn recommend(&self, features: &FeatureVector) -> Result<Recommendation> {
        let body = PredictRequest {
            features: features.as_slice(),
        };

        let response = self
            .client
            .post(self.predict_url.clone())
            .json(&body)
            .send()
            .await
            .context("Failed to send recommendation request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Recommender error ({}): {}", status, body);
        }

        let text = response
            .text()
            .await
            .context("Failed to read recommendation response")?;
        debug!(response = %text, "Raw recommendation response");

        let parsed: RecommendationResponse =
            serde_json::from_str(&text).context("Failed to parse recommendation response")?;
        parsed.into_recommendation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScaleAction;
    use mockito::Matcher;

    fn features() -> FeatureVector {
        FeatureVector([75.0, 20.0, 87.5, 0.0, 12.0, 2.0, 52.25, 5.0, 0.0])
    }

    #[test]
    fn test_predict_url_joins_path() {
        let client = HttpRecommender::with_endpoint("http://localhost:8000/api").unwrap();
        assert_eq!(client.predict_url().as_str(), "http://localhost:8000/api/predict");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        assert!(HttpRecommender::with_endpoint("not a url").is_err());
    }

    #[tokio::test]
    async fn test_recommend_posts_features() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict")
            .match_body(Matcher::PartialJsonString(
                r#"{"features": [75.0, 20.0, 87.5, 0.0, 12.0, 2.0, 52.25, 5.0, 0.0]}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"predicted_action": "scale_up", "confidence": 0.87}"#)
            .create_async()
            .await;

        let client = HttpRecommender::with_endpoint(server.url()).unwrap();
        let rec = client.recommend(&features()).await.unwrap();

        assert_eq!(rec.action, ScaleAction::ScaleUp);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_recommend_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/predict")
            .with_status(500)
            .with_body("model not loaded")
            .create_async()
            .await;

        let client = HttpRecommender::with_endpoint(server.url()).unwrap();
        let err = client.recommend(&features()).await.unwrap_err();

        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_recommend_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/predict")
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let client = HttpRecommender::with_endpoint(server.url()).unwrap();
        assert!(client.recommend(&features()).await.is_err());
    }
}
