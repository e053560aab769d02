//! Direct recommendation queries

use anyhow::{Context, Result};
use colored::Colorize;
use scaler_lib::recommender::{HttpRecommender, Recommender};
use scaler_lib::{ClassUsage, FeatureVector, Recommendation, ServiceClass, TelemetrySample};
use serde::Serialize;

use crate::output::{color_action, color_confidence, print_json, print_warning, OutputFormat};

/// Service-type code the scaler sends with every sample
const SERVICE_TYPE_CODE: u32 = 5;

/// A hypothetical class sample
#[derive(Debug, Clone, Copy)]
pub struct Query {
    pub class: ServiceClass,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub replicas: u32,
    pub request_rate: u64,
}

impl Query {
    /// Feature vector exactly as the control loop would build it
    pub fn features(&self) -> FeatureVector {
        let sample = TelemetrySample::new(
            self.class,
            ClassUsage {
                cpu_percent: self.cpu_percent.clamp(0.0, 100.0),
                mem_percent: self.mem_percent.clamp(0.0, 100.0),
            },
            self.request_rate,
            self.replicas,
        );
        FeatureVector::from_sample(&sample, SERVICE_TYPE_CODE)
    }
}

#[derive(Serialize)]
struct QueryResult<'a> {
    endpoint: &'a str,
    features: &'a FeatureVector,
    recommendation: Recommendation,
}

/// Send one sample to the recommendation service and print the answer
pub async fn query(endpoint: &str, query: Query, format: OutputFormat) -> Result<()> {
    let recommender =
        HttpRecommender::with_endpoint(endpoint).context("Invalid recommendation service URL")?;
    let features = query.features();
    let recommendation = recommender
        .recommend(&features)
        .await
        .with_context(|| {
            format!(
                "Recommendation request to {} failed",
                recommender.predict_url()
            )
        })?;

    match format {
        OutputFormat::Json => print_json(&QueryResult {
            endpoint,
            features: &features,
            recommendation,
        })?,
        OutputFormat::Table => {
            println!("{}", "Recommendation".bold());
            println!("{}", "=".repeat(40));
            println!("Class:      {}", query.class.to_string().cyan());
            println!("Features:   {:?}", features.as_slice());
            println!("Action:     {}", color_action(recommendation.action));
            println!("Confidence: {}", color_confidence(recommendation.confidence));

            if recommendation.is_low_confidence() {
                print_warning("Low confidence recommendation");
            }
        }
    }

    Ok(())
}
