//! Priority scaler CLI
//!
//! Read-only views of the cluster as the scaler sees it, and direct queries
//! against the recommendation service.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{pods, recommend, status};
use scaler_lib::collector::{ClassTargets, KubeControlPlane};
use scaler_lib::ServiceClass;

/// Priority scaler CLI
#[derive(Parser)]
#[command(name = "psctl")]
#[command(author, version, about = "CLI for the Priority Pod Scaler", long_about = None)]
pub struct Cli {
    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Namespace of the scaled deployments
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Deployment backing the critical class
    #[arg(long)]
    pub critical_deployment: Option<String>,

    /// Deployment backing the non-critical class
    #[arg(long)]
    pub noncritical_deployment: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show replicas, utilisation and budget usage per class
    Status,

    /// Show per-pod CPU and whether a hot pod would be drained
    Pods {
        /// Only inspect one class (critical or noncritical)
        #[arg(long)]
        class: Option<ServiceClass>,
    },

    /// Ask the recommendation service about a hypothetical sample
    Recommend {
        /// Recommendation service URL
        #[arg(long, env = "PSCTL_RECOMMENDER_URL")]
        recommender_url: Option<String>,

        /// Class CPU utilisation in percent
        #[arg(long)]
        cpu: f64,

        /// Class memory utilisation in percent
        #[arg(long)]
        mem: f64,

        /// Current replica count
        #[arg(long)]
        replicas: u32,

        /// Service class of the sample
        #[arg(long, default_value = "critical")]
        class: ServiceClass,

        /// Requests seen in the last few seconds
        #[arg(long, default_value_t = 0)]
        request_rate: u64,
    },
}

impl Cli {
    /// Deployment targets from flags, then the config file, then defaults
    fn targets(&self, file: &config::Config) -> ClassTargets {
        let defaults = ClassTargets::default();
        ClassTargets {
            namespace: self
                .namespace
                .clone()
                .or_else(|| file.namespace.clone())
                .unwrap_or(defaults.namespace),
            critical_deployment: self
                .critical_deployment
                .clone()
                .or_else(|| file.critical_deployment.clone())
                .unwrap_or(defaults.critical_deployment),
            noncritical_deployment: self
                .noncritical_deployment
                .clone()
                .or_else(|| file.noncritical_deployment.clone())
                .unwrap_or(defaults.noncritical_deployment),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let file_config = config::Config::load()?;
    let targets = cli.targets(&file_config);

    match &cli.command {
        Commands::Status => {
            let client = config::kube_client(cli.kubeconfig.as_deref()).await?;
            let plane = KubeControlPlane::new(client, targets);
            status::show_status(&plane, cli.format).await?;
        }
        Commands::Pods { class } => {
            let client = config::kube_client(cli.kubeconfig.as_deref()).await?;
            let plane = KubeControlPlane::new(client, targets);
            pods::show_pods(&plane, *class, cli.format).await?;
        }
        Commands::Recommend {
            recommender_url,
            cpu,
            mem,
            replicas,
            class,
            request_rate,
        } => {
            let url = recommender_url
                .clone()
                .or_else(|| file_config.recommender_url.clone())
                .unwrap_or_else(|| config::DEFAULT_RECOMMENDER_URL.to_string());
            let query = recommend::Query {
                class: *class,
                cpu_percent: *cpu,
                mem_percent: *mem,
                replicas: *replicas,
                request_rate: *request_rate,
            };
            recommend::query(&url, query, cli.format).await?;
        }
    }

    Ok(())
}
