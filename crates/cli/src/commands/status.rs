//! Cluster status command

use anyhow::Result;
use colored::Colorize;
use scaler_lib::collector::{ClusterControlPlane, ClusterSnapshot, KubeControlPlane};
use scaler_lib::engine::ScalingLimits;
use scaler_lib::ServiceClass;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{
    color_cpu, format_flag, format_percent, print_json, print_warning, OutputFormat,
};

/// Per-class status
#[derive(Debug, Serialize)]
pub struct ClassStatus {
    pub class: ServiceClass,
    pub replicas: u32,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub floor: u32,
    pub ceiling: u32,
}

/// Cluster status as the scaler would see it at the start of a cycle
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub classes: Vec<ClassStatus>,
    pub total: u32,
    pub max_total_pods: u32,
    pub stressed: bool,
    pub balanced: bool,
    /// Reads that failed and were reported as zero
    pub degraded: Vec<String>,
}

#[derive(Tabled)]
struct ClassRow {
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Deployment")]
    deployment: String,
    #[tabled(rename = "Replicas")]
    replicas: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
}

/// Gather a status report through any control plane
pub async fn build_status(plane: &dyn ClusterControlPlane, limits: &ScalingLimits) -> StatusReport {
    let snapshot = ClusterSnapshot::gather(plane).await;
    let critical_cpu = snapshot.critical.cpu_percent;
    let noncritical_cpu = snapshot.noncritical.cpu_percent;

    let classes = ServiceClass::ALL
        .iter()
        .map(|&class| {
            let sample = snapshot.sample(class);
            ClassStatus {
                class,
                replicas: snapshot.replicas.get(class),
                cpu_percent: sample.cpu_percent,
                mem_percent: sample.mem_percent,
                floor: limits.floor(class),
                ceiling: limits.ceiling(class),
            }
        })
        .collect();

    StatusReport {
        classes,
        total: snapshot.replicas.total(),
        max_total_pods: limits.max_total_pods,
        stressed: limits.is_stressed(critical_cpu),
        balanced: limits.is_balanced(&snapshot.replicas, critical_cpu, noncritical_cpu),
        degraded: snapshot.degraded.iter().map(|e| e.to_string()).collect(),
    }
}

/// Show cluster status
pub async fn show_status(plane: &KubeControlPlane, format: OutputFormat) -> Result<()> {
    let limits = ScalingLimits::default();
    let report = build_status(plane, &limits).await;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let targets = plane.targets();
            println!("{}", "Cluster Status".bold());
            println!("{}", "=".repeat(60));
            println!("Namespace: {}", targets.namespace.cyan());
            println!();

            let rows: Vec<ClassRow> = report
                .classes
                .iter()
                .map(|c| ClassRow {
                    class: c.class.to_string(),
                    deployment: targets.deployment(c.class).to_string(),
                    replicas: format!("{} ({}-{})", c.replicas, c.floor, c.ceiling),
                    cpu: color_cpu(c.cpu_percent, limits.stress_cpu),
                    memory: format_percent(c.mem_percent),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);

            let budget = format!("{}/{}", report.total, report.max_total_pods);
            let budget = if report.total > report.max_total_pods {
                budget.red().to_string()
            } else {
                budget.green().to_string()
            };
            println!("\nPods:     {}", budget);
            println!("Stressed: {}", format_flag(report.stressed));
            println!("Balanced: {}", format_flag(report.balanced));

            for reason in &report.degraded {
                print_warning(reason);
            }
        }
    }

    Ok(())
}
