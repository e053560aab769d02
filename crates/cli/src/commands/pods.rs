//! Per-pod load inspection

use anyhow::Result;
use colored::Colorize;
use scaler_lib::anomaly::{HotPod, ImbalanceDetector};
use scaler_lib::collector::{ClusterControlPlane, KubeControlPlane};
use scaler_lib::{PodSample, ServiceClass};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{format_cpu, print_info, print_json, print_success, print_warning, OutputFormat};

/// Per-pod CPU of one class and the imbalance verdict
#[derive(Debug, Serialize)]
pub struct ClassPods {
    pub class: ServiceClass,
    pub pods: Vec<PodSample>,
    /// Pod the scaler would drain next cycle, if any
    pub hot_pod: Option<String>,
    pub hot_ratio: Option<f64>,
}

#[derive(Tabled)]
struct PodRow {
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Hot")]
    hot: String,
}

/// Read per-pod CPU for each class and evaluate imbalance
pub async fn inspect(
    plane: &dyn ClusterControlPlane,
    classes: &[ServiceClass],
    detector: &ImbalanceDetector,
) -> Result<Vec<ClassPods>> {
    let mut result = Vec::with_capacity(classes.len());
    for &class in classes {
        let pods = plane.per_pod_cpu(class).await?;
        let hot: Option<HotPod> = detector.check(&pods);
        result.push(ClassPods {
            class,
            hot_pod: hot.as_ref().map(|h| h.pod_id.clone()),
            hot_ratio: hot.map(|h| h.ratio),
            pods,
        });
    }
    Ok(result)
}

/// Show per-pod CPU; never drains anything
pub async fn show_pods(
    plane: &KubeControlPlane,
    class: Option<ServiceClass>,
    format: OutputFormat,
) -> Result<()> {
    let classes = match class {
        Some(class) => vec![class],
        None => ServiceClass::ALL.to_vec(),
    };
    let report = inspect(plane, &classes, &ImbalanceDetector::default()).await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            for entry in &report {
                println!(
                    "{} ({})",
                    entry.class.to_string().bold(),
                    plane.targets().selector(entry.class)
                );

                if entry.pods.is_empty() {
                    print_warning("No pod metrics found");
                    println!();
                    continue;
                }

                let rows: Vec<PodRow> = entry
                    .pods
                    .iter()
                    .map(|p| PodRow {
                        pod: p.pod_id.clone(),
                        cpu: format_cpu(p.cpu_milli),
                        hot: if entry.hot_pod.as_deref() == Some(p.pod_id.as_str()) {
                            "hot".red().bold().to_string()
                        } else {
                            String::new()
                        },
                    })
                    .collect();

                let table = tabled::Table::new(rows)
                    .with(tabled::settings::Style::rounded())
                    .to_string();
                println!("{}", table);

                match (&entry.hot_pod, entry.hot_ratio) {
                    (Some(pod), Some(ratio)) => print_info(&format!(
                        "{} runs at {:.1}x the class average and would be drained",
                        pod, ratio
                    )),
                    _ => print_success("Load is balanced"),
                }
                println!();
            }
        }
    }

    Ok(())
}
