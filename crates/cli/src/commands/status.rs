//! Read-only commands: live status and offline reward evaluation

use anyhow::Result;
use autoscaler_lib::env::{reward, RewardConfig};
use colored::Colorize;
use serde::Serialize;

use crate::client::AutoscalerClient;
use crate::output::{
    color_reward, color_utilization, print_json, print_warning, OutputFormat,
};

/// Current state of the managed workload
#[derive(Debug, Serialize)]
struct StatusView {
    workload: String,
    replicas: u32,
    min_replicas: u32,
    max_replicas: u32,
    utilization: f64,
    metrics_fallback: bool,
    /// Reward the current state would score
    reward: f64,
    query: String,
}

/// Show live replica count, utilization and the reward they would score
pub async fn show_status(client: &AutoscalerClient, format: OutputFormat) -> Result<()> {
    let cluster = client.env.cluster();
    let metrics = client.env.metrics_client();

    let replicas = cluster.get_replica_count().await?;
    let reading = metrics.utilization().await;
    let bounds = cluster.bounds();

    let view = StatusView {
        workload: cluster.workload().to_string(),
        replicas,
        min_replicas: bounds.min,
        max_replicas: bounds.max,
        utilization: reading.percent,
        metrics_fallback: reading.fallback,
        reward: reward(reading.percent, replicas, client.env.reward_config()),
        query: autoscaler_lib::metrics::render_query(metrics.selector(), metrics.window()),
    };

    match format {
        OutputFormat::Json => print_json(&view)?,
        OutputFormat::Table => {
            let target = client.env.reward_config().target;

            println!("{}", "Autoscaler Status".bold());
            println!("{}", "=".repeat(50));
            println!("Workload:     {}", view.workload.cyan());
            println!(
                "Replicas:     {} (bounds {}..={})",
                view.replicas.to_string().bold(),
                view.min_replicas,
                view.max_replicas
            );
            println!(
                "Utilization:  {} (target {:.0}%)",
                color_utilization(view.utilization, target),
                target
            );
            println!("Reward:       {}", color_reward(view.reward));
            println!("Query:        {}", view.query.dimmed());

            if view.metrics_fallback {
                println!();
                print_warning("Metrics query failed; utilization shown is the fallback value");
            }
        }
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct RewardView {
    utilization: f64,
    replicas: u32,
    target: f64,
    cost_weight: f64,
    reward: f64,
}

/// Evaluate the reward function without touching the cluster
pub fn show_reward(
    utilization: f64,
    replicas: u32,
    config: &RewardConfig,
    format: OutputFormat,
) -> Result<()> {
    let view = RewardView {
        utilization,
        replicas,
        target: config.target,
        cost_weight: config.cost_weight,
        reward: reward(utilization, replicas, config),
    };

    match format {
        OutputFormat::Json => print_json(&view)?,
        OutputFormat::Table => {
            println!(
                "-|{:.2} - {:.2}| - {:.2} * {} = {}",
                view.utilization,
                view.target,
                view.cost_weight,
                view.replicas,
                color_reward(view.reward)
            );
        }
    }

    Ok(())
}
