//! Commands that change the managed workload

use anyhow::Result;
use autoscaler_lib::models::{Action, StepRecord};
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::client::AutoscalerClient;
use crate::output::{
    color_action, color_reward, color_utilization, print_info, print_json, print_success,
    print_table, print_warning, OutputFormat,
};

#[derive(Debug, Serialize)]
struct ScaleView {
    workload: String,
    requested: i64,
    applied: u32,
    live: u32,
}

/// Set the replica count through the clamp and read it back
pub async fn scale(client: &AutoscalerClient, requested: i64, format: OutputFormat) -> Result<()> {
    let cluster = client.env.cluster();
    let bounds = cluster.bounds();
    let applied = bounds.clamp(requested);

    cluster.set_replica_count(requested).await?;
    let live = cluster.get_replica_count().await?;

    let view = ScaleView {
        workload: cluster.workload().to_string(),
        requested,
        applied,
        live,
    };

    match format {
        OutputFormat::Json => print_json(&view)?,
        OutputFormat::Table => {
            if applied as i64 != requested {
                print_warning(&format!(
                    "Requested {} is outside {}..={}, clamped to {}",
                    requested, bounds.min, bounds.max, applied
                ));
            }
            print_success(&format!(
                "Scaled {} to {} replicas",
                view.workload.cyan(),
                view.live.to_string().bold()
            ));
        }
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct ResetView {
    workload: String,
    replicas: u32,
    observation: [f32; 1],
}

/// Force the workload back to the minimum replica count
pub async fn reset(client: &mut AutoscalerClient, format: OutputFormat) -> Result<()> {
    let (observation, info) = client.env.reset().await?;

    let view = ResetView {
        workload: client.env.cluster().workload().to_string(),
        replicas: info.replicas,
        observation: observation.to_array(),
    };

    match format {
        OutputFormat::Json => print_json(&view)?,
        OutputFormat::Table => {
            print_success(&format!(
                "Reset {} to {} replica(s)",
                view.workload.cyan(),
                view.replicas
            ));
        }
    }

    Ok(())
}

/// Row for step tables
#[derive(Tabled)]
pub struct StepRow {
    #[tabled(rename = "Step")]
    pub step: u64,
    #[tabled(rename = "Action")]
    pub action: String,
    #[tabled(rename = "Replicas")]
    pub replicas: String,
    #[tabled(rename = "CPU")]
    pub utilization: String,
    #[tabled(rename = "Reward")]
    pub reward: String,
}

impl StepRow {
    pub fn from_record(record: &StepRecord, target: f64) -> Self {
        let utilization = color_utilization(record.utilization, target);
        Self {
            step: record.step,
            action: color_action(record.action),
            replicas: format!("{} → {}", record.replicas_before, record.replicas_after),
            utilization: if record.metrics_fallback {
                format!("{} {}", utilization, "(fallback)".dimmed())
            } else {
                utilization
            },
            reward: color_reward(record.reward),
        }
    }
}

/// Apply one action and show what it did
pub async fn step(client: &mut AutoscalerClient, action: Action, format: OutputFormat) -> Result<()> {
    print_info(&format!(
        "Applying {} and waiting {}s to settle",
        action,
        client.env.stabilization().as_secs()
    ));

    let outcome = client.env.step(action).await?;
    let record = StepRecord::from_outcome(&outcome);

    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Table => {
            let target = client.env.reward_config().target;
            print_table(&[StepRow::from_record(&record, target)]);
        }
    }

    Ok(())
}
