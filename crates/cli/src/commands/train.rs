//! Bounded training run with the threshold policy

use anyhow::Result;
use autoscaler_lib::{
    control::{ControlLoopBuilder, LoopConfig},
    observability::StructuredLogger,
    policy::ThresholdPolicy,
};
use colored::Colorize;

use crate::client::AutoscalerClient;
use crate::commands::control::StepRow;
use crate::output::{color_reward, format_timestamp, print_info, print_json, print_table, OutputFormat};

/// Reset, run `steps` cycles and print the per-step history
pub async fn train(client: AutoscalerClient, steps: Option<usize>, format: OutputFormat) -> Result<()> {
    let AutoscalerClient { settings, env } = client;
    let steps = steps.unwrap_or(settings.control.training_steps);
    let target = env.reward_config().target;

    if let OutputFormat::Table = format {
        print_info(&format!(
            "Training {} for {} steps ({}s per step)",
            env.cluster().workload().to_string().cyan(),
            steps,
            env.stabilization().as_secs()
        ));
    }

    let mut control = ControlLoopBuilder::new()
        .environment(env)
        .policy(ThresholdPolicy::from(&settings.policy))
        .config(LoopConfig::from(&settings.control))
        .logger(StructuredLogger::new("scalectl"))
        .build()?;

    let report = control.train(steps).await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let rows: Vec<StepRow> = report
                .records
                .iter()
                .map(|record| StepRow::from_record(record, target))
                .collect();
            print_table(&rows);

            println!();
            println!("{}", "Training Report".bold());
            println!("{}", "-".repeat(40));
            println!("Policy:          {}", report.policy);
            println!("Steps:           {}", report.steps);
            println!("Total reward:    {}", color_reward(report.total_reward));
            println!("Mean reward:     {}", color_reward(report.mean_reward));
            println!("Final replicas:  {}", report.final_replicas);
            if let (Some(first), Some(last)) = (report.records.first(), report.records.last()) {
                println!(
                    "Window:          {} - {}",
                    format_timestamp(first.timestamp),
                    format_timestamp(last.timestamp)
                );
            }
        }
    }

    Ok(())
}
