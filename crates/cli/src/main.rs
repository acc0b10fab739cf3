//! Replica autoscaler CLI
//!
//! A command-line tool for inspecting and driving the managed workload
//! by hand: read the live state, scale, reset, step, run a short training
//! session and evaluate the reward function.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use autoscaler_lib::{env::RewardConfig, models::Action};
use clap::{Parser, Subcommand};
use client::AutoscalerClient;
use commands::{control, status, train};
use output::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Replica autoscaler CLI
#[derive(Parser)]
#[command(name = "scalectl")]
#[command(author, version, about = "CLI for the Replica Autoscaler", long_about = None)]
pub struct Cli {
    /// Autoscaler settings file (defaults to ~/.config/scalectl/config.toml)
    #[arg(long, env = "SCALECTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to kubeconfig file (in-cluster config or $KUBECONFIG when unset)
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Override the managed deployment's namespace
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Override the managed deployment
    #[arg(long, short)]
    pub deployment: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show live replica count, utilization and current reward
    Status,

    /// Set the replica count (clamped to the configured bounds)
    Scale {
        /// Desired replica count
        #[arg(allow_negative_numbers = true)]
        replicas: i64,
    },

    /// Reset the workload to the minimum replica count
    Reset,

    /// Apply one action and observe its effect
    Step {
        /// Action to apply (down, hold, up or 0, 1, 2)
        action: Action,
    },

    /// Run a bounded training session with the threshold policy
    Train {
        /// Number of steps (defaults to control.training_steps)
        #[arg(long, short)]
        steps: Option<usize>,
    },

    /// Evaluate the reward function offline
    Reward {
        /// Observed utilization percentage
        utilization: f64,

        /// Replica count before the action
        replicas: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let mut settings = config::load_settings(cli.config.as_deref(), cli.kubeconfig.as_deref())?;
    if let Some(namespace) = cli.namespace {
        settings.cluster.namespace = namespace;
    }
    if let Some(deployment) = cli.deployment {
        settings.cluster.deployment = deployment;
    }

    let format = cli.format;
    match cli.command {
        // Offline; never touches the cluster
        Commands::Reward {
            utilization,
            replicas,
        } => {
            let reward_config = RewardConfig::from(&settings.environment);
            status::show_reward(utilization, replicas, &reward_config, format)?;
        }
        Commands::Status => {
            let client = AutoscalerClient::connect(settings).await?;
            status::show_status(&client, format).await?;
        }
        Commands::Scale { replicas } => {
            let client = AutoscalerClient::connect(settings).await?;
            control::scale(&client, replicas, format).await?;
        }
        Commands::Reset => {
            let mut client = AutoscalerClient::connect(settings).await?;
            control::reset(&mut client, format).await?;
        }
        Commands::Step { action } => {
            let mut client = AutoscalerClient::connect(settings).await?;
            control::step(&mut client, action, format).await?;
        }
        Commands::Train { steps } => {
            let client = AutoscalerClient::connect(settings).await?;
            train::train(client, steps, format).await?;
        }
    }

    Ok(())
}
