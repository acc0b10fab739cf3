//! Replica autoscaler - closed-loop replica count controller
//!
//! Runs as a single Deployment next to the workload it scales, observing
//! CPU utilization from Prometheus and adjusting the workload's replica
//! count through the Kubernetes scale subresource.

use anyhow::{Context, Result};
use autoscaler_lib::{
    clock::{Clock, TokioClock},
    cluster::{ClusterController, KubeControlPlane},
    config::AutoscalerConfig,
    control::{ControlLoop, ControlLoopBuilder, LoopConfig, LoopMode},
    env::Environment,
    health::{components, HealthRegistry},
    metrics::{MetricsClient, PrometheusSource},
    observability::{AutoscalerMetrics, StructuredLogger},
    policy::ThresholdPolicy,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AUTOSCALER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting replica-autoscaler");

    // Load configuration
    let agent = config::AgentConfig::load()?;
    let settings = AutoscalerConfig::load(agent.config_path.as_deref())?;
    info!(
        instance = %agent.instance_name,
        mode = %agent.mode,
        namespace = %settings.cluster.namespace,
        deployment = %settings.cluster.deployment,
        "Autoscaler configured"
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::METRICS_SOURCE).await;
    health_registry.register(components::CONTROL_PLANE).await;
    health_registry.register(components::CONTROL_LOOP).await;

    let metrics = AutoscalerMetrics::new();
    let logger = StructuredLogger::new(&agent.instance_name);

    // Start health and metrics server; readiness flips after the first reset
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics.clone()));
    let api_handle = tokio::spawn(api::serve(agent.api_port, app_state));

    let mut control =
        build_control_loop(&settings, health_registry, metrics, logger.clone()).await?;
    logger.log_startup(
        AUTOSCALER_VERSION,
        &control.environment().cluster().workload().to_string(),
        control.policy_name(),
    );

    match agent.mode {
        LoopMode::Training => {
            let report = control.train_default().await?;
            info!(
                steps = report.steps,
                total_reward = report.total_reward,
                final_replicas = report.final_replicas,
                "Training finished"
            );
        }
        LoopMode::Inference => {
            let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
            let mut loop_handle = tokio::spawn(async move { control.run(shutdown_rx).await });

            let summary = tokio::select! {
                joined = &mut loop_handle => joined.context("Control loop task panicked")??,
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    logger.log_shutdown("SIGINT received");
                    let _ = shutdown_tx.send(());
                    loop_handle.await.context("Control loop task panicked")??
                }
            };

            info!(
                cycles = summary.cycles,
                skipped = summary.skipped,
                "Inference finished"
            );
        }
    }

    api_handle.abort();
    info!("Shutting down");

    Ok(())
}

/// Wire the production collaborators into a control loop
async fn build_control_loop(
    settings: &AutoscalerConfig,
    health_registry: HealthRegistry,
    metrics: AutoscalerMetrics,
    logger: StructuredLogger,
) -> Result<ControlLoop> {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);

    let source = PrometheusSource::new(&settings.metrics)
        .context("Failed to create metrics source client")?;
    let metrics_client =
        MetricsClient::new(Arc::new(source), &settings.metrics).with_metrics(metrics.clone());

    let plane = KubeControlPlane::connect(settings.cluster.kubeconfig.as_deref()).await?;
    let cluster = ClusterController::new(Arc::new(plane), &settings.cluster, clock.clone())
        .with_metrics(metrics.clone());

    let env = Environment::new(
        metrics_client,
        cluster,
        clock.clone(),
        &settings.environment,
    )
    .with_metrics(metrics.clone());

    ControlLoopBuilder::new()
        .environment(env)
        .policy(ThresholdPolicy::from(&settings.policy))
        .config(LoopConfig::from(&settings.control))
        .clock(clock)
        .health(health_registry)
        .metrics(metrics)
        .logger(logger)
        .build()
}
