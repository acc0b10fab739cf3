//! Training and inference loop drivers

use crate::clock::{Clock, TokioClock};
use crate::config::ControlConfig;
use crate::env::Environment;
use crate::error::EnvError;
use crate::health::{components, HealthRegistry};
use crate::models::{
    Observation, RunSummary, StepOutcome, StepRecord, TrainingReport, Transition,
};
use crate::observability::{AutoscalerMetrics, StructuredLogger};
use crate::policy::Policy;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::info;

/// Configuration for the control loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Steps per training invocation (default: 20)
    pub training_steps: usize,
    /// Stop inference after this many cycles
    pub max_cycles: Option<u64>,
    /// Pause after a failed inference cycle (default: 2 seconds)
    pub failure_backoff: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            training_steps: 20,
            max_cycles: None,
            failure_backoff: Duration::from_secs(2),
        }
    }
}

impl From<&ControlConfig> for LoopConfig {
    fn from(config: &ControlConfig) -> Self {
        Self {
            training_steps: config.training_steps,
            max_cycles: config.max_cycles,
            failure_backoff: config.failure_backoff(),
        }
    }
}

/// Drives an [`Environment`] with a [`Policy`]
pub struct ControlLoop {
    env: Environment,
    policy: Box<dyn Policy>,
    config: LoopConfig,
    clock: Arc<dyn Clock>,
    health: Option<HealthRegistry>,
    metrics: Option<AutoscalerMetrics>,
    logger: StructuredLogger,
}

impl ControlLoop {
    /// Run the configured number of training steps
    pub async fn train_default(&mut self) -> Result<TrainingReport> {
        let steps = self.config.training_steps;
        self.train(steps).await
    }

    /// Reset, then run exactly `steps` cycles, updating the policy after each.
    ///
    /// The first failure aborts the run.
    pub async fn train(&mut self, steps: usize) -> Result<TrainingReport> {
        info!(
            steps = steps,
            policy = %self.policy.name(),
            "Starting training run"
        );

        let mut observation = self.reset().await?;
        let mut records = Vec::with_capacity(steps);
        let mut total_reward = 0.0;

        for step in 1..=steps {
            let action = self.policy.decide(&observation);
            let outcome = self
                .env
                .step(action)
                .await
                .with_context(|| format!("Training step {} of {} failed", step, steps))?;

            let transition = Transition {
                observation,
                action,
                reward: outcome.reward,
                next_observation: outcome.observation,
            };
            self.policy
                .update(&transition)
                .with_context(|| format!("Policy update failed at step {}", step))?;

            self.logger.log_step(&outcome);
            self.record_health(&outcome).await;

            total_reward += outcome.reward;
            records.push(StepRecord::from_outcome(&outcome));
            observation = outcome.observation;
        }

        let report = TrainingReport {
            policy: self.policy.name().to_string(),
            steps,
            total_reward,
            mean_reward: if steps == 0 {
                0.0
            } else {
                total_reward / steps as f64
            },
            final_replicas: self.env.state().replicas,
            records,
        };

        self.logger.log_training_complete(&report);
        Ok(report)
    }

    /// Reset once, then cycle until shutdown is signalled or `max_cycles` is reached.
    ///
    /// Shutdown is checked only between steps. A failed step is skipped: the
    /// previous observation is kept and the loop waits `failure_backoff`.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<RunSummary> {
        info!(
            policy = %self.policy.name(),
            max_cycles = ?self.config.max_cycles,
            "Starting inference loop"
        );

        let mut observation = self.reset().await?;
        let mut summary = RunSummary::default();

        loop {
            if self
                .config
                .max_cycles
                .is_some_and(|max| summary.cycles >= max)
            {
                info!(cycles = summary.cycles, "Cycle budget reached");
                break;
            }

            match shutdown.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => {
                    info!("Shutdown requested, stopping inference loop");
                    break;
                }
            }

            summary.cycles += 1;
            let action = self.policy.decide(&observation);

            match self.env.step(action).await {
                Ok(outcome) => {
                    self.logger.log_step(&outcome);
                    self.record_health(&outcome).await;
                    summary.total_reward += outcome.reward;
                    observation = outcome.observation;
                }
                Err(e) => {
                    summary.skipped += 1;
                    self.record_failure(summary.cycles, &e).await;

                    tokio::select! {
                        _ = self.clock.sleep(self.config.failure_backoff) => {}
                        _ = shutdown.recv() => {
                            info!("Shutdown requested during failure backoff");
                            break;
                        }
                    }
                }
            }
        }

        self.logger.log_run_stopped(&summary);
        Ok(summary)
    }

    async fn reset(&mut self) -> Result<Observation> {
        let (observation, info) = self
            .env
            .reset()
            .await
            .context("Failed to reset environment")?;

        self.logger
            .log_reset(&self.env.cluster().workload().to_string(), info.replicas);

        if let Some(health) = &self.health {
            health.record_success(components::CONTROL_PLANE).await;
            health.set_ready(true).await;
        }

        Ok(observation)
    }

    async fn record_health(&self, outcome: &StepOutcome) {
        let Some(health) = &self.health else {
            return;
        };

        health.record_success(components::CONTROL_PLANE).await;
        health.record_success(components::CONTROL_LOOP).await;

        if outcome.info.metrics_fallback {
            health
                .record_failure(
                    components::METRICS_SOURCE,
                    "Metrics query failed, observed fallback utilization",
                )
                .await;
        } else {
            health.record_success(components::METRICS_SOURCE).await;
        }
    }

    async fn record_failure(&self, cycle: u64, error: &EnvError) {
        let message = error.to_string();
        self.logger.log_cycle_skipped(cycle, &message);

        if let Some(metrics) = &self.metrics {
            metrics.inc_skipped_cycles();
        }

        if let Some(health) = &self.health {
            let component = match error {
                EnvError::Cluster(_) => components::CONTROL_PLANE,
                EnvError::InvalidAction(_) => components::CONTROL_LOOP,
            };
            health.record_failure(component, message).await;
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }
}

/// Builder for creating a control loop
pub struct ControlLoopBuilder {
    env: Option<Environment>,
    policy: Option<Box<dyn Policy>>,
    config: LoopConfig,
    clock: Option<Arc<dyn Clock>>,
    health: Option<HealthRegistry>,
    metrics: Option<AutoscalerMetrics>,
    logger: Option<StructuredLogger>,
}

impl ControlLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            env: None,
            policy: None,
            config: LoopConfig::default(),
            clock: None,
            health: None,
            metrics: None,
            logger: None,
        }
    }

    /// Set the environment to drive
    pub fn environment(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    /// Set the decision policy
    pub fn policy(mut self, policy: impl Policy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    /// Set the decision policy from a boxed trait object
    pub fn boxed_policy(mut self, policy: Box<dyn Policy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the inference cycle budget
    pub fn max_cycles(mut self, cycles: u64) -> Self {
        self.config.max_cycles = Some(cycles);
        self
    }

    /// Set the clock used for failure backoff
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn metrics(mut self, metrics: AutoscalerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the control loop
    pub fn build(self) -> Result<ControlLoop> {
        let env = self
            .env
            .ok_or_else(|| anyhow::anyhow!("Environment is required"))?;
        let policy = self
            .policy
            .ok_or_else(|| anyhow::anyhow!("Policy is required"))?;

        Ok(ControlLoop {
            env,
            policy,
            config: self.config,
            clock: self.clock.unwrap_or_else(|| Arc::new(TokioClock)),
            health: self.health,
            metrics: self.metrics,
            logger: self
                .logger
                .unwrap_or_else(|| StructuredLogger::new("autoscaler")),
        })
    }
}

impl Default for ControlLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

