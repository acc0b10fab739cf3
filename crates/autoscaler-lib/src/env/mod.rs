//! Autoscaling environment
//!
//! Composes the metrics client and the cluster controller into a
//! reset/step cycle. Each step reads the live replica count, applies the
//! action through the clamp, waits the stabilization interval, observes
//! utilization and scores the result. The environment has no natural
//! episode end; `terminated` and `truncated` are always false.

mod reward;

pub use reward::{reward, RewardConfig};

use crate::clock::Clock;
use crate::cluster::ClusterController;
use crate::config::EnvironmentConfig;
use crate::error::EnvError;
use crate::metrics::MetricsClient;
use crate::models::{Action, Observation, ResetInfo, StepInfo, StepOutcome};
use crate::observability::AutoscalerMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Per-episode state, replaced on every reset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeState {
    /// Replica count after the last reset or step
    pub replicas: u32,
    pub last_observation: Observation,
    /// Steps taken since the last reset
    pub step_index: u64,
}

impl EpisodeState {
    fn baseline(replicas: u32) -> Self {
        Self {
            replicas,
            last_observation: Observation::zero(),
            step_index: 0,
        }
    }
}

/// The autoscaling environment
///
/// `reset` and `step` take `&mut self`, so a single instance can never have
/// two steps in flight.
pub struct Environment {
    metrics_client: MetricsClient,
    cluster: ClusterController,
    clock: Arc<dyn Clock>,
    stabilization: Duration,
    reward: RewardConfig,
    state: EpisodeState,
    metrics: Option<AutoscalerMetrics>,
}

impl Environment {
    /// Create an environment; call [`Environment::reset`] before stepping
    pub fn new(
        metrics_client: MetricsClient,
        cluster: ClusterController,
        clock: Arc<dyn Clock>,
        config: &EnvironmentConfig,
    ) -> Self {
        let baseline = cluster.bounds().min;
        Self {
            metrics_client,
            cluster,
            clock,
            stabilization: config.stabilization(),
            reward: RewardConfig::from(config),
            state: EpisodeState::baseline(baseline),
            metrics: None,
        }
    }

    /// Record step gauges and counters in the given metrics handle
    pub fn with_metrics(mut self, metrics: AutoscalerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Force the workload to the minimum replica count and start a new episode.
    ///
    /// The returned observation is always zero, not a measured value.
    pub async fn reset(&mut self) -> Result<(Observation, ResetInfo), EnvError> {
        let baseline = self.cluster.bounds().min;

        self.cluster.set_replica_count(baseline as i64).await?;
        self.clock.sleep(self.stabilization).await;

        self.state = EpisodeState::baseline(baseline);

        if let Some(metrics) = &self.metrics {
            metrics.record_reset(baseline);
        }

        Ok((Observation::zero(), ResetInfo { replicas: baseline }))
    }

    /// Apply one action and observe its effect
    pub async fn step(&mut self, action: Action) -> Result<StepOutcome, EnvError> {
        let start = Instant::now();

        let replicas_before = self.cluster.get_replica_count().await?;
        let replicas_after = self.apply(action, replicas_before).await?;

        self.clock.sleep(self.stabilization).await;

        let reading = self.metrics_client.utilization().await;
        // Only the policy input is bounded; reward and info see the measured value
        let observation = Observation::new(reading.percent);
        let reward = reward(reading.percent, replicas_before, &self.reward);

        self.state.step_index += 1;
        self.state.replicas = replicas_after;
        self.state.last_observation = observation;

        let outcome = StepOutcome {
            observation,
            reward,
            terminated: false,
            truncated: false,
            info: StepInfo {
                replicas_before,
                replicas_after,
                utilization: reading.percent,
                action,
                step_index: self.state.step_index,
                metrics_fallback: reading.fallback,
            },
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_step(&outcome, start.elapsed().as_secs_f64());
        }

        Ok(outcome)
    }

    /// Step with a raw action index, rejecting values outside 0..=2
    pub async fn step_index(&mut self, index: i64) -> Result<StepOutcome, EnvError> {
        let action = Action::from_index(index)?;
        self.step(action).await
    }

    /// Issue the mutation for `action`; returns the replica count now requested
    async fn apply(&self, action: Action, current: u32) -> Result<u32, EnvError> {
        if action == Action::Hold {
            return Ok(current);
        }

        let requested = current as i64 + action.delta();
        let target = self.cluster.bounds().clamp(requested);

        if target == current {
            debug!(
                workload = %self.cluster.workload(),
                replicas = current,
                action = %action,
                "Replica count already at bound, skipping mutation"
            );
            return Ok(current);
        }

        self.cluster.set_replica_count(requested).await?;
        Ok(target)
    }

    pub fn state(&self) -> &EpisodeState {
        &self.state
    }

    pub fn reward_config(&self) -> &RewardConfig {
        &self.reward
    }

    pub fn stabilization(&self) -> Duration {
        self.stabilization
    }

    pub fn cluster(&self) -> &ClusterController {
        &self.cluster
    }

    pub fn metrics_client(&self) -> &MetricsClient {
        &self.metrics_client
    }
}
