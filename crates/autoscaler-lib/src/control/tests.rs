//! Control loop tests over in-memory fakes

use super::{ControlLoop, ControlLoopBuilder, LoopConfig};
use crate::cluster::ClusterController;
use crate::config::{ClusterConfig, EnvironmentConfig, MetricsConfig};
use crate::env::Environment;
use crate::health::{components, ComponentStatus, HealthRegistry};
use crate::metrics::MetricsClient;
use crate::models::{Action, Observation, Transition};
use crate::policy::{FixedPolicy, Policy};
use crate::testing::{FakeControlPlane, FakeMetricsSource, RecordingClock};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Records what it was shown and learns nothing
#[derive(Clone)]
struct RecordingPolicy {
    action: Action,
    seen: Arc<Mutex<Vec<Observation>>>,
    transitions: Arc<Mutex<Vec<Transition>>>,
    fail_update_at: Option<usize>,
}

impl RecordingPolicy {
    fn new(action: Action) -> Self {
        Self {
            action,
            seen: Arc::new(Mutex::new(Vec::new())),
            transitions: Arc::new(Mutex::new(Vec::new())),
            fail_update_at: None,
        }
    }

    fn seen(&self) -> Vec<Observation> {
        self.seen.lock().unwrap().clone()
    }

    fn transitions(&self) -> Vec<Transition> {
        self.transitions.lock().unwrap().clone()
    }
}

impl Policy for RecordingPolicy {
    fn decide(&mut self, observation: &Observation) -> Action {
        self.seen.lock().unwrap().push(*observation);
        self.action
    }

    fn update(&mut self, transition: &Transition) -> anyhow::Result<()> {
        let mut transitions = self.transitions.lock().unwrap();
        transitions.push(*transition);
        if Some(transitions.len()) == self.fail_update_at {
            anyhow::bail!("optimizer diverged");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct Harness {
    plane: Arc<FakeControlPlane>,
    source: Arc<FakeMetricsSource>,
    clock: Arc<RecordingClock>,
    health: HealthRegistry,
}

impl Harness {
    fn new(replicas: i32, raw_rate: f64) -> Self {
        Self {
            plane: Arc::new(FakeControlPlane::new(replicas)),
            source: Arc::new(FakeMetricsSource::new(raw_rate)),
            clock: Arc::new(RecordingClock::new()),
            health: HealthRegistry::new(),
        }
    }

    fn environment(&self) -> Environment {
        let metrics_client = MetricsClient::new(self.source.clone(), &MetricsConfig::default());
        let cluster = ClusterController::new(
            self.plane.clone(),
            &ClusterConfig::default(),
            self.clock.clone(),
        );
        Environment::new(
            metrics_client,
            cluster,
            self.clock.clone(),
            &EnvironmentConfig::default(),
        )
    }

    fn control_loop(&self, policy: impl Policy + 'static, config: LoopConfig) -> ControlLoop {
        ControlLoopBuilder::new()
            .environment(self.environment())
            .policy(policy)
            .config(config)
            .clock(self.clock.clone())
            .health(self.health.clone())
            .build()
            .unwrap()
    }
}

fn inference_config(max_cycles: u64) -> LoopConfig {
    LoopConfig {
        max_cycles: Some(max_cycles),
        failure_backoff: Duration::from_secs(7),
        ..LoopConfig::default()
    }
}

#[tokio::test]
async fn test_training_runs_configured_steps() {
    let h = Harness::new(5, 0.5);
    let mut control = h.control_loop(FixedPolicy(Action::ScaleUp), LoopConfig::default());

    let report = control.train_default().await.unwrap();

    assert_eq!(report.steps, 20);
    assert_eq!(report.records.len(), 20);
    assert_eq!(report.policy, "fixed");
    assert_eq!(report.final_replicas, 10);
    // reset to 1, then one write per step until the ceiling
    assert_eq!(h.plane.writes(), (1..=10).collect::<Vec<_>>());
    // utilization sits on target, so reward is -0.5 * replicas_before
    assert!((report.total_reward - -77.5).abs() < 1e-9);
    assert!((report.mean_reward - -77.5 / 20.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_training_updates_policy_with_each_transition() {
    let h = Harness::new(2, 0.8);
    let policy = RecordingPolicy::new(Action::Hold);
    let mut control = h.control_loop(policy.clone(), LoopConfig::default());

    control.train(4).await.unwrap();

    let transitions = policy.transitions();
    assert_eq!(transitions.len(), 4);
    assert_eq!(transitions[0].observation, Observation::zero());
    assert!((transitions[0].next_observation.utilization - 80.0).abs() < 1e-9);
    assert_eq!(transitions[1].observation, transitions[0].next_observation);
    assert!(transitions.iter().all(|t| t.action == Action::Hold));
}

#[tokio::test]
async fn test_training_aborts_when_reset_fails() {
    let h = Harness::new(3, 0.5);
    h.plane.fail_permanently();
    let mut control = h.control_loop(FixedPolicy(Action::Hold), LoopConfig::default());

    let err = control.train(5).await.unwrap_err();

    assert!(format!("{:#}", err).contains("Failed to reset environment"));
    assert_eq!(h.source.queries(), 0);
}

#[tokio::test]
async fn test_training_aborts_on_step_failure() {
    let h = Harness::new(3, 0.5);
    h.plane.fail_reads(10);
    let mut control = h.control_loop(FixedPolicy(Action::ScaleUp), LoopConfig::default());

    let err = control.train(5).await.unwrap_err();

    assert!(format!("{:#}", err).contains("Training step 1 of 5 failed"));
    // only the reset write went through
    assert_eq!(h.plane.writes(), vec![1]);
}

#[tokio::test]
async fn test_training_aborts_on_policy_update_failure() {
    let h = Harness::new(3, 0.5);
    let mut policy = RecordingPolicy::new(Action::Hold);
    policy.fail_update_at = Some(2);
    let mut control = h.control_loop(policy.clone(), LoopConfig::default());

    let err = control.train(5).await.unwrap_err();

    assert!(format!("{:#}", err).contains("Policy update failed at step 2"));
    assert_eq!(policy.transitions().len(), 2);
}

#[tokio::test]
async fn test_inference_stops_at_cycle_budget() {
    let h = Harness::new(4, 0.9);
    let (_tx, rx) = broadcast::channel(1);
    let policy = RecordingPolicy::new(Action::ScaleUp);
    let mut control = h.control_loop(policy.clone(), inference_config(3));

    let summary = control.run(rx).await.unwrap();

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.skipped, 0);
    assert_eq!(h.plane.replicas(), 4);
    // inference never trains
    assert!(policy.transitions().is_empty());
    assert_eq!(policy.seen().len(), 3);
}

#[tokio::test]
async fn test_inference_stops_on_shutdown_signal() {
    let h = Harness::new(6, 0.5);
    let (tx, rx) = broadcast::channel(1);
    tx.send(()).unwrap();
    let mut control = h.control_loop(FixedPolicy(Action::ScaleUp), LoopConfig::default());

    let summary = control.run(rx).await.unwrap();

    assert_eq!(summary.cycles, 0);
    // the reset still happens before the first check
    assert_eq!(h.plane.writes(), vec![1]);
    assert_eq!(h.source.queries(), 0);
}

#[tokio::test]
async fn test_inference_stops_when_sender_dropped() {
    let h = Harness::new(2, 0.5);
    let (tx, rx) = broadcast::channel::<()>(1);
    drop(tx);
    let mut control = h.control_loop(FixedPolicy(Action::Hold), LoopConfig::default());

    let summary = control.run(rx).await.unwrap();

    assert_eq!(summary.cycles, 0);
}

#[tokio::test]
async fn test_failed_cycle_is_skipped_and_loop_continues() {
    let h = Harness::new(3, 0.5);
    // exhausts every attempt of the first cycle's replica read
    h.plane.fail_reads(3);
    let (_tx, rx) = broadcast::channel(1);
    let policy = RecordingPolicy::new(Action::Hold);
    let mut control = h.control_loop(policy.clone(), inference_config(3));

    let summary = control.run(rx).await.unwrap();

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.skipped, 1);

    let seen = policy.seen();
    assert_eq!(seen.len(), 3);
    // the skipped cycle leaves the previous observation in place
    assert_eq!(seen[0], Observation::zero());
    assert_eq!(seen[1], Observation::zero());
    assert!((seen[2].utilization - 50.0).abs() < 1e-9);

    assert!(h.clock.waits().contains(&Duration::from_secs(7)));

    // recovered on the next cycle
    let health = h.health.health().await;
    assert_eq!(
        health.components[components::CONTROL_PLANE].status,
        ComponentStatus::Healthy
    );
}

#[tokio::test]
async fn test_repeated_failures_make_loop_unready() {
    let h = Harness::new(3, 0.5);
    h.plane.fail_reads(u32::MAX);
    let (_tx, rx) = broadcast::channel(1);
    let mut control = h.control_loop(FixedPolicy(Action::Hold), inference_config(3));

    let summary = control.run(rx).await.unwrap();

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.total_reward, 0.0);

    let health = h.health.health().await;
    let plane = &health.components[components::CONTROL_PLANE];
    assert_eq!(plane.status, ComponentStatus::Unhealthy);
    assert_eq!(plane.consecutive_failures, 3);

    let readiness = h.health.readiness().await;
    assert!(!readiness.ready);
    assert!(readiness.reason.unwrap().contains(components::CONTROL_PLANE));
}

#[tokio::test]
async fn test_metrics_fallback_degrades_metrics_source() {
    let h = Harness::new(2, 0.5);
    h.source.push_err();
    let (_tx, rx) = broadcast::channel(1);
    let mut control = h.control_loop(FixedPolicy(Action::Hold), inference_config(1));

    let summary = control.run(rx).await.unwrap();

    assert_eq!(summary.skipped, 0);
    // -|0 - 50| - 0.5 * 1
    assert!((summary.total_reward - -50.5).abs() < 1e-9);

    let health = h.health.health().await;
    assert_eq!(
        health.components[components::METRICS_SOURCE].status,
        ComponentStatus::Degraded
    );
    assert!(h.health.readiness().await.ready);
}

#[tokio::test]
async fn test_ready_only_after_reset() {
    let h = Harness::new(2, 0.5);
    assert!(!h.health.readiness().await.ready);

    let mut control = h.control_loop(FixedPolicy(Action::Hold), LoopConfig::default());
    control.train(1).await.unwrap();

    assert!(h.health.readiness().await.ready);
}

#[test]
fn test_builder_requires_environment() {
    let result = ControlLoopBuilder::new()
        .policy(FixedPolicy(Action::Hold))
        .build();

    let Err(err) = result else {
        panic!("builder accepted a missing environment");
    };
    assert_eq!(err.to_string(), "Environment is required");
}

#[test]
fn test_builder_requires_policy() {
    let h = Harness::new(1, 0.5);
    let result = ControlLoopBuilder::new()
        .environment(h.environment())
        .build();

    let Err(err) = result else {
        panic!("builder accepted a missing policy");
    };
    assert_eq!(err.to_string(), "Policy is required");
}

#[test]
fn test_builder_applies_cycle_budget() {
    let h = Harness::new(1, 0.5);
    let control = ControlLoopBuilder::new()
        .environment(h.environment())
        .policy(FixedPolicy(Action::Hold))
        .max_cycles(12)
        .build()
        .unwrap();

    assert_eq!(control.config().max_cycles, Some(12));
    assert_eq!(control.policy_name(), "fixed");
}
