//! Observability infrastructure for the autoscaler
//!
//! Provides:
//! - Prometheus metrics (utilization, replicas, reward, step latency, failures)
//! - Structured JSON logging with tracing

use crate::models::{Action, RunSummary, StepOutcome, TrainingReport};
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for step durations (in seconds); steps include the stabilization wait
const STEP_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 2.5, 3.0, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AutoscalerMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct AutoscalerMetricsInner {
    utilization_percent: Gauge,
    replicas: IntGauge,
    reward: Gauge,
    step_duration_seconds: Histogram,
    actions_total: IntCounterVec,
    metrics_query_failures: IntCounter,
    control_plane_errors: IntCounter,
    skipped_cycles: IntCounter,
    resets_total: IntCounter,
}

impl AutoscalerMetricsInner {
    fn new() -> Self {
        Self {
            utilization_percent: register_gauge!(
                "autoscaler_utilization_percent",
                "Last observed utilization of the managed workload"
            )
            .expect("Failed to register utilization_percent"),

            replicas: register_int_gauge!(
                "autoscaler_replicas",
                "Replica count requested by the last step"
            )
            .expect("Failed to register replicas"),

            reward: register_gauge!("autoscaler_reward", "Reward scored by the last step")
                .expect("Failed to register reward"),

            step_duration_seconds: register_histogram!(
                "autoscaler_step_duration_seconds",
                "Wall time of one observe-decide-act-settle cycle",
                STEP_BUCKETS.to_vec()
            )
            .expect("Failed to register step_duration_seconds"),

            actions_total: register_int_counter_vec!(
                "autoscaler_actions_total",
                "Actions applied to the environment",
                &["action"]
            )
            .expect("Failed to register actions_total"),

            metrics_query_failures: register_int_counter!(
                "autoscaler_metrics_query_failures_total",
                "Metrics queries that fell back to zero utilization"
            )
            .expect("Failed to register metrics_query_failures"),

            control_plane_errors: register_int_counter!(
                "autoscaler_control_plane_errors_total",
                "Control plane calls that failed after retries"
            )
            .expect("Failed to register control_plane_errors"),

            skipped_cycles: register_int_counter!(
                "autoscaler_skipped_cycles_total",
                "Inference cycles skipped because a step failed"
            )
            .expect("Failed to register skipped_cycles"),

            resets_total: register_int_counter!(
                "autoscaler_resets_total",
                "Environment resets"
            )
            .expect("Failed to register resets_total"),
        }
    }
}

/// Autoscaler metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AutoscalerMetrics {
    _private: (),
}

impl Default for AutoscalerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoscalerMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AutoscalerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AutoscalerMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record the outcome of a completed step
    pub fn record_step(&self, outcome: &StepOutcome, duration_secs: f64) {
        let inner = self.inner();
        inner.utilization_percent.set(outcome.info.utilization);
        inner.replicas.set(outcome.info.replicas_after as i64);
        inner.reward.set(outcome.reward);
        inner.step_duration_seconds.observe(duration_secs);
        inner
            .actions_total
            .with_label_values(&[outcome.info.action.as_str()])
            .inc();
    }

    /// Record a reset to the baseline replica count
    pub fn record_reset(&self, replicas: u32) {
        self.inner().replicas.set(replicas as i64);
        self.inner().utilization_percent.set(0.0);
        self.inner().resets_total.inc();
    }

    pub fn inc_metrics_query_failures(&self) {
        self.inner().metrics_query_failures.inc();
    }

    pub fn inc_control_plane_errors(&self) {
        self.inner().control_plane_errors.inc();
    }

    pub fn inc_skipped_cycles(&self) {
        self.inner().skipped_cycles.inc();
    }

    /// Count of applied actions with the given label
    pub fn action_count(&self, action: Action) -> u64 {
        self.inner()
            .actions_total
            .with_label_values(&[action.as_str()])
            .get()
    }
}

/// Structured logger for control loop events
///
/// Provides consistent JSON-formatted logging for resets, steps,
/// skipped cycles and lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log an environment reset
    pub fn log_reset(&self, workload: &str, replicas: u32) {
        info!(
            event = "environment_reset",
            instance = %self.instance,
            workload = %workload,
            replicas = replicas,
            "Environment reset to baseline"
        );
    }

    /// Log a completed step; the line operators watch during inference
    pub fn log_step(&self, outcome: &StepOutcome) {
        info!(
            event = "step_completed",
            instance = %self.instance,
            step = outcome.info.step_index,
            utilization = outcome.info.utilization,
            replicas = outcome.info.replicas_after,
            replicas_before = outcome.info.replicas_before,
            action = %outcome.info.action,
            action_index = outcome.info.action.index(),
            reward = outcome.reward,
            metrics_fallback = outcome.info.metrics_fallback,
            "Current CPU: {:.2}% | Replicas: {} | Decision: {}",
            outcome.info.utilization,
            outcome.info.replicas_after,
            outcome.info.action
        );
    }

    /// Log a skipped inference cycle
    pub fn log_cycle_skipped(&self, cycle: u64, error: &str) {
        warn!(
            event = "cycle_skipped",
            instance = %self.instance,
            cycle = cycle,
            error = %error,
            "Step failed, keeping previous replica count"
        );
    }

    /// Log the end of a training run
    pub fn log_training_complete(&self, report: &TrainingReport) {
        info!(
            event = "training_completed",
            instance = %self.instance,
            policy = %report.policy,
            steps = report.steps,
            total_reward = report.total_reward,
            mean_reward = report.mean_reward,
            final_replicas = report.final_replicas,
            "Training run complete"
        );
    }

    /// Log the end of an inference run
    pub fn log_run_stopped(&self, summary: &RunSummary) {
        info!(
            event = "inference_stopped",
            instance = %self.instance,
            cycles = summary.cycles,
            skipped = summary.skipped,
            total_reward = summary.total_reward,
            "Inference loop stopped"
        );
    }

    /// Log autoscaler startup
    pub fn log_startup(&self, version: &str, workload: &str, policy: &str) {
        info!(
            event = "autoscaler_started",
            instance = %self.instance,
            version = %version,
            workload = %workload,
            policy = %policy,
            "Autoscaler started"
        );
    }

    /// Log autoscaler shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "autoscaler_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Autoscaler shutting down"
        );
    }
}
