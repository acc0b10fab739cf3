//! Autoscaler configuration
//!
//! Configuration is an explicit record built once at startup and handed by
//! value to the components that need it. Sources are layered: an optional
//! file, then environment variables prefixed with `AUTOSCALER_` using `__`
//! as the nesting separator (e.g. `AUTOSCALER_METRICS__URL`).

use crate::models::ReplicaBounds;
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level autoscaler configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoscalerConfig {
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Metrics source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Base URL of the Prometheus-compatible metrics source
    #[serde(default = "default_metrics_url")]
    pub url: String,

    /// Counter selector whose rate is averaged into utilization
    #[serde(default = "default_selector")]
    pub selector: String,

    /// Rate aggregation window in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Request timeout in seconds
    #[serde(default = "default_metrics_timeout")]
    pub timeout_secs: u64,
}

/// Managed workload and control plane settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Deployment whose replica count is managed
    #[serde(default = "default_deployment")]
    pub deployment: String,

    #[serde(default = "default_min_replicas")]
    pub min_replicas: u32,

    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,

    /// Per-call timeout in seconds
    #[serde(default = "default_cluster_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Explicit kubeconfig; in-cluster or default kubeconfig when unset
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

/// Environment dynamics and reward settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Fixed wait after a mutation before observing
    #[serde(default = "default_stabilization_secs")]
    pub stabilization_secs: u64,

    #[serde(default = "default_target_utilization")]
    pub target_utilization: f64,

    /// Penalty per running replica
    #[serde(default = "default_cost_weight")]
    pub cost_weight: f64,
}

/// Control loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Step budget for one training invocation
    #[serde(default = "default_training_steps")]
    pub training_steps: usize,

    /// Stop inference after this many cycles; unbounded when unset
    #[serde(default)]
    pub max_cycles: Option<u64>,

    /// Pause after a failed inference cycle
    #[serde(default = "default_failure_backoff_secs")]
    pub failure_backoff_secs: u64,
}

/// Reference threshold policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_scale_up_above")]
    pub scale_up_above: f64,

    #[serde(default = "default_scale_down_below")]
    pub scale_down_below: f64,
}

fn default_metrics_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_selector() -> String {
    r#"container_cpu_usage_seconds_total{pod=~"cpu-eater.*"}"#.to_string()
}

fn default_window_secs() -> u64 {
    60
}

fn default_metrics_timeout() -> u64 {
    5
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_deployment() -> String {
    "cpu-eater".to_string()
}

fn default_min_replicas() -> u32 {
    1
}

fn default_max_replicas() -> u32 {
    10
}

fn default_cluster_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    5000
}

fn default_stabilization_secs() -> u64 {
    2
}

fn default_target_utilization() -> f64 {
    50.0
}

fn default_cost_weight() -> f64 {
    0.5
}

fn default_training_steps() -> usize {
    20
}

fn default_failure_backoff_secs() -> u64 {
    2
}

fn default_scale_up_above() -> f64 {
    70.0
}

fn default_scale_down_below() -> f64 {
    30.0
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            url: default_metrics_url(),
            selector: default_selector(),
            window_secs: default_window_secs(),
            timeout_secs: default_metrics_timeout(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            deployment: default_deployment(),
            min_replicas: default_min_replicas(),
            max_replicas: default_max_replicas(),
            timeout_secs: default_cluster_timeout(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            kubeconfig: None,
        }
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            stabilization_secs: default_stabilization_secs(),
            target_utilization: default_target_utilization(),
            cost_weight: default_cost_weight(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            training_steps: default_training_steps(),
            max_cycles: None,
            failure_backoff_secs: default_failure_backoff_secs(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            scale_up_above: default_scale_up_above(),
            scale_down_below: default_scale_down_below(),
        }
    }
}

impl MetricsConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ClusterConfig {
    pub fn bounds(&self) -> ReplicaBounds {
        ReplicaBounds::new(self.min_replicas, self.max_replicas)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl EnvironmentConfig {
    pub fn stabilization(&self) -> Duration {
        Duration::from_secs(self.stabilization_secs)
    }
}

impl ControlConfig {
    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_secs)
    }
}

impl AutoscalerConfig {
    /// Load configuration from an optional file and `AUTOSCALER_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("AUTOSCALER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read autoscaler configuration")?;

        let config: AutoscalerConfig = settings
            .try_deserialize()
            .context("Failed to parse autoscaler configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the control loop cannot honor
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.cluster.min_replicas >= 1,
            "cluster.min_replicas must be at least 1"
        );
        ensure!(
            self.cluster.min_replicas <= self.cluster.max_replicas,
            "cluster.min_replicas ({}) exceeds cluster.max_replicas ({})",
            self.cluster.min_replicas,
            self.cluster.max_replicas
        );
        ensure!(
            self.cluster.max_replicas <= i32::MAX as u32,
            "cluster.max_replicas must not exceed {}",
            i32::MAX
        );
        ensure!(
            self.cluster.max_attempts >= 1,
            "cluster.max_attempts must be at least 1"
        );
        ensure!(self.metrics.window_secs > 0, "metrics.window_secs must be positive");
        ensure!(
            self.policy.scale_down_below <= self.policy.scale_up_above,
            "policy.scale_down_below must not exceed policy.scale_up_above"
        );
        ensure!(
            self.environment.cost_weight >= 0.0,
            "environment.cost_weight must not be negative"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_configuration() {
        let config = AutoscalerConfig::default();
        assert_eq!(config.cluster.bounds(), ReplicaBounds::new(1, 10));
        assert_eq!(config.environment.stabilization(), Duration::from_secs(2));
        assert_eq!(config.environment.target_utilization, 50.0);
        assert_eq!(config.environment.cost_weight, 0.5);
        assert_eq!(config.control.training_steps, 20);
        assert_eq!(config.metrics.window(), Duration::from_secs(60));
        assert!(config.control.max_cycles.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[cluster]
deployment = "web"
max_replicas = 4

[environment]
cost_weight = 1.5
"#
        )
        .unwrap();

        let config = AutoscalerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.cluster.deployment, "web");
        assert_eq!(config.cluster.max_replicas, 4);
        assert_eq!(config.cluster.min_replicas, 1);
        assert_eq!(config.environment.cost_weight, 1.5);
        assert_eq!(config.metrics.url, "http://localhost:9090");
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[control]\nfailure_backoff_secs = 4\ntraining_steps = 12\n"
        )
        .unwrap();

        // keys no other test in this binary loads
        std::env::set_var("AUTOSCALER_CONTROL__FAILURE_BACKOFF_SECS", "9");
        std::env::set_var("AUTOSCALER_METRICS__WINDOW_SECS", "30");
        let result = AutoscalerConfig::load(Some(file.path()));
        std::env::remove_var("AUTOSCALER_CONTROL__FAILURE_BACKOFF_SECS");
        std::env::remove_var("AUTOSCALER_METRICS__WINDOW_SECS");

        let config = result.unwrap();
        assert_eq!(config.control.failure_backoff(), Duration::from_secs(9));
        assert_eq!(config.control.training_steps, 12);
        assert_eq!(config.metrics.window(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_rejects_inverted_bounds() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[cluster]\nmin_replicas = 5\nmax_replicas = 2\n").unwrap();

        let err = AutoscalerConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_validate_rejects_zero_minimum() {
        let mut config = AutoscalerConfig::default();
        config.cluster.min_replicas = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_maximum_beyond_scale_range() {
        let mut config = AutoscalerConfig::default();
        config.cluster.max_replicas = i32::MAX as u32 + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_replicas"));

        config.cluster.max_replicas = i32::MAX as u32;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_crossed_thresholds() {
        let mut config = AutoscalerConfig::default();
        config.policy.scale_down_below = 80.0;
        config.policy.scale_up_above = 20.0;
        assert!(config.validate().is_err());
    }
}
