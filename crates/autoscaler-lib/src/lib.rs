//! Replica autoscaler library
//!
//! This crate provides the core functionality for:
//! - Utilization queries against a Prometheus-compatible metrics source
//! - Bounded replica count changes through the Kubernetes scale subresource
//! - The reset/step autoscaling environment and its reward
//! - Training and inference control loops
//! - Health checks and observability

pub mod clock;
pub mod cluster;
pub mod config;
pub mod control;
pub mod env;
pub mod error;
pub mod health;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod policy;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, TokioClock};
pub use cluster::{ClusterController, ControlPlane, KubeControlPlane, WorkloadRef};
pub use config::AutoscalerConfig;
pub use control::{ControlLoop, ControlLoopBuilder, LoopConfig, LoopMode};
pub use env::{reward, Environment, RewardConfig};
pub use error::{ClusterError, ControlPlaneError, EnvError, MetricsError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use metrics::{MetricsClient, MetricsSource, PrometheusSource};
pub use models::*;
pub use observability::{AutoscalerMetrics, StructuredLogger};
pub use policy::{FixedPolicy, Policy, ThresholdPolicy};
