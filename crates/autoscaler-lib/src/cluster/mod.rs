//! Replica count management for the managed workload
//!
//! [`ClusterController`] wraps a [`ControlPlane`] and adds the safety bounds,
//! per-call timeouts and bounded retry with exponential backoff. Every write
//! is clamped into the configured bounds before it leaves this module.

mod kube_api;

pub use kube_api::KubeControlPlane;

use crate::clock::Clock;
use crate::config::ClusterConfig;
use crate::error::{ClusterError, ControlPlaneError};
use crate::models::ReplicaBounds;
use crate::observability::AutoscalerMetrics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use async_trait::async_trait;

/// Namespaced reference to the managed workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub namespace: String,
    pub name: String,
}

impl WorkloadRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Trait for cluster control plane implementations
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Read the desired replica count of a workload
    async fn read_replica_count(&self, workload: &WorkloadRef) -> Result<i32, ControlPlaneError>;

    /// Overwrite the desired replica count of a workload
    async fn patch_replica_count(
        &self,
        workload: &WorkloadRef,
        target: i32,
    ) -> Result<(), ControlPlaneError>;
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl From<&ClusterConfig> for RetryPolicy {
    fn from(config: &ClusterConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

/// Reads and writes the replica count of one workload within bounds
pub struct ClusterController {
    plane: Arc<dyn ControlPlane>,
    workload: WorkloadRef,
    bounds: ReplicaBounds,
    retry: RetryPolicy,
    call_timeout: Duration,
    clock: Arc<dyn Clock>,
    metrics: Option<AutoscalerMetrics>,
}

impl ClusterController {
    /// Create a controller for the workload named in the configuration
    pub fn new(plane: Arc<dyn ControlPlane>, config: &ClusterConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            plane,
            workload: WorkloadRef::new(&config.namespace, &config.deployment),
            bounds: config.bounds(),
            retry: RetryPolicy::from(config),
            call_timeout: config.timeout(),
            clock,
            metrics: None,
        }
    }

    /// Count exhausted control plane calls in the given metrics handle
    pub fn with_metrics(mut self, metrics: AutoscalerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn workload(&self) -> &WorkloadRef {
        &self.workload
    }

    pub fn bounds(&self) -> ReplicaBounds {
        self.bounds
    }

    /// Read the live desired replica count
    pub async fn get_replica_count(&self) -> Result<u32, ClusterError> {
        let replicas = self
            .with_retry("read replica count", || {
                self.plane.read_replica_count(&self.workload)
            })
            .await?;

        debug!(workload = %self.workload, replicas = replicas, "Read replica count");
        Ok(u32::try_from(replicas).unwrap_or(0))
    }

    /// Clamp `target` into bounds and write it to the control plane.
    ///
    /// Out-of-range targets are not an error; the clamped value is written.
    pub async fn set_replica_count(&self, target: i64) -> Result<(), ClusterError> {
        let applied = self.bounds.clamp(target);

        info!(
            workload = %self.workload,
            requested = target,
            applied = applied,
            "Scaling workload"
        );

        // The scale subresource holds an i32
        let applied = i32::try_from(applied).unwrap_or(i32::MAX);

        self.with_retry("patch replica count", || {
            self.plane.patch_replica_count(&self.workload, applied)
        })
        .await
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, ClusterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ControlPlaneError>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let result = match tokio::time::timeout(self.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ControlPlaneError::Timeout(self.call_timeout)),
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_retryable() {
                self.count_error();
                return Err(ClusterError::Permanent {
                    operation,
                    source: error,
                });
            }

            if attempt >= self.retry.max_attempts {
                self.count_error();
                return Err(ClusterError::RetriesExhausted {
                    operation,
                    attempts: attempt,
                    source: error,
                });
            }

            let backoff = self.retry.backoff_for(attempt);
            warn!(
                workload = %self.workload,
                operation = operation,
                attempt = attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Control plane call failed, retrying"
            );
            self.clock.sleep(backoff).await;
        }
    }

    fn count_error(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_control_plane_errors();
        }
    }
}
