//! Error types shared across the control loop

use std::time::Duration;
use thiserror::Error;

/// Failures talking to the metrics source
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("metrics source returned {status}: {error_type}: {message}")]
    Status {
        status: String,
        error_type: String,
        message: String,
    },

    #[error("malformed metrics response: {0}")]
    Malformed(String),

    #[error("metrics query returned no series")]
    EmptyResult,

    #[error("metrics sample is not a number: {0}")]
    InvalidValue(String),

    #[error("invalid metrics source url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Failures talking to the cluster control plane
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("control plane call timed out after {0:?}")]
    Timeout(Duration),

    #[error("workload has no replica count in its scale spec")]
    MissingReplicas,

    #[error("control plane unavailable: {0}")]
    Unavailable(String),
}

impl ControlPlaneError {
    /// Whether the call may succeed if repeated
    pub fn is_retryable(&self) -> bool {
        match self {
            ControlPlaneError::Kube(kube::Error::Api(response)) => {
                response.code >= 500 || response.code == 429 || response.code == 409
            }
            ControlPlaneError::Kube(_) => true,
            ControlPlaneError::Timeout(_) => true,
            ControlPlaneError::MissingReplicas => false,
            ControlPlaneError::Unavailable(_) => true,
        }
    }
}

/// Cluster controller failure after retries have been applied
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: ControlPlaneError,
    },

    #[error("{operation} failed: {source}")]
    Permanent {
        operation: &'static str,
        #[source]
        source: ControlPlaneError,
    },
}

/// Errors raised at the environment boundary
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("invalid action {0}, expected 0 (scale down), 1 (hold) or 2 (scale up)")]
    InvalidAction(i64),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}
