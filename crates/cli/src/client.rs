//! Connection to the metrics source and control plane for one CLI invocation

use anyhow::{Context, Result};
use autoscaler_lib::{
    clock::{Clock, TokioClock},
    cluster::{ClusterController, KubeControlPlane},
    config::AutoscalerConfig,
    env::Environment,
    metrics::{MetricsClient, PrometheusSource},
};
use std::sync::Arc;

/// Live environment plus the settings it was built from
pub struct AutoscalerClient {
    pub settings: AutoscalerConfig,
    pub env: Environment,
}

impl AutoscalerClient {
    /// Build an environment against the configured metrics source and cluster
    pub async fn connect(settings: AutoscalerConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock);

        let source =
            PrometheusSource::new(&settings.metrics).context("Invalid metrics source URL")?;
        let metrics_client = MetricsClient::new(Arc::new(source), &settings.metrics);

        let plane = KubeControlPlane::connect(settings.cluster.kubeconfig.as_deref())
            .await
            .context("Failed to connect to Kubernetes")?;
        let cluster = ClusterController::new(Arc::new(plane), &settings.cluster, clock.clone());

        let env = Environment::new(metrics_client, cluster, clock, &settings.environment);

        Ok(Self { settings, env })
    }
}
