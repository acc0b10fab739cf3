//! Kubernetes control plane backed by the Deployment scale subresource

use super::{ControlPlane, WorkloadRef};
use crate::error::ControlPlaneError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::path::Path;
use tracing::debug;

/// Field manager recorded on scale patches
const FIELD_MANAGER: &str = "replica-autoscaler";

/// Scales Deployments through the Kubernetes API
#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
}

impl KubeControlPlane {
    /// Connect using in-cluster config or the default kubeconfig
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self> {
        let client = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig from {:?}", path))?;
                let config =
                    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .context("Invalid kubeconfig")?;
                Client::try_from(config).context("Failed to create Kubernetes client")?
            }
            None => Client::try_default()
                .await
                .context("Failed to infer Kubernetes configuration")?,
        };

        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn deployments(&self, workload: &WorkloadRef) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &workload.namespace)
    }
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn read_replica_count(&self, workload: &WorkloadRef) -> Result<i32, ControlPlaneError> {
        let scale = self.deployments(workload).get_scale(&workload.name).await?;

        scale
            .spec
            .and_then(|spec| spec.replicas)
            .ok_or(ControlPlaneError::MissingReplicas)
    }

    async fn patch_replica_count(
        &self,
        workload: &WorkloadRef,
        target: i32,
    ) -> Result<(), ControlPlaneError> {
        let patch = serde_json::json!({ "spec": { "replicas": target } });
        let mut params = PatchParams::default();
        params.field_manager = Some(FIELD_MANAGER.to_string());

        self.deployments(workload)
            .patch_scale(&workload.name, &params, &Patch::Merge(&patch))
            .await?;

        debug!(workload = %workload, replicas = target, "Patched scale subresource");
        Ok(())
    }
}
