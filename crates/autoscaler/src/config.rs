//! Daemon configuration

use anyhow::{Context, Result};
use autoscaler_lib::LoopMode;
use serde::Deserialize;
use std::path::PathBuf;

/// Daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Instance name, taken from the pod name when running in-cluster
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Which loop driver to run
    #[serde(default)]
    pub mode: LoopMode,

    /// Autoscaler settings file; environment variables only when unset
    #[serde(default)]
    pub config_path: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            mode: LoopMode::default(),
            config_path: None,
        }
    }
}

fn default_instance_name() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| "replica-autoscaler".to_string())
}

fn default_api_port() -> u16 {
    8080
}

impl AgentConfig {
    /// Load configuration from `AGENT_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AGENT").try_parsing(true))
            .build()
            .context("Failed to read daemon configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse daemon configuration")
    }
}
