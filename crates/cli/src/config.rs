//! Configuration management for the CLI

use anyhow::Result;
use autoscaler_lib::config::AutoscalerConfig;
use std::path::{Path, PathBuf};

/// Resolve and load autoscaler settings.
///
/// An explicit `--config` must exist; otherwise the per-user file is used
/// when present. `AUTOSCALER_*` variables apply on top either way.
pub fn load_settings(
    override_path: Option<&Path>,
    kubeconfig: Option<&Path>,
) -> Result<AutoscalerConfig> {
    let path = match override_path {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|path| path.exists()),
    };

    let mut settings = AutoscalerConfig::load(path.as_deref())?;

    // An explicit kubeconfig wins over the file; otherwise the client infers one
    if let Some(kubeconfig) = kubeconfig {
        settings.cluster.kubeconfig = Some(kubeconfig.to_path_buf());
    }

    Ok(settings)
}

/// Per-user configuration file
fn default_config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".config").join("scalectl").join("config.toml"))
}
