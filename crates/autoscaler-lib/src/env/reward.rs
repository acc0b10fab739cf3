//! Reward signal for scaling decisions

use crate::config::EnvironmentConfig;
use serde::{Deserialize, Serialize};

/// Reward shaping parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Utilization percentage the workload should sit at
    pub target: f64,
    /// Penalty per replica
    pub cost_weight: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            target: 50.0,
            cost_weight: 0.5,
        }
    }
}

impl From<&EnvironmentConfig> for RewardConfig {
    fn from(config: &EnvironmentConfig) -> Self {
        Self {
            target: config.target_utilization,
            cost_weight: config.cost_weight,
        }
    }
}

/// `-|utilization - target| - cost_weight * replicas`
///
/// Callers pass the replica count read before the action was applied, so
/// the cost term trails the action by one step.
pub fn reward(utilization: f64, replicas: u32, config: &RewardConfig) -> f64 {
    -(utilization - config.target).abs() - config.cost_weight * replicas as f64
}
