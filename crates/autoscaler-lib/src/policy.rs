//! Decision policies
//!
//! The control loop only depends on the [`Policy`] trait. Learned policies
//! implement `update`; rule-based ones keep the default no-op.

use crate::config::PolicyConfig;
use crate::models::{Action, Observation, Transition};
use anyhow::Result;

/// Maps an observation to a scaling action
pub trait Policy: Send + Sync {
    /// Choose the next action
    fn decide(&mut self, observation: &Observation) -> Action;

    /// Learn from one transition
    fn update(&mut self, _transition: &Transition) -> Result<()> {
        Ok(())
    }

    /// Name used in logs and reports
    fn name(&self) -> &str;
}

/// Scale up above one utilization threshold, down below another
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdPolicy {
    scale_up_above: f64,
    scale_down_below: f64,
}

impl ThresholdPolicy {
    pub fn new(scale_up_above: f64, scale_down_below: f64) -> Self {
        Self {
            scale_up_above,
            scale_down_below,
        }
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::from(&PolicyConfig::default())
    }
}

impl From<&PolicyConfig> for ThresholdPolicy {
    fn from(config: &PolicyConfig) -> Self {
        Self::new(config.scale_up_above, config.scale_down_below)
    }
}

impl Policy for ThresholdPolicy {
    fn decide(&mut self, observation: &Observation) -> Action {
        if observation.utilization > self.scale_up_above {
            Action::ScaleUp
        } else if observation.utilization < self.scale_down_below {
            Action::ScaleDown
        } else {
            Action::Hold
        }
    }

    fn name(&self) -> &str {
        "threshold"
    }
}

/// Always returns the same action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPolicy(pub Action);

impl Policy for FixedPolicy {
    fn decide(&mut self, _observation: &Observation) -> Action {
        self.0
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
