//! Core data models for the autoscaler control loop

use crate::error::EnvError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of values in an observation vector
pub const OBSERVATION_SIZE: usize = 1;

/// Upper bound of the observation space (multi-core saturation goes past 100%)
pub const MAX_UTILIZATION_PERCENT: f64 = 200.0;

/// Scaling action chosen by a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Action {
    ScaleDown = 0,
    Hold = 1,
    ScaleUp = 2,
}

impl Action {
    /// All actions in index order
    pub const ALL: [Action; 3] = [Action::ScaleDown, Action::Hold, Action::ScaleUp];

    /// Convert a raw policy output into an action.
    ///
    /// Only 0, 1 and 2 are valid; everything else is rejected.
    pub fn from_index(index: i64) -> Result<Self, EnvError> {
        match index {
            0 => Ok(Action::ScaleDown),
            1 => Ok(Action::Hold),
            2 => Ok(Action::ScaleUp),
            other => Err(EnvError::InvalidAction(other)),
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Replica delta requested by this action
    pub fn delta(self) -> i64 {
        match self {
            Action::ScaleDown => -1,
            Action::Hold => 0,
            Action::ScaleUp => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::ScaleDown => "scale_down",
            Action::Hold => "hold",
            Action::ScaleUp => "scale_up",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::ScaleDown => "Scale Down",
            Action::Hold => "Hold",
            Action::ScaleUp => "Scale Up",
        };
        f.write_str(label)
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "down" | "scale-down" | "scale_down" => Ok(Action::ScaleDown),
            "1" | "hold" => Ok(Action::Hold),
            "2" | "up" | "scale-up" | "scale_up" => Ok(Action::ScaleUp),
            other => Err(format!(
                "invalid action '{}', expected one of: down, hold, up",
                other
            )),
        }
    }
}

/// Observation handed to the policy: measured utilization percentage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub utilization: f64,
}

impl Observation {
    /// Build an observation, forcing the value into [0, 200]
    pub fn new(utilization: f64) -> Self {
        let utilization = if utilization.is_finite() {
            utilization.clamp(0.0, MAX_UTILIZATION_PERCENT)
        } else {
            0.0
        };
        Self { utilization }
    }

    /// The observation returned by a reset
    pub fn zero() -> Self {
        Self { utilization: 0.0 }
    }

    pub fn to_array(&self) -> [f32; OBSERVATION_SIZE] {
        [self.utilization as f32]
    }
}

impl Default for Observation {
    fn default() -> Self {
        Self::zero()
    }
}

/// Inclusive replica count bounds enforced on every write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaBounds {
    pub min: u32,
    pub max: u32,
}

impl Default for ReplicaBounds {
    fn default() -> Self {
        Self { min: 1, max: 10 }
    }
}

impl ReplicaBounds {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Clamp any requested target into the bounds
    pub fn clamp(&self, target: i64) -> u32 {
        target.clamp(self.min as i64, self.max as i64) as u32
    }

    pub fn contains(&self, replicas: u32) -> bool {
        (self.min..=self.max).contains(&replicas)
    }
}

/// Diagnostics attached to every step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Replica count read before the action; used for the cost term
    pub replicas_before: u32,
    /// Replica count requested after clamping
    pub replicas_after: u32,
    /// Measured utilization percentage
    pub utilization: f64,
    pub action: Action,
    pub step_index: u64,
    /// True when the metrics source failed and utilization defaulted to zero
    pub metrics_fallback: bool,
}

/// Result of a single environment step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

/// Info returned by a reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetInfo {
    pub replicas: u32,
}

/// Experience tuple handed to learning policies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub observation: Observation,
    pub action: Action,
    pub reward: f64,
    pub next_observation: Observation,
}

/// One row of a training or inference history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: u64,
    pub timestamp: i64,
    pub action: Action,
    pub utilization: f64,
    pub replicas_before: u32,
    pub replicas_after: u32,
    pub reward: f64,
    pub metrics_fallback: bool,
}

impl StepRecord {
    pub fn from_outcome(outcome: &StepOutcome) -> Self {
        Self {
            step: outcome.info.step_index,
            timestamp: chrono::Utc::now().timestamp(),
            action: outcome.info.action,
            utilization: outcome.info.utilization,
            replicas_before: outcome.info.replicas_before,
            replicas_after: outcome.info.replicas_after,
            reward: outcome.reward,
            metrics_fallback: outcome.info.metrics_fallback,
        }
    }
}

/// Summary of a bounded training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub policy: String,
    pub steps: usize,
    pub total_reward: f64,
    pub mean_reward: f64,
    pub final_replicas: u32,
    pub records: Vec<StepRecord>,
}

/// Summary of an inference run once it stops
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub cycles: u64,
    pub skipped: u64,
    pub total_reward: f64,
}
