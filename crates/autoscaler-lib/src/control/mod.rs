//! Control loop driving the environment with a decision policy
//!
//! Two modes share the same observe, decide, act, settle cycle:
//! - training: a bounded number of steps, feeding every transition back
//!   to the policy and aborting on the first failure
//! - inference: an open-ended loop that degrades on failure and stops
//!   only when shutdown is signalled between steps

mod r#loop;

#[cfg(test)]
mod tests;

pub use r#loop::{ControlLoop, ControlLoopBuilder, LoopConfig};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which of the two loop drivers to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    Training,
    #[default]
    Inference,
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopMode::Training => f.write_str("training"),
            LoopMode::Inference => f.write_str("inference"),
        }
    }
}

impl FromStr for LoopMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "training" | "train" => Ok(LoopMode::Training),
            "inference" | "infer" | "run" => Ok(LoopMode::Inference),
            other => Err(format!("unknown loop mode '{}'", other)),
        }
    }
}
