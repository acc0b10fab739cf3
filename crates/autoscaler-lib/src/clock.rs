//! Injectable waiting
//!
//! Stabilization intervals and retry backoff go through [`Clock`] so tests
//! run instantly while production uses real delays.

use async_trait::async_trait;
use std::time::Duration;

/// Source of delays for the control loop
#[async_trait]
pub trait Clock: Send + Sync {
    /// Wait for the given duration
    async fn sleep(&self, duration: Duration);
}

/// Real delays backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
