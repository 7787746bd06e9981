//! Rollback policy — timings and switches for one orchestrator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use rollwatch_core::{ConfigResult, RollwatchConfig};

/// How long to watch, how to verify, and whether to act at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackPolicy {
    /// Monitoring window that decides whether to roll back.
    pub monitor_window: Duration,
    /// Pause between probes, for both monitoring and verification.
    pub interval: Duration,
    /// Wait after promotion so routing can converge before verifying.
    pub settle_delay: Duration,
    /// Post-rollback verification window.
    pub verify_window: Duration,
    /// Number of deployments fetched when looking for a stable one.
    pub history_limit: u32,
    /// Roll back automatically when monitoring finds the deployment unhealthy.
    pub auto_rollback: bool,
}

impl Default for RollbackPolicy {
    fn default() -> Self {
        Self {
            monitor_window: Duration::from_secs(300),
            interval: Duration::from_secs(10),
            settle_delay: Duration::from_secs(10),
            verify_window: Duration::from_secs(30),
            history_limit: 10,
            auto_rollback: true,
        }
    }
}

impl RollbackPolicy {
    pub fn from_config(config: &RollwatchConfig) -> ConfigResult<Self> {
        Ok(Self {
            monitor_window: config.monitor_window()?,
            interval: config.health_interval()?,
            settle_delay: config.settle_delay()?,
            verify_window: config.verify_window()?,
            history_limit: config.directory.history_limit,
            auto_rollback: config.rollback.auto_rollback,
        })
    }
}
