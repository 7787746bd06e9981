//! Subcommands and the wiring they share.

pub mod health;
pub mod monitor;
pub mod rollback;

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use rollwatch_core::RollwatchConfig;
use rollwatch_directory::{
    DeploymentDirectory, DeploymentRecord, DirectoryClient, DirectoryError, DirectoryResult,
};
use rollwatch_health::{HealthWindowSampler, HttpProbe, Thresholds};
use rollwatch_notify::Notifier;
use rollwatch_rollout::{RollbackOrchestrator, RollbackPolicy};

/// Command-line flags layered over the loaded configuration.
#[derive(Debug, Default)]
pub struct Overrides {
    pub window_secs: Option<u64>,
    pub no_rollback: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut RollwatchConfig) {
        if let Some(secs) = self.window_secs {
            config.rollback.timeout = format!("{secs}s");
        }
        if self.no_rollback {
            config.rollback.auto_rollback = false;
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<RollwatchConfig> {
    RollwatchConfig::load(path).context("failed to load configuration")
}

pub fn sampler(config: &RollwatchConfig) -> Result<HealthWindowSampler<HttpProbe>> {
    let probe = HttpProbe::from_config(&config.health, config.health_timeout()?)
        .context("failed to build health probe")?;
    Ok(HealthWindowSampler::new(probe, Thresholds::from(&config.health)))
}

/// Directory behind the orchestrator.
///
/// Report-only monitoring never lists or promotes, so it runs without
/// directory credentials.
pub enum Directory {
    Client(DirectoryClient),
    ReportOnly,
}

impl DeploymentDirectory for Directory {
    async fn list_deployments(&self, limit: u32) -> Vec<DeploymentRecord> {
        match self {
            Self::Client(client) => client.list_deployments(limit).await,
            Self::ReportOnly => Vec::new(),
        }
    }

    async fn promote(&self, deployment: &DeploymentRecord) -> DirectoryResult<DeploymentRecord> {
        match self {
            Self::Client(client) => client.promote(deployment).await,
            Self::ReportOnly => Err(DirectoryError::Client(
                "no deployment directory configured for report-only monitoring".to_string(),
            )),
        }
    }
}

pub type Orchestrator = RollbackOrchestrator<HttpProbe, Directory, Notifier>;

/// Wire an orchestrator. The directory client, and with it the token and
/// project, is only required when the run may roll back.
pub fn orchestrator(config: &RollwatchConfig, may_roll_back: bool) -> Result<Orchestrator> {
    let directory = if may_roll_back {
        let client = DirectoryClient::from_config(
            &config.directory,
            config.directory_timeout()?,
            config.rollback.max_retries,
        )
        .context("deployment directory is not usable")?;
        Directory::Client(client)
    } else {
        debug!("report-only run, deployment directory not configured");
        Directory::ReportOnly
    };
    let notifier =
        Notifier::from_config(&config.notify).context("failed to set up notifications")?;
    let policy = RollbackPolicy::from_config(config)?;
    Ok(RollbackOrchestrator::new(sampler(config)?, directory, notifier, policy))
}

/// Print `value` as pretty JSON, or `text` as is.
pub fn print_result<T: Serialize>(json: bool, value: &T, text: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}
