//! rollwatch.toml configuration parser.
//!
//! Every field is optional; missing values fall back to the defaults
//! below. Layering is defaults < file < environment < CLI flags (the CLI
//! applies its own overrides on top of [`RollwatchConfig::load`]).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// File name looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "rollwatch.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RollwatchConfig {
    pub health: HealthConfig,
    pub rollback: RollbackConfig,
    pub directory: DirectoryConfig,
    pub notify: NotifyConfig,
}

/// Health probe and sampling window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Path appended to the deployment URL (e.g., "/health").
    pub endpoint: String,
    /// Timeout per health request (e.g., "30s").
    pub timeout: String,
    /// Pause between two probes of a window (e.g., "10s").
    pub interval: String,
    /// Window error rate (percent) above which the window is unhealthy.
    pub error_threshold_percent: f64,
    /// Response time (ms) above which a check, or a window average, is unhealthy.
    pub response_time_threshold_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            endpoint: "/health".to_string(),
            timeout: "30s".to_string(),
            interval: "10s".to_string(),
            error_threshold_percent: 5.0,
            response_time_threshold_ms: 5000,
        }
    }
}

/// Rollback orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackConfig {
    /// Length of the monitoring window that decides whether to roll back.
    pub timeout: String,
    /// Attempts at listing deployment history before degrading to "no history".
    pub max_retries: u32,
    /// Wait after promotion before verifying health.
    pub settle_delay: String,
    /// Length of the post-rollback verification window.
    pub verify_window: String,
    /// Roll back automatically when monitoring finds the deployment unhealthy.
    pub auto_rollback: bool,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            timeout: "5m".to_string(),
            max_retries: 3,
            settle_delay: "10s".to_string(),
            verify_window: "30s".to_string(),
            auto_rollback: true,
        }
    }
}

/// Deployment Directory API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub api_url: String,
    pub project_id: Option<String>,
    pub team_id: Option<String>,
    /// Bearer token. Prefer `ROLLWATCH_TOKEN` over writing it to disk.
    pub token: Option<String>,
    /// Number of deployments fetched when looking for a stable one.
    pub history_limit: u32,
    /// Timeout per directory API call (e.g., "30s").
    pub timeout: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.vercel.com".to_string(),
            project_id: None,
            team_id: None,
            token: None,
            history_limit: 10,
            timeout: "30s".to_string(),
        }
    }
}

/// Notification channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Emit summaries through the tracing subscriber.
    pub log: bool,
    /// Emit GitHub Actions workflow commands on stdout.
    pub ci_annotations: bool,
    /// Append the JSON summary to this file (e.g., $GITHUB_STEP_SUMMARY).
    pub result_file: Option<String>,
    /// Chat webhook receiving `{ "text": ..., "summary": ... }`.
    pub webhook_url: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            log: true,
            ci_annotations: false,
            result_file: None,
            webhook_url: None,
        }
    }
}

impl RollwatchConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration: an explicit file must exist; otherwise
    /// `rollwatch.toml` in the working directory is used when present.
    /// Environment overrides are applied last, then the result is validated.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `ROLLWATCH_*` overrides using the given lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("ROLLWATCH_TOKEN") {
            self.directory.token = Some(token);
        }
        if let Some(project) = non_empty("ROLLWATCH_PROJECT_ID") {
            self.directory.project_id = Some(project);
        }
        if let Some(team) = non_empty("ROLLWATCH_TEAM_ID") {
            self.directory.team_id = Some(team);
        }
        if let Some(api) = non_empty("ROLLWATCH_API_URL") {
            self.directory.api_url = api;
        }
        if let Some(hook) = non_empty("ROLLWATCH_WEBHOOK_URL") {
            self.notify.webhook_url = Some(hook);
        }
        debug!(
            token_set = self.directory.token.is_some(),
            api_url = %self.directory.api_url,
            "environment overrides applied"
        );
    }

    /// Check that every duration parses and every threshold is usable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.health_interval()?.is_zero() {
            return Err(ConfigError::Invalid {
                key: "health.interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.health_timeout()?;
        self.monitor_window()?;
        self.settle_delay()?;
        self.verify_window()?;
        self.directory_timeout()?;

        if !self.health.error_threshold_percent.is_finite()
            || self.health.error_threshold_percent < 0.0
        {
            return Err(ConfigError::Invalid {
                key: "health.error_threshold_percent",
                reason: format!("{} is not a percentage", self.health.error_threshold_percent),
            });
        }
        if !self.health.endpoint.starts_with('/') {
            return Err(ConfigError::Invalid {
                key: "health.endpoint",
                reason: "must start with '/'".to_string(),
            });
        }
        Ok(())
    }

    pub fn health_timeout(&self) -> ConfigResult<Duration> {
        duration_setting("health.timeout", &self.health.timeout)
    }

    pub fn health_interval(&self) -> ConfigResult<Duration> {
        duration_setting("health.interval", &self.health.interval)
    }

    pub fn monitor_window(&self) -> ConfigResult<Duration> {
        duration_setting("rollback.timeout", &self.rollback.timeout)
    }

    pub fn settle_delay(&self) -> ConfigResult<Duration> {
        duration_setting("rollback.settle_delay", &self.rollback.settle_delay)
    }

    pub fn verify_window(&self) -> ConfigResult<Duration> {
        duration_setting("rollback.verify_window", &self.rollback.verify_window)
    }

    pub fn directory_timeout(&self) -> ConfigResult<Duration> {
        duration_setting("directory.timeout", &self.directory.timeout)
    }
}

fn duration_setting(key: &'static str, value: &str) -> ConfigResult<Duration> {
    parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
        key,
        value: value.to_string(),
    })
}

/// Parse a duration string like "5s", "500ms", "1m".
///
/// A plain number is read as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.trim().parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.trim().parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        let mins = mins.trim().parse::<u64>().ok()?;
        mins.checked_mul(60).map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
