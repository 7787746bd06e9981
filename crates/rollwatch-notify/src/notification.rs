//! Structured run summary shared by every channel.

use std::fmt::Write as _;

use serde::Serialize;

use rollwatch_health::{HealthWindowSummary, WindowMetrics};
use rollwatch_rollout::{Report, RollbackReason, RollbackResult, StepOutcome};

/// Overall verdict of the reported run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Healthy,
    Unhealthy,
    RollbackSucceeded,
    RollbackFailed,
}

impl NotificationStatus {
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Unhealthy | Self::RollbackFailed)
    }

    fn headline(self) -> &'static str {
        match self {
            Self::Healthy => "Deployment healthy",
            Self::Unhealthy => "Deployment unhealthy",
            Self::RollbackSucceeded => "Rollback succeeded",
            Self::RollbackFailed => "Rollback failed",
        }
    }
}

/// One audit trail entry, flattened to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepLine {
    pub description: String,
    pub outcome: String,
}

/// Machine-readable summary of a health window or a rollback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub status: NotificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RollbackReason>,
    pub url: String,
    /// Epoch milliseconds at which the reported run started.
    pub timestamp: u64,
    pub previous_deployment: Option<String>,
    pub new_deployment: Option<String>,
    pub issues: Vec<String>,
    pub steps: Vec<StepLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<WindowMetrics>,
}

impl Notification {
    pub fn from_report(report: Report<'_>) -> Self {
        match report {
            Report::Health(summary) => Self::from_health(summary),
            Report::Rollback(result) => Self::from_rollback(result),
        }
    }

    fn from_health(summary: &HealthWindowSummary) -> Self {
        Self {
            status: if summary.healthy() {
                NotificationStatus::Healthy
            } else {
                NotificationStatus::Unhealthy
            },
            reason: None,
            url: summary.url().to_string(),
            timestamp: summary.started_at(),
            previous_deployment: None,
            new_deployment: None,
            issues: summary.issues().iter().map(|i| i.message.clone()).collect(),
            steps: Vec::new(),
            metrics: Some(summary.metrics().clone()),
        }
    }

    fn from_rollback(result: &RollbackResult) -> Self {
        Self {
            status: if result.success() {
                NotificationStatus::RollbackSucceeded
            } else {
                NotificationStatus::RollbackFailed
            },
            reason: Some(result.reason()),
            url: result.target_url().to_string(),
            timestamp: result.timestamp(),
            previous_deployment: result.previous_deployment().map(|d| d.id.clone()),
            new_deployment: result.new_deployment().map(|d| d.id.clone()),
            issues: result.issues().iter().map(|i| i.message.clone()).collect(),
            // Sent from inside the notification step, which is still
            // pending at that point; only settled steps are reported.
            steps: result
                .steps()
                .iter()
                .filter(|s| s.outcome != StepOutcome::Pending)
                .map(|s| StepLine {
                    description: s.description.clone(),
                    outcome: s.outcome.to_string(),
                })
                .collect(),
            metrics: result.verification().map(|v| v.metrics().clone()),
        }
    }

    /// Single-line headline, e.g. `Rollback failed for https://shop (health_check_failure)`.
    pub fn title(&self) -> String {
        match self.reason {
            Some(reason) => format!("{} for {} ({reason})", self.status.headline(), self.url),
            None => format!("{} for {}", self.status.headline(), self.url),
        }
    }

    /// Short human rendering.
    pub fn render(&self) -> String {
        let mut out = self.title();

        if let Some(m) = &self.metrics {
            let _ = write!(
                out,
                "\n  checks: {} ({} failed, {:.1}% errors, avg {:.0}ms)",
                m.total_checks, m.error_count, m.error_rate_percent, m.average_response_time_ms
            );
        }
        if let Some(prev) = &self.previous_deployment {
            let _ = write!(out, "\n  rolled back to: {prev}");
            if let Some(new) = self.new_deployment.as_ref().filter(|n| *n != prev) {
                let _ = write!(out, " (now {new})");
            }
        }
        if !self.steps.is_empty() {
            out.push_str("\n  steps:");
            for (n, step) in self.steps.iter().enumerate() {
                let _ = write!(out, "\n    {}. {}: {}", n + 1, step.description, step.outcome);
            }
        }
        if !self.issues.is_empty() {
            out.push_str("\n  issues:");
            for issue in &self.issues {
                let _ = write!(out, "\n    - {issue}");
            }
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
