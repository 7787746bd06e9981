//! Rollback results and the audit trail they carry.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use rollwatch_core::{Issue, epoch_millis};
use rollwatch_directory::{DeploymentRecord, DirectoryError};
use rollwatch_health::HealthWindowSummary;

/// Phase of a monitoring/rollback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPhase {
    Idle,
    Monitoring,
    /// Monitoring found the deployment healthy; nothing else happens.
    HealthyDone,
    Unhealthy,
    FetchingHistory,
    SelectingStable,
    Promoting,
    VerifyingHealth,
    Notifying,
    Succeeded,
    Failed,
}

impl RollbackPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::HealthyDone | Self::Succeeded | Self::Failed)
    }
}

/// Why a rollback was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackReason {
    HealthCheckFailure,
    Manual,
}

impl fmt::Display for RollbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HealthCheckFailure => "health_check_failure",
            Self::Manual => "manual",
        })
    }
}

/// Terminal failures of a rollback. None of them is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RollbackFailure {
    #[error("no deployment history available")]
    NoHistoryAvailable,

    #[error("no stable deployment available to roll back to")]
    NoStableDeploymentAvailable,

    #[error("promotion of {deployment_id} failed: {message}")]
    PromotionFailed {
        deployment_id: String,
        status: Option<u16>,
        message: String,
    },
}

impl RollbackFailure {
    pub(crate) fn promotion(deployment_id: &str, err: DirectoryError) -> Self {
        let status = match &err {
            DirectoryError::PromotionFailed { status, .. } => Some(*status),
            _ => None,
        };
        Self::PromotionFailed {
            deployment_id: deployment_id.to_string(),
            status,
            message: err.to_string(),
        }
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Recorded before the action; still pending if the run was interrupted.
    Pending,
    Succeeded { detail: String },
    Failed { message: String },
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("Pending"),
            Self::Succeeded { detail } => write!(f, "Done: {detail}"),
            Self::Failed { message } => write!(f, "Failed: {message}"),
        }
    }
}

/// One entry of the append-only audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackStep {
    pub description: String,
    pub outcome: StepOutcome,
}

/// Handle to a step appended with [`RollbackResult::begin_step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StepId(usize);

/// Outcome of one rollback attempt.
///
/// Built by the orchestrator, one per `perform_rollback` call, and
/// returned by value once the run is over.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollbackResult {
    reason: RollbackReason,
    target_url: String,
    timestamp: u64,
    finished_at: Option<u64>,
    triggering_issues: Vec<Issue>,
    issues: Vec<Issue>,
    steps: Vec<RollbackStep>,
    previous_deployment: Option<DeploymentRecord>,
    new_deployment: Option<DeploymentRecord>,
    verification: Option<HealthWindowSummary>,
    phase: RollbackPhase,
    failed_at: Option<RollbackPhase>,
    failure: Option<RollbackFailure>,
    executed: bool,
    success: bool,
}

impl RollbackResult {
    pub(crate) fn begin(
        reason: RollbackReason,
        triggering_issues: Vec<Issue>,
        target_url: &str,
    ) -> Self {
        Self {
            reason,
            target_url: target_url.to_string(),
            timestamp: epoch_millis(),
            finished_at: None,
            issues: triggering_issues.clone(),
            triggering_issues,
            steps: Vec::new(),
            previous_deployment: None,
            new_deployment: None,
            verification: None,
            phase: RollbackPhase::Idle,
            failed_at: None,
            failure: None,
            executed: false,
            success: false,
        }
    }

    pub(crate) fn enter(&mut self, phase: RollbackPhase) {
        debug!(
            url = %self.target_url,
            from = ?self.phase,
            to = ?phase,
            "rollback phase transition"
        );
        self.phase = phase;
    }

    pub(crate) fn begin_step(&mut self, description: impl Into<String>) -> StepId {
        self.steps.push(RollbackStep {
            description: description.into(),
            outcome: StepOutcome::Pending,
        });
        StepId(self.steps.len() - 1)
    }

    pub(crate) fn complete_step(&mut self, step: StepId, detail: impl Into<String>) {
        self.steps[step.0].outcome = StepOutcome::Succeeded {
            detail: detail.into(),
        };
    }

    pub(crate) fn fail_step(&mut self, step: StepId, message: impl Into<String>) {
        self.steps[step.0].outcome = StepOutcome::Failed {
            message: message.into(),
        };
    }

    /// Record a terminal failure in the current phase.
    pub(crate) fn abort(&mut self, step: StepId, failure: RollbackFailure) {
        self.fail_step(step, failure.to_string());
        self.issues.push(Issue::rollback(failure.to_string()));
        self.failed_at = Some(self.phase);
        self.failure = Some(failure);
    }

    pub(crate) fn set_previous(&mut self, deployment: DeploymentRecord) {
        self.previous_deployment = Some(deployment);
    }

    pub(crate) fn set_promoted(&mut self, deployment: DeploymentRecord) {
        self.executed = true;
        self.new_deployment = Some(deployment);
    }

    pub(crate) fn set_verification(&mut self, summary: HealthWindowSummary) {
        if !summary.healthy() {
            self.failed_at = Some(RollbackPhase::VerifyingHealth);
            self.issues.extend(summary.issues().iter().cloned());
        }
        self.verification = Some(summary);
    }

    /// Assign the verdict. Notification does not take part in it, so
    /// this runs before the notification step.
    pub(crate) fn decide(&mut self) {
        self.success = self.failure.is_none()
            && self.executed
            && self.verification.as_ref().is_some_and(|v| v.healthy());
    }

    /// Enter the terminal phase matching the verdict.
    pub(crate) fn conclude(&mut self) {
        self.finished_at = Some(epoch_millis());
        self.enter(if self.success {
            RollbackPhase::Succeeded
        } else {
            RollbackPhase::Failed
        });
    }

    pub fn reason(&self) -> RollbackReason {
        self.reason
    }

    /// URL the run was started for (the production alias).
    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Epoch milliseconds at which the rollback started.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn finished_at(&self) -> Option<u64> {
        self.finished_at
    }

    pub fn triggering_issues(&self) -> &[Issue] {
        &self.triggering_issues
    }

    /// Triggering issues, then post-rollback and failure issues.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn steps(&self) -> &[RollbackStep] {
        &self.steps
    }

    /// The stable deployment selected as the rollback target.
    pub fn previous_deployment(&self) -> Option<&DeploymentRecord> {
        self.previous_deployment.as_ref()
    }

    /// The directory's record after promotion.
    pub fn new_deployment(&self) -> Option<&DeploymentRecord> {
        self.new_deployment.as_ref()
    }

    pub fn verification(&self) -> Option<&HealthWindowSummary> {
        self.verification.as_ref()
    }

    pub fn phase(&self) -> RollbackPhase {
        self.phase
    }

    /// Phase in which the run went wrong, if it did.
    pub fn failed_at(&self) -> Option<RollbackPhase> {
        self.failed_at
    }

    pub fn failure(&self) -> Option<&RollbackFailure> {
        self.failure.as_ref()
    }

    /// Whether promotion happened, regardless of the verification verdict.
    pub fn executed(&self) -> bool {
        self.executed
    }

    /// Promotion succeeded and the post-rollback window was healthy.
    pub fn success(&self) -> bool {
        self.success
    }
}

/// What a `monitor` run ended with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MonitorOutcome {
    /// The deployment passed its monitoring window.
    Healthy { summary: HealthWindowSummary },
    /// The deployment failed and automatic rollback is disabled.
    Unhealthy { summary: HealthWindowSummary },
    /// The deployment failed and a rollback was attempted.
    RolledBack {
        summary: HealthWindowSummary,
        rollback: RollbackResult,
    },
}

impl MonitorOutcome {
    /// The monitoring window's summary.
    pub fn summary(&self) -> &HealthWindowSummary {
        match self {
            Self::Healthy { summary } | Self::Unhealthy { summary } => summary,
            Self::RolledBack { summary, .. } => summary,
        }
    }

    pub fn rollback(&self) -> Option<&RollbackResult> {
        match self {
            Self::RolledBack { rollback, .. } => Some(rollback),
            _ => None,
        }
    }

    /// Production ends up healthy: either it already was, or the
    /// rollback restored a healthy deployment.
    pub fn success(&self) -> bool {
        match self {
            Self::Healthy { .. } => true,
            Self::Unhealthy { .. } => false,
            Self::RolledBack { rollback, .. } => rollback.success(),
        }
    }

    pub fn phase(&self) -> RollbackPhase {
        match self {
            Self::Healthy { .. } => RollbackPhase::HealthyDone,
            Self::Unhealthy { .. } => RollbackPhase::Failed,
            Self::RolledBack { rollback, .. } => rollback.phase(),
        }
    }
}
