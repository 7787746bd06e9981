//! rollwatch-rollout — automated rollback of unhealthy deployments.
//!
//! This crate provides the state machine that watches a freshly
//! published deployment and, when it turns out unhealthy, rolls the
//! production alias back to the last stable deployment.
//!
//! # Components
//!
//! - **`policy`** — Timings and switches (`RollbackPolicy`)
//! - **`controller`** — The orchestrator (`monitor_and_rollback`, `perform_rollback`)
//! - **`result`** — Results, phases, and the step audit trail
//!
//! # Phases
//!
//! ```text
//! Idle → Monitoring → HealthyDone
//!                   → Unhealthy → FetchingHistory → SelectingStable → Promoting
//!                                → VerifyingHealth → Notifying → Succeeded | Failed
//! ```
//!
//! Promotion is never retried. Notification is always attempted and
//! never changes the verdict.

pub mod controller;
pub mod policy;
pub mod result;

use std::future::Future;

use rollwatch_health::HealthWindowSummary;

pub use controller::RollbackOrchestrator;
pub use policy::RollbackPolicy;
pub use result::{
    MonitorOutcome, RollbackFailure, RollbackPhase, RollbackReason, RollbackResult, RollbackStep,
    StepOutcome,
};

/// Something worth telling a human about.
#[derive(Debug, Clone, Copy)]
pub enum Report<'a> {
    Health(&'a HealthWindowSummary),
    Rollback(&'a RollbackResult),
}

/// Best-effort outbound channel for run summaries.
///
/// Implementations swallow their own failures; a failed notification
/// never changes the outcome of the run it describes.
pub trait NotificationSink: Send + Sync {
    fn send(&self, report: Report<'_>) -> impl Future<Output = ()> + Send;
}
