//! Rollback orchestrator — drives the monitoring/rollback state machine.
//!
//! Each public operation builds and returns a fresh result; nothing is
//! carried over between calls, so one orchestrator can be reused, and
//! concurrent runs simply use separate orchestrators.

use tracing::{debug, info, warn};

use rollwatch_core::Issue;
use rollwatch_directory::{DeploymentDirectory, find_last_stable};
use rollwatch_health::{HealthWindowSampler, Probe};

use crate::policy::RollbackPolicy;
use crate::result::{
    MonitorOutcome, RollbackFailure, RollbackPhase, RollbackReason, RollbackResult,
};
use crate::{NotificationSink, Report};

/// Sequences monitoring, stable selection, promotion, verification and
/// notification.
pub struct RollbackOrchestrator<P, D, N> {
    sampler: HealthWindowSampler<P>,
    directory: D,
    notifier: N,
    policy: RollbackPolicy,
}

impl<P, D, N> RollbackOrchestrator<P, D, N>
where
    P: Probe,
    D: DeploymentDirectory,
    N: NotificationSink,
{
    pub fn new(
        sampler: HealthWindowSampler<P>,
        directory: D,
        notifier: N,
        policy: RollbackPolicy,
    ) -> Self {
        Self {
            sampler,
            directory,
            notifier,
            policy,
        }
    }

    pub fn policy(&self) -> &RollbackPolicy {
        &self.policy
    }

    pub fn sampler(&self) -> &HealthWindowSampler<P> {
        &self.sampler
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Watch `url` for the monitoring window and roll back if it is unhealthy.
    pub async fn monitor_and_rollback(&self, url: &str) -> MonitorOutcome {
        transition(url, RollbackPhase::Idle, RollbackPhase::Monitoring);
        let summary = self
            .sampler
            .sample(url, self.policy.monitor_window, self.policy.interval)
            .await;

        if summary.healthy() {
            transition(url, RollbackPhase::Monitoring, RollbackPhase::HealthyDone);
            info!(%url, "deployment passed monitoring, no rollback needed");
            self.notifier.send(Report::Health(&summary)).await;
            return MonitorOutcome::Healthy { summary };
        }

        transition(url, RollbackPhase::Monitoring, RollbackPhase::Unhealthy);
        if !self.policy.auto_rollback {
            warn!(
                %url,
                issues = summary.issues().len(),
                "deployment unhealthy, automatic rollback disabled"
            );
            self.notifier.send(Report::Health(&summary)).await;
            return MonitorOutcome::Unhealthy { summary };
        }

        warn!(%url, issues = summary.issues().len(), "deployment unhealthy, rolling back");
        let rollback = self
            .perform_rollback(
                RollbackReason::HealthCheckFailure,
                summary.issues().to_vec(),
                url,
            )
            .await;
        MonitorOutcome::RolledBack { summary, rollback }
    }

    /// Roll the production alias behind `url` back to the last stable deployment.
    pub async fn perform_rollback(
        &self,
        reason: RollbackReason,
        triggering_issues: Vec<Issue>,
        url: &str,
    ) -> RollbackResult {
        let mut run = RollbackResult::begin(reason, triggering_issues, url);
        info!(%url, %reason, "rollback started");

        self.execute(&mut run, url).await;
        run.decide();

        run.enter(RollbackPhase::Notifying);
        let step = run.begin_step("Send notification");
        self.notifier.send(Report::Rollback(&run)).await;
        run.complete_step(step, "notification dispatched");

        run.conclude();
        if run.success() {
            info!(%url, phase = ?run.phase(), "rollback succeeded");
        } else {
            warn!(
                %url,
                executed = run.executed(),
                failed_at = ?run.failed_at(),
                failure = ?run.failure(),
                "rollback did not restore a healthy deployment"
            );
        }
        run
    }

    /// History → stable selection → promotion → settle → verification.
    /// Returns early on the first terminal failure.
    async fn execute(&self, run: &mut RollbackResult, url: &str) {
        run.enter(RollbackPhase::FetchingHistory);
        let step = run.begin_step("Fetch deployment history");
        let history = self.directory.list_deployments(self.policy.history_limit).await;
        if history.is_empty() {
            run.abort(step, RollbackFailure::NoHistoryAvailable);
            return;
        }
        run.complete_step(step, format!("{} deployments", history.len()));

        run.enter(RollbackPhase::SelectingStable);
        let step = run.begin_step("Select last stable deployment");
        let Some(stable) = find_last_stable(&history).cloned() else {
            run.abort(step, RollbackFailure::NoStableDeploymentAvailable);
            return;
        };
        run.complete_step(step, stable.id.clone());
        run.set_previous(stable.clone());
        debug!(
            deployment = %stable.id,
            created_at = stable.created_at,
            "stable deployment selected"
        );

        run.enter(RollbackPhase::Promoting);
        let step = run.begin_step(format!("Promote deployment {}", stable.id));
        let promoted = match self.directory.promote(&stable).await {
            Ok(promoted) => promoted,
            Err(e) => {
                run.abort(step, RollbackFailure::promotion(&stable.id, e));
                return;
            }
        };
        run.complete_step(step, format!("{} is now live", promoted.id));
        let verify_url = promoted
            .deployment_url()
            .or_else(|| stable.deployment_url())
            .unwrap_or_else(|| url.to_string());
        run.set_promoted(promoted);

        debug!(
            delay_ms = self.policy.settle_delay.as_millis() as u64,
            "waiting for routing to settle"
        );
        tokio::time::sleep(self.policy.settle_delay).await;

        run.enter(RollbackPhase::VerifyingHealth);
        let step = run.begin_step("Verify health after rollback");
        let verification = self
            .sampler
            .sample(&verify_url, self.policy.verify_window, self.policy.interval)
            .await;
        if verification.healthy() {
            run.complete_step(step, format!("{verify_url} healthy"));
        } else {
            run.fail_step(
                step,
                format!(
                    "{verify_url} still unhealthy ({} issues)",
                    verification.issues().len()
                ),
            );
        }
        run.set_verification(verification);
    }
}

fn transition(url: &str, from: RollbackPhase, to: RollbackPhase) {
    debug!(%url, ?from, ?to, "rollback phase transition");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use rollwatch_core::IssueKind;
    use rollwatch_directory::{
        DeploymentRecord, DeploymentState, DeploymentTarget, DirectoryError, DirectoryResult,
    };
    use rollwatch_health::{HealthCheckResult, ProbeError, Thresholds};

    use crate::result::StepOutcome;

    /// Healthy unless the URL is listed as failing.
    #[derive(Default)]
    struct FakeProbe {
        failing: HashSet<String>,
        calls: AtomicUsize,
    }

    impl FakeProbe {
        fn failing(urls: &[&str]) -> Self {
            Self {
                failing: urls.iter().map(|u| u.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Probe for FakeProbe {
        async fn check(&self, url: &str) -> Result<HealthCheckResult, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(if self.failing.contains(url) {
                HealthCheckResult::new(0, Some(502), Some(15), vec![Issue::server_error(502)])
            } else {
                HealthCheckResult::new(0, Some(200), Some(15), Vec::new())
            })
        }
    }

    struct FakeDirectory {
        deployments: Vec<DeploymentRecord>,
        promote_error: Option<DirectoryError>,
        list_calls: AtomicUsize,
        promoted: Mutex<Vec<String>>,
    }

    impl FakeDirectory {
        fn new(deployments: Vec<DeploymentRecord>) -> Self {
            Self {
                deployments,
                promote_error: None,
                list_calls: AtomicUsize::new(0),
                promoted: Mutex::new(Vec::new()),
            }
        }

        fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }

        fn promoted(&self) -> Vec<String> {
            self.promoted.lock().unwrap().clone()
        }
    }

    impl DeploymentDirectory for FakeDirectory {
        async fn list_deployments(&self, limit: u32) -> Vec<DeploymentRecord> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.deployments.iter().take(limit as usize).cloned().collect()
        }

        async fn promote(
            &self,
            deployment: &DeploymentRecord,
        ) -> DirectoryResult<DeploymentRecord> {
            self.promoted.lock().unwrap().push(deployment.id.clone());
            match &self.promote_error {
                Some(e) => Err(e.clone()),
                None => Ok(deployment.clone()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<String>>,
    }

    impl NotificationSink for RecordingSink {
        async fn send(&self, report: Report<'_>) {
            let entry = match report {
                Report::Health(s) => format!("health:{}", s.healthy()),
                Report::Rollback(r) => format!("rollback:{}:{}", r.success(), r.steps().len()),
            };
            self.sent.lock().unwrap().push(entry);
        }
    }

    const PROD: &str = "https://shop.example.app";

    fn deployment(id: &str, created_at: u64, state: DeploymentState) -> DeploymentRecord {
        DeploymentRecord {
            id: id.to_string(),
            created_at,
            state,
            target: Some(DeploymentTarget::Production),
            ready_state: Some(state),
            url: Some(format!("{id}.example.app")),
        }
    }

    fn history() -> Vec<DeploymentRecord> {
        vec![
            deployment("d0", 400, DeploymentState::Ready),
            deployment("d1", 300, DeploymentState::Ready),
            deployment("d2", 200, DeploymentState::Ready),
            deployment("d3", 100, DeploymentState::Error),
        ]
    }

    fn policy() -> RollbackPolicy {
        RollbackPolicy {
            monitor_window: Duration::from_secs(60),
            interval: Duration::from_secs(10),
            settle_delay: Duration::from_secs(10),
            verify_window: Duration::from_secs(30),
            history_limit: 10,
            auto_rollback: true,
        }
    }

    fn orchestrator(
        probe: FakeProbe,
        directory: FakeDirectory,
        policy: RollbackPolicy,
    ) -> RollbackOrchestrator<FakeProbe, FakeDirectory, RecordingSink> {
        RollbackOrchestrator::new(
            HealthWindowSampler::new(probe, Thresholds::default()),
            directory,
            RecordingSink::default(),
            policy,
        )
    }

    fn descriptions(result: &RollbackResult) -> Vec<&str> {
        result.steps().iter().map(|s| s.description.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_window_never_touches_the_directory() {
        let orch = orchestrator(FakeProbe::default(), FakeDirectory::new(history()), policy());

        let outcome = orch.monitor_and_rollback(PROD).await;

        assert!(matches!(outcome, MonitorOutcome::Healthy { .. }));
        assert!(outcome.success());
        assert_eq!(outcome.phase(), RollbackPhase::HealthyDone);
        assert_eq!(orch.directory().list_calls(), 0);
        assert!(orch.directory().promoted().is_empty());
        assert_eq!(*orch.notifier().sent.lock().unwrap(), vec!["health:true"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unhealthy_without_auto_rollback_only_reports() {
        let orch = orchestrator(
            FakeProbe::failing(&[PROD]),
            FakeDirectory::new(history()),
            RollbackPolicy {
                auto_rollback: false,
                ..policy()
            },
        );

        let outcome = orch.monitor_and_rollback(PROD).await;

        assert!(matches!(outcome, MonitorOutcome::Unhealthy { .. }));
        assert!(!outcome.success());
        assert!(!outcome.summary().issues().is_empty());
        assert_eq!(orch.directory().list_calls(), 0);
        assert_eq!(*orch.notifier().sent.lock().unwrap(), vec!["health:false"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unhealthy_deployment_is_rolled_back_to_last_stable() {
        let orch = orchestrator(
            FakeProbe::failing(&[PROD]),
            FakeDirectory::new(history()),
            policy(),
        );

        let outcome = orch.monitor_and_rollback(PROD).await;

        let rollback = outcome.rollback().expect("rollback attempted");
        assert!(rollback.success(), "steps: {:?}", rollback.steps());
        assert!(outcome.success());
        assert_eq!(rollback.reason(), RollbackReason::HealthCheckFailure);
        assert_eq!(rollback.phase(), RollbackPhase::Succeeded);
        assert_eq!(orch.directory().promoted(), vec!["d1"]);
        assert_eq!(rollback.previous_deployment().unwrap().id, "d1");
        assert_eq!(rollback.new_deployment().unwrap().id, "d1");
        assert_eq!(
            rollback.verification().unwrap().url(),
            "https://d1.example.app"
        );
        assert_eq!(rollback.triggering_issues(), outcome.summary().issues());
        // The notification already carries the verdict.
        assert_eq!(*orch.notifier().sent.lock().unwrap(), vec!["rollback:true:5"]);
        assert!(
            rollback
                .steps()
                .iter()
                .all(|s| matches!(s.outcome, StepOutcome::Succeeded { .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deployment_still_building_is_not_a_candidate() {
        // d0 is the deployment under evaluation and not READY yet.
        let mut deployments = history();
        deployments[0] = deployment("d0", 400, DeploymentState::Building);
        let orch = orchestrator(FakeProbe::default(), FakeDirectory::new(deployments), policy());

        let result = orch
            .perform_rollback(RollbackReason::Manual, Vec::new(), PROD)
            .await;

        assert_eq!(orch.directory().promoted(), vec!["d2"]);
        assert!(result.success());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_history_fails_without_promoting() {
        let orch = orchestrator(FakeProbe::default(), FakeDirectory::new(Vec::new()), policy());

        let result = orch
            .perform_rollback(RollbackReason::Manual, Vec::new(), PROD)
            .await;

        assert!(!result.success());
        assert_eq!(result.failure(), Some(&RollbackFailure::NoHistoryAvailable));
        assert!(orch.directory().promoted().is_empty());
        assert_eq!(
            descriptions(&result),
            vec!["Fetch deployment history", "Send notification"]
        );
        // Notification still goes out on failure.
        assert_eq!(*orch.notifier().sent.lock().unwrap(), vec!["rollback:false:2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn single_stable_deployment_is_not_enough() {
        let deployments = vec![
            deployment("d0", 400, DeploymentState::Ready),
            deployment("d1", 300, DeploymentState::Error),
        ];
        let orch = orchestrator(FakeProbe::default(), FakeDirectory::new(deployments), policy());

        let result = orch
            .perform_rollback(RollbackReason::Manual, Vec::new(), PROD)
            .await;

        assert_eq!(
            result.failure(),
            Some(&RollbackFailure::NoStableDeploymentAvailable)
        );
        assert_eq!(result.failed_at(), Some(RollbackPhase::SelectingStable));
        assert!(orch.directory().promoted().is_empty());
        assert!(
            result
                .issues()
                .iter()
                .any(|i| i.kind == IssueKind::Rollback)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn promotion_failure_is_terminal_and_not_retried() {
        let mut directory = FakeDirectory::new(history());
        directory.promote_error = Some(DirectoryError::PromotionFailed {
            deployment_id: "d1".to_string(),
            status: 500,
            body: "internal error".to_string(),
        });
        let probe = FakeProbe::default();
        let orch = orchestrator(probe, directory, policy());

        let result = orch
            .perform_rollback(RollbackReason::Manual, Vec::new(), PROD)
            .await;

        assert!(!result.success());
        assert!(!result.executed());
        assert_eq!(orch.directory().promoted(), vec!["d1"]);
        assert_eq!(result.failed_at(), Some(RollbackPhase::Promoting));
        let promote_step = &result.steps()[2];
        assert_eq!(promote_step.description, "Promote deployment d1");
        assert!(promote_step.outcome.to_string().starts_with("Failed: "));
        assert!(promote_step.outcome.to_string().contains("HTTP 500"));
        // No verification window ran.
        assert!(result.verification().is_none());
        assert_eq!(orch.sampler().probe().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unhealthy_after_rollback_keeps_full_trail() {
        let orch = orchestrator(
            FakeProbe::failing(&[PROD, "https://d1.example.app"]),
            FakeDirectory::new(history()),
            policy(),
        );

        let outcome = orch.monitor_and_rollback(PROD).await;
        let rollback = outcome.rollback().unwrap();

        assert!(!rollback.success());
        assert!(rollback.executed());
        assert!(rollback.failure().is_none());
        assert_eq!(rollback.failed_at(), Some(RollbackPhase::VerifyingHealth));
        assert_eq!(
            descriptions(rollback),
            vec![
                "Fetch deployment history",
                "Select last stable deployment",
                "Promote deployment d1",
                "Verify health after rollback",
                "Send notification",
            ]
        );

        let triggering = rollback.triggering_issues();
        let post = rollback.verification().unwrap().issues();
        assert!(!triggering.is_empty());
        assert!(!post.is_empty());
        assert_eq!(rollback.issues().len(), triggering.len() + post.len());
        assert!(rollback.issues().starts_with(triggering));
        assert!(rollback.issues().ends_with(post));
    }

    #[tokio::test(start_paused = true)]
    async fn verification_waits_for_settle_delay() {
        let orch = orchestrator(FakeProbe::default(), FakeDirectory::new(history()), policy());
        let started = tokio::time::Instant::now();

        orch.perform_rollback(RollbackReason::Manual, Vec::new(), PROD)
            .await;

        // 10s settle + 30s verification window.
        assert!(started.elapsed() >= Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn verification_falls_back_to_target_url() {
        let mut deployments = history();
        for d in &mut deployments {
            d.url = None;
        }
        let orch = orchestrator(FakeProbe::default(), FakeDirectory::new(deployments), policy());

        let result = orch
            .perform_rollback(RollbackReason::Manual, Vec::new(), PROD)
            .await;

        assert_eq!(result.verification().unwrap().url(), PROD);
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_rollbacks_are_independent() {
        let orch = orchestrator(FakeProbe::default(), FakeDirectory::new(history()), policy());

        let first = orch
            .perform_rollback(RollbackReason::Manual, vec![Issue::server_error(500)], PROD)
            .await;
        let second = orch
            .perform_rollback(RollbackReason::Manual, Vec::new(), PROD)
            .await;

        assert_eq!(first.steps().len(), 5);
        assert_eq!(second.steps().len(), 5);
        assert_eq!(first.triggering_issues().len(), 1);
        assert!(second.triggering_issues().is_empty());
        assert!(second.issues().is_empty());
        assert_eq!(orch.directory().list_calls(), 2);
        assert_eq!(orch.directory().promoted(), vec!["d1", "d1"]);
    }
}
