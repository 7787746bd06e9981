//! Health window sampler — probes a deployment repeatedly over a bounded
//! window and reaches a single verdict.
//!
//! Sampling intentionally spreads load over wall-clock time: probes run
//! one after another with a sleep in between, never in parallel.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use rollwatch_core::{Issue, epoch_millis};

use crate::probe::Probe;
use crate::summary::{HealthCheckResult, HealthWindowSummary, Thresholds, WindowAccumulator};

/// Runs a [`Probe`] over a time window.
#[derive(Debug, Clone)]
pub struct HealthWindowSampler<P> {
    probe: P,
    thresholds: Thresholds,
}

impl<P: Probe> HealthWindowSampler<P> {
    pub fn new(probe: P, thresholds: Thresholds) -> Self {
        Self { probe, thresholds }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Probe `url` every `interval` until `duration` has elapsed.
    ///
    /// The elapsed check happens before each probe, so a zero-length
    /// window completes no checks and is reported unhealthy.
    pub async fn sample(
        &self,
        url: &str,
        duration: Duration,
        interval: Duration,
    ) -> HealthWindowSummary {
        info!(
            %url,
            duration_ms = duration.as_millis() as u64,
            interval_ms = interval.as_millis() as u64,
            "sampling window opened"
        );

        let started = Instant::now();
        let mut window = WindowAccumulator::new(url, epoch_millis());

        while started.elapsed() < duration {
            let check = self.check_once(url).await;
            debug!(
                %url,
                n = window.len() + 1,
                healthy = check.healthy(),
                status = ?check.status_code(),
                response_time_ms = ?check.response_time_ms(),
                "health check recorded"
            );
            window.push(check);
            tokio::time::sleep(interval).await;
        }

        let summary = window.finalize(&self.thresholds, epoch_millis());
        self.log_verdict(&summary);
        summary
    }

    /// Probe `url` exactly once and close the window around that check.
    pub async fn sample_once(&self, url: &str) -> HealthWindowSummary {
        let mut window = WindowAccumulator::new(url, epoch_millis());
        window.push(self.check_once(url).await);
        let summary = window.finalize(&self.thresholds, epoch_millis());
        self.log_verdict(&summary);
        summary
    }

    /// Run the probe, downgrading a probe error into an unhealthy check.
    async fn check_once(&self, url: &str) -> HealthCheckResult {
        match self.probe.check(url).await {
            Ok(check) => check,
            Err(e) => {
                warn!(%url, error = %e, "health probe errored");
                let issue = Issue::probe_error(e.to_string());
                HealthCheckResult::new(epoch_millis(), None, None, vec![issue])
            }
        }
    }

    fn log_verdict(&self, summary: &HealthWindowSummary) {
        let metrics = summary.metrics();
        if summary.healthy() {
            info!(
                url = %summary.url(),
                checks = metrics.total_checks,
                error_rate = format_args!("{:.1}%", metrics.error_rate_percent),
                avg_ms = format_args!("{:.0}", metrics.average_response_time_ms),
                "deployment healthy"
            );
        } else {
            warn!(
                url = %summary.url(),
                checks = metrics.total_checks,
                error_rate = format_args!("{:.1}%", metrics.error_rate_percent),
                avg_ms = format_args!("{:.0}", metrics.average_response_time_ms),
                issues = summary.issues().len(),
                "deployment unhealthy"
            );
        }
    }
}
