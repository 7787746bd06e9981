//! Check results and window summaries.

use serde::Serialize;
use tracing::debug;

use rollwatch_core::Issue;

/// Outcome of one health probe.
///
/// `healthy` is derived from `issues` at construction and cannot drift
/// from it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheckResult {
    timestamp: u64,
    response_time_ms: Option<u64>,
    status_code: Option<u16>,
    healthy: bool,
    issues: Vec<Issue>,
}

impl HealthCheckResult {
    pub fn new(
        timestamp: u64,
        status_code: Option<u16>,
        response_time_ms: Option<u64>,
        issues: Vec<Issue>,
    ) -> Self {
        Self {
            timestamp,
            response_time_ms,
            status_code,
            healthy: issues.is_empty(),
            issues,
        }
    }

    /// Epoch milliseconds at which the check started.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// `None` when no response was received.
    pub fn response_time_ms(&self) -> Option<u64> {
        self.response_time_ms
    }

    /// `None` on transport failure.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn healthy(&self) -> bool {
        self.healthy
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }
}

/// Verdict thresholds for a sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    /// Window error rate (percent) above which the window is unhealthy.
    pub error_rate_percent: f64,
    /// Average response time (ms) above which the window is unhealthy.
    pub response_time_ms: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            error_rate_percent: 5.0,
            response_time_ms: 5000,
        }
    }
}

impl From<&rollwatch_core::HealthConfig> for Thresholds {
    fn from(config: &rollwatch_core::HealthConfig) -> Self {
        Self {
            error_rate_percent: config.error_threshold_percent,
            response_time_ms: config.response_time_threshold_ms,
        }
    }
}

/// Aggregate metrics over the checks of one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowMetrics {
    pub total_checks: u32,
    pub successful_checks: u32,
    pub error_count: u32,
    /// Mean over checks that received a response; 0 when none did.
    pub average_response_time_ms: f64,
    pub max_response_time_ms: u64,
    /// `error_count / total_checks * 100`, 0 when there are no checks.
    pub error_rate_percent: f64,
}

impl WindowMetrics {
    pub fn from_checks(checks: &[HealthCheckResult]) -> Self {
        let total_checks = checks.len() as u32;
        let successful_checks = checks.iter().filter(|c| c.healthy()).count() as u32;
        let error_count = total_checks - successful_checks;

        let timings: Vec<u64> = checks.iter().filter_map(|c| c.response_time_ms()).collect();
        let average_response_time_ms = if timings.is_empty() {
            0.0
        } else {
            timings.iter().sum::<u64>() as f64 / timings.len() as f64
        };
        let max_response_time_ms = timings.iter().copied().max().unwrap_or(0);

        let error_rate_percent = if total_checks == 0 {
            0.0
        } else {
            error_count as f64 / total_checks as f64 * 100.0
        };

        Self {
            total_checks,
            successful_checks,
            error_count,
            average_response_time_ms,
            max_response_time_ms,
            error_rate_percent,
        }
    }
}

/// Final, immutable view of one sampling window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthWindowSummary {
    url: String,
    started_at: u64,
    finished_at: u64,
    checks: Vec<HealthCheckResult>,
    metrics: WindowMetrics,
    healthy: bool,
    issues: Vec<Issue>,
}

impl HealthWindowSummary {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn started_at(&self) -> u64 {
        self.started_at
    }

    pub fn finished_at(&self) -> u64 {
        self.finished_at
    }

    /// Checks in chronological order.
    pub fn checks(&self) -> &[HealthCheckResult] {
        &self.checks
    }

    pub fn metrics(&self) -> &WindowMetrics {
        &self.metrics
    }

    pub fn healthy(&self) -> bool {
        self.healthy
    }

    /// Window-level violations first, then distinct per-check issues.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }
}

/// Collects checks while a window is open.
///
/// Consumed by [`finalize`](Self::finalize), so a window is closed at most once.
#[derive(Debug)]
pub struct WindowAccumulator {
    url: String,
    started_at: u64,
    checks: Vec<HealthCheckResult>,
}

impl WindowAccumulator {
    pub fn new(url: &str, started_at: u64) -> Self {
        Self {
            url: url.to_string(),
            started_at,
            checks: Vec::new(),
        }
    }

    pub fn push(&mut self, check: HealthCheckResult) {
        self.checks.push(check);
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Compute metrics and apply the verdict rules.
    pub fn finalize(self, thresholds: &Thresholds, finished_at: u64) -> HealthWindowSummary {
        let metrics = WindowMetrics::from_checks(&self.checks);
        let mut issues = Vec::new();

        if metrics.total_checks == 0 {
            issues.push(Issue::no_checks());
        } else {
            if metrics.error_rate_percent > thresholds.error_rate_percent {
                issues.push(Issue::error_rate(
                    metrics.error_rate_percent,
                    thresholds.error_rate_percent,
                ));
            }
            if metrics.average_response_time_ms > thresholds.response_time_ms as f64 {
                issues.push(Issue::average_latency(
                    metrics.average_response_time_ms,
                    thresholds.response_time_ms,
                ));
            }
        }
        let healthy = issues.is_empty();

        for issue in self.checks.iter().flat_map(|c| c.issues()) {
            if !issues.iter().any(|seen| seen.message == issue.message) {
                issues.push(issue.clone());
            }
        }

        debug!(
            url = %self.url,
            checks = metrics.total_checks,
            errors = metrics.error_count,
            healthy,
            "sampling window closed"
        );

        HealthWindowSummary {
            url: self.url,
            started_at: self.started_at,
            finished_at,
            checks: self.checks,
            metrics,
            healthy,
            issues,
        }
    }
}
