//! Issue taxonomy.
//!
//! Every reason for an unhealthy verdict is an [`Issue`]: a tagged
//! [`IssueKind`] that callers can match on, plus the human-readable
//! message that ends up in logs and notifications.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of problem an issue describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    /// The health request never completed (refused, timed out, DNS).
    Transport,
    /// The endpoint answered with a 5xx.
    ServerError { status: u16 },
    /// The endpoint answered with a 4xx.
    ClientError { status: u16 },
    /// A single response exceeded the response time threshold.
    SlowResponse { response_time_ms: u64 },
    /// The health body reported a status other than `healthy`/`ok`.
    ReportedStatus { status: String },
    /// The body was not a health payload and the status was not 200.
    BadHealthPayload,
    /// The probe itself failed before a request could be issued.
    ProbeError,
    /// Window error rate exceeded the configured threshold.
    ErrorRate {
        rate_percent: f64,
        threshold_percent: f64,
    },
    /// Window average response time exceeded the configured threshold.
    AverageLatency { average_ms: f64, threshold_ms: u64 },
    /// The window closed without a single check.
    NoChecks,
    /// A rollback step failed.
    Rollback,
}

/// A single reason for an unhealthy verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(flatten)]
    pub kind: IssueKind,
    pub message: String,
}

impl Issue {
    pub fn transport(cause: impl fmt::Display) -> Self {
        Self::new(IssueKind::Transport, format!("Health check failed: {cause}"))
    }

    pub fn server_error(status: u16) -> Self {
        Self::new(
            IssueKind::ServerError { status },
            format!("Server error: HTTP {status}"),
        )
    }

    pub fn client_error(status: u16) -> Self {
        Self::new(
            IssueKind::ClientError { status },
            format!("Client error: HTTP {status}"),
        )
    }

    pub fn slow_response(response_time_ms: u64) -> Self {
        Self::new(
            IssueKind::SlowResponse { response_time_ms },
            format!("Slow response: {response_time_ms}ms"),
        )
    }

    pub fn reported_status(status: &str) -> Self {
        Self::new(
            IssueKind::ReportedStatus {
                status: status.to_string(),
            },
            format!("Health endpoint reports: {status}"),
        )
    }

    pub fn bad_health_payload() -> Self {
        Self::new(
            IssueKind::BadHealthPayload,
            "Health endpoint not responding correctly",
        )
    }

    /// A probe error; the message is carried through verbatim.
    pub fn probe_error(message: impl Into<String>) -> Self {
        Self::new(IssueKind::ProbeError, message)
    }

    pub fn error_rate(rate_percent: f64, threshold_percent: f64) -> Self {
        Self::new(
            IssueKind::ErrorRate {
                rate_percent,
                threshold_percent,
            },
            format!("Error rate {rate_percent:.1}% exceeds threshold {threshold_percent}%"),
        )
    }

    pub fn average_latency(average_ms: f64, threshold_ms: u64) -> Self {
        Self::new(
            IssueKind::AverageLatency {
                average_ms,
                threshold_ms,
            },
            format!("Average response time {average_ms:.0}ms exceeds threshold {threshold_ms}ms"),
        )
    }

    pub fn no_checks() -> Self {
        Self::new(IssueKind::NoChecks, "No health checks completed")
    }

    pub fn rollback(message: impl Into<String>) -> Self {
        Self::new(IssueKind::Rollback, message)
    }

    fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
