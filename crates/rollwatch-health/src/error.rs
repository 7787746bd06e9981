use thiserror::Error;

/// Failures that prevent a probe from issuing its request at all.
///
/// Failures of the round trip itself are not errors; they are reported
/// as unhealthy [`HealthCheckResult`](crate::HealthCheckResult)s.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("invalid health check URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
