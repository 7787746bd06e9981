//! Health check probe logic.
//!
//! Performs one HTTP health check against a deployment and classifies
//! the round trip into a [`HealthCheckResult`]. No retries happen here;
//! the sampler decides how often to probe.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::debug;

use rollwatch_core::{HealthConfig, Issue, epoch_millis};

use crate::error::ProbeError;
use crate::summary::HealthCheckResult;

/// A single health check against a deployment URL.
pub trait Probe: Send + Sync {
    /// Check `url` once.
    ///
    /// Round-trip failures are returned as unhealthy results; `Err` is
    /// reserved for probes that could not issue a request at all.
    fn check(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<HealthCheckResult, ProbeError>> + Send;
}

/// Body shape of a structured health endpoint.
#[derive(Debug, Deserialize)]
struct HealthBody {
    status: String,
}

/// Probe that issues `GET <url><endpoint>` over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    response_time_threshold_ms: u64,
}

impl HttpProbe {
    /// Create a probe with explicit settings.
    pub fn new(
        endpoint: &str,
        timeout: Duration,
        response_time_threshold_ms: u64,
    ) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rollwatch-health/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            timeout,
            response_time_threshold_ms,
        })
    }

    /// Create a probe from the `[health]` section of the config.
    pub fn from_config(config: &HealthConfig, timeout: Duration) -> Result<Self, ProbeError> {
        Self::new(&config.endpoint, timeout, config.response_time_threshold_ms)
    }

    fn health_url(&self, url: &str) -> Result<reqwest::Url, ProbeError> {
        let joined = format!("{}{}", url.trim_end_matches('/'), self.endpoint);
        reqwest::Url::parse(&joined).map_err(|e| ProbeError::InvalidUrl {
            url: joined,
            reason: e.to_string(),
        })
    }

    fn describe(&self, err: &reqwest::Error) -> String {
        if err.is_timeout() {
            return format!("request timed out after {}s", self.timeout.as_secs());
        }
        let mut message = err.to_string();
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

impl Probe for HttpProbe {
    async fn check(&self, url: &str) -> Result<HealthCheckResult, ProbeError> {
        let target = self.health_url(url)?;
        let timestamp = epoch_millis();
        let started = Instant::now();

        let response = match self.client.get(target.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                let cause = self.describe(&e);
                debug!(%target, error = %cause, "health probe request failed");
                return Ok(HealthCheckResult::new(
                    timestamp,
                    None,
                    None,
                    vec![Issue::transport(cause)],
                ));
            }
        };

        let status = response.status().as_u16();
        let body = response.bytes().await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        let result = match body {
            Ok(body) => classify(
                timestamp,
                status,
                response_time_ms,
                &body,
                self.response_time_threshold_ms,
            ),
            Err(e) => {
                let cause = self.describe(&e);
                debug!(%target, status, error = %cause, "health probe body read failed");
                HealthCheckResult::new(
                    timestamp,
                    Some(status),
                    Some(response_time_ms),
                    vec![Issue::transport(cause)],
                )
            }
        };

        debug!(
            %target,
            status,
            response_time_ms,
            healthy = result.healthy(),
            "health probe completed"
        );
        Ok(result)
    }
}

/// Classify a completed round trip.
///
/// Rules are applied in order and are not exclusive.
pub fn classify(
    timestamp: u64,
    status: u16,
    response_time_ms: u64,
    body: &[u8],
    response_time_threshold_ms: u64,
) -> HealthCheckResult {
    let mut issues = Vec::new();

    if status >= 500 {
        issues.push(Issue::server_error(status));
    } else if status >= 400 {
        issues.push(Issue::client_error(status));
    }

    if response_time_ms > response_time_threshold_ms {
        issues.push(Issue::slow_response(response_time_ms));
    }

    match serde_json::from_slice::<HealthBody>(body) {
        Ok(health) => {
            if health.status != "healthy" && health.status != "ok" {
                issues.push(Issue::reported_status(&health.status));
            }
        }
        Err(_) if status != 200 => issues.push(Issue::bad_health_payload()),
        Err(_) => {}
    }

    HealthCheckResult::new(timestamp, Some(status), Some(response_time_ms), issues)
}
