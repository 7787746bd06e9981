//! HTTP client for the Deployment Directory API.
//!
//! ```text
//! GET  {api}/deployments?projectId=&limit=[&teamId=]  → { "deployments": [...] }
//! POST {api}/deployments/{id}/promote                 → opaque, status code matters
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use rollwatch_core::DirectoryConfig;

use crate::DeploymentDirectory;
use crate::error::{DirectoryError, DirectoryResult};
use crate::types::DeploymentRecord;

/// Bodies longer than this are cut when carried in errors.
const MAX_ERROR_BODY: usize = 512;

/// Entries are decoded one by one so a single malformed record does not
/// hide the rest of the history.
#[derive(Debug, Deserialize)]
struct DeploymentList {
    #[serde(default)]
    deployments: Vec<serde_json::Value>,
}

impl DeploymentList {
    fn into_records(self) -> Vec<DeploymentRecord> {
        self.deployments
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| match serde_json::from_value(raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed deployment record");
                    None
                }
            })
            .collect()
    }
}

/// Promotion responses either wrap the record or are the record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PromoteResponse {
    Wrapped { deployment: DeploymentRecord },
    Bare(DeploymentRecord),
}

/// Bearer-authenticated client for one project.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    api_url: String,
    project_id: String,
    team_id: Option<String>,
    token: String,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl DirectoryClient {
    /// Create a client.
    ///
    /// `max_retries` is the number of listing attempts before the
    /// history is reported empty; 0 is treated as 1.
    pub fn new(
        api_url: &str,
        project_id: &str,
        token: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> DirectoryResult<Self> {
        if token.trim().is_empty() {
            return Err(DirectoryError::MissingToken);
        }
        if project_id.trim().is_empty() {
            return Err(DirectoryError::MissingProject);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rollwatch-directory/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DirectoryError::Client(e.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            team_id: None,
            token: token.to_string(),
            max_attempts: max_retries.max(1),
            retry_backoff: Duration::from_millis(500),
        })
    }

    /// Create a client from the `[directory]` section of the config.
    pub fn from_config(
        config: &DirectoryConfig,
        timeout: Duration,
        max_retries: u32,
    ) -> DirectoryResult<Self> {
        let token = config.token.as_deref().ok_or(DirectoryError::MissingToken)?;
        let project = config.project_id.as_deref().ok_or(DirectoryError::MissingProject)?;
        let client = Self::new(&config.api_url, project, token, timeout, max_retries)?;
        Ok(match config.team_id.as_deref() {
            Some(team) => client.with_team(team),
            None => client,
        })
    }

    /// Scope requests to a team.
    pub fn with_team(mut self, team_id: &str) -> Self {
        self.team_id = Some(team_id.to_string());
        self
    }

    /// Base delay between listing attempts; doubles after each failure.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Fetch one page of history, surfacing every failure.
    pub async fn fetch_deployments(&self, limit: u32) -> DirectoryResult<Vec<DeploymentRecord>> {
        let url = format!("{}/deployments", self.api_url);
        let mut query = vec![
            ("projectId", self.project_id.clone()),
            ("limit", limit.to_string()),
        ];
        if let Some(team) = &self.team_id {
            query.push(("teamId", team.clone()));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&query)
            .send()
            .await
            .map_err(|e| DirectoryError::Transport {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = read_body(response).await;
            return Err(DirectoryError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let list: DeploymentList = response.json().await.map_err(|e| DirectoryError::Decode {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        let received = list.deployments.len();
        let records = list.into_records();
        debug!(received, kept = records.len(), "deployment history fetched");
        Ok(records)
    }

    fn team_query(&self) -> Vec<(&'static str, String)> {
        self.team_id
            .iter()
            .map(|team| ("teamId", team.clone()))
            .collect()
    }
}

impl DeploymentDirectory for DirectoryClient {
    async fn list_deployments(&self, limit: u32) -> Vec<DeploymentRecord> {
        let mut backoff = self.retry_backoff;

        for attempt in 1..=self.max_attempts {
            match self.fetch_deployments(limit).await {
                Ok(deployments) => return deployments,
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        error = %e,
                        "deployment history fetch failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    warn!(
                        attempt,
                        error = %e,
                        "deployment history unavailable, continuing without it"
                    );
                    return Vec::new();
                }
            }
        }
        Vec::new()
    }

    async fn promote(&self, deployment: &DeploymentRecord) -> DirectoryResult<DeploymentRecord> {
        let url = format!("{}/deployments/{}/promote", self.api_url, deployment.id);
        info!(deployment = %deployment.id, "promoting deployment");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .query(&self.team_query())
            .send()
            .await
            .map_err(|e| DirectoryError::Transport {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(DirectoryError::PromotionFailed {
                deployment_id: deployment.id.clone(),
                status: status.as_u16(),
                body: truncate(body),
            });
        }

        // Past the status code the response is opaque; fall back to the
        // snapshot we promoted when it does not describe a deployment.
        let promoted = match serde_json::from_str::<PromoteResponse>(&body) {
            Ok(PromoteResponse::Wrapped { deployment }) | Ok(PromoteResponse::Bare(deployment)) => {
                deployment
            }
            Err(_) => {
                debug!(deployment = %deployment.id, "promotion response carried no record");
                deployment.clone()
            }
        };
        info!(deployment = %promoted.id, status = status.as_u16(), "deployment promoted");
        Ok(promoted)
    }
}

async fn read_body(response: reqwest::Response) -> String {
    truncate(response.text().await.unwrap_or_default())
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}
