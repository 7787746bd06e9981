//! Deployment records as reported by the directory.
//!
//! Records are read-only snapshots; nothing here is cached between
//! orchestration runs.

use serde::{Deserialize, Serialize};

/// Platform-reported build/lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentState {
    Building,
    Ready,
    Error,
    Canceled,
    /// Any state this client does not know about (QUEUED, INITIALIZING, ...).
    #[serde(other)]
    Unknown,
}

/// Which alias a deployment was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentTarget {
    Production,
    Preview,
    #[serde(other)]
    Unknown,
}

/// One deployment known to the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawDeployment")]
pub struct DeploymentRecord {
    pub id: String,
    /// Epoch milliseconds.
    pub created_at: u64,
    pub state: DeploymentState,
    pub target: Option<DeploymentTarget>,
    /// Reported separately from `state`; the two can disagree.
    pub ready_state: Option<DeploymentState>,
    /// Deployment hostname or URL, when the directory reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl DeploymentRecord {
    /// READY, built for production, and reported ready.
    pub fn is_stable(&self) -> bool {
        self.state == DeploymentState::Ready
            && self.target == Some(DeploymentTarget::Production)
            && self.ready_state == Some(DeploymentState::Ready)
    }

    /// Absolute URL of this deployment; bare hostnames are served over HTTPS.
    pub fn deployment_url(&self) -> Option<String> {
        let url = self.url.as_deref()?.trim();
        if url.is_empty() {
            None
        } else if url.contains("://") {
            Some(url.to_string())
        } else {
            Some(format!("https://{url}"))
        }
    }
}

/// Wire shape: older endpoints say `uid`/`created`, newer ones
/// `id`/`createdAt`, and some send both.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDeployment {
    id: Option<String>,
    uid: Option<String>,
    created_at: Option<u64>,
    created: Option<u64>,
    state: Option<DeploymentState>,
    target: Option<DeploymentTarget>,
    ready_state: Option<DeploymentState>,
    url: Option<String>,
}

impl TryFrom<RawDeployment> for DeploymentRecord {
    type Error = String;

    fn try_from(raw: RawDeployment) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .or(raw.uid)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| "deployment record without id".to_string())?;

        Ok(Self {
            id,
            created_at: raw.created_at.or(raw.created).unwrap_or(0),
            state: raw.state.or(raw.ready_state).unwrap_or(DeploymentState::Unknown),
            target: raw.target,
            ready_state: raw.ready_state,
            url: raw.url,
        })
    }
}

/// Select the deployment to roll back to.
///
/// Keeps stable deployments, newest first, and returns the second one:
/// the newest stable deployment is taken to be the one currently being
/// evaluated. `None` when fewer than two stable deployments exist.
pub fn find_last_stable(deployments: &[DeploymentRecord]) -> Option<&DeploymentRecord> {
    let mut stable: Vec<&DeploymentRecord> =
        deployments.iter().filter(|d| d.is_stable()).collect();
    stable.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    stable.get(1).copied()
}
