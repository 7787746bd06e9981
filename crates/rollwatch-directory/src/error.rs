//! Error types for the deployment directory client.

use thiserror::Error;

/// Result type alias for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors that can occur talking to the Deployment Directory API.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    #[error("deployment directory token is not configured (set ROLLWATCH_TOKEN)")]
    MissingToken,

    #[error("deployment directory project is not configured (set ROLLWATCH_PROJECT_ID)")]
    MissingProject,

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("promotion of {deployment_id} failed with HTTP {status}: {body}")]
    PromotionFailed {
        deployment_id: String,
        status: u16,
        body: String,
    },
}

impl DirectoryError {
    /// Whether repeating the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
