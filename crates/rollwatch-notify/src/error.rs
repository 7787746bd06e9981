//! Error types for notification channels.

use std::path::PathBuf;

use thiserror::Error;

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors raised by a single channel. The notifier logs and drops them.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("webhook {url} unreachable: {reason}")]
    WebhookTransport { url: String, reason: String },

    #[error("webhook {url} answered HTTP {status}")]
    WebhookStatus { url: String, status: u16 },
}
