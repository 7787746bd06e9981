//! Delivery channels.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{NotifyError, NotifyResult};
use crate::notification::Notification;

/// One configured destination for notifications.
#[derive(Debug, Clone)]
pub enum Channel {
    /// Structured log events through the tracing subscriber.
    Log,
    /// GitHub Actions workflow commands and an optional JSON result file.
    Ci(CiChannel),
    /// Chat webhook.
    Webhook(WebhookChannel),
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Ci(_) => "ci",
            Self::Webhook(_) => "webhook",
        }
    }

    pub async fn deliver(&self, notification: &Notification) -> NotifyResult<()> {
        match self {
            Self::Log => {
                log_notification(notification);
                Ok(())
            }
            Self::Ci(ci) => ci.deliver(notification),
            Self::Webhook(hook) => hook.deliver(notification).await,
        }
    }
}

fn log_notification(n: &Notification) {
    let rendering = n.render();
    if n.status.is_failure() {
        warn!(
            status = ?n.status,
            url = %n.url,
            previous = ?n.previous_deployment,
            issues = n.issues.len(),
            "{rendering}"
        );
    } else {
        info!(
            status = ?n.status,
            url = %n.url,
            previous = ?n.previous_deployment,
            "{rendering}"
        );
    }
}

/// CI output: workflow commands on stdout plus a JSON-lines result file.
#[derive(Debug, Clone, Default)]
pub struct CiChannel {
    annotations: bool,
    result_file: Option<PathBuf>,
}

impl CiChannel {
    pub fn new(annotations: bool, result_file: Option<PathBuf>) -> Self {
        Self {
            annotations,
            result_file,
        }
    }

    fn deliver(&self, notification: &Notification) -> NotifyResult<()> {
        if self.annotations {
            let mut stdout = std::io::stdout().lock();
            for line in workflow_commands(notification) {
                // A closed stdout is not worth failing the run over.
                let _ = writeln!(stdout, "{line}");
            }
        }
        if let Some(path) = &self.result_file {
            append_json_line(path, notification)?;
            debug!(path = %path.display(), "notification appended to result file");
        }
        Ok(())
    }
}

/// Workflow commands for `notification`: an `error` or `notice` line
/// with the title, then a `warning` per issue.
pub fn workflow_commands(n: &Notification) -> Vec<String> {
    let level = if n.status.is_failure() { "error" } else { "notice" };
    let mut lines = Vec::with_capacity(n.issues.len() + 1);
    lines.push(format!(
        "::{level} title={}::{}",
        escape_property("rollwatch"),
        escape_data(&n.render())
    ));
    let title = escape_property(&n.url);
    lines.extend(
        n.issues
            .iter()
            .map(|issue| format!("::warning title={title}::{}", escape_data(issue))),
    );
    lines
}

/// Escaping for the message part of a workflow command.
fn escape_data(s: &str) -> String {
    s.replace('%', "%25").replace('\r', "%0D").replace('\n', "%0A")
}

/// Escaping for `key=value` properties of a workflow command.
fn escape_property(s: &str) -> String {
    escape_data(s).replace(':', "%3A").replace(',', "%2C")
}

fn append_json_line(path: &Path, notification: &Notification) -> NotifyResult<()> {
    let line = notification.to_json()?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| writeln!(file, "{line}"))
        .map_err(|source| NotifyError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// Posts `{ "text": <rendering>, "summary": <notification> }` to a chat webhook.
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    http: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(url: &str, timeout: Duration) -> NotifyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rollwatch-notify/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn deliver(&self, notification: &Notification) -> NotifyResult<()> {
        let payload = json!({
            "text": notification.render(),
            "summary": notification,
        });
        let resp = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::WebhookTransport {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::WebhookStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        debug!(url = %self.url, "webhook delivered");
        Ok(())
    }
}
