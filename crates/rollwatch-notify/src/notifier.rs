//! Fan-out over every configured channel.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use rollwatch_core::NotifyConfig;
use rollwatch_rollout::{NotificationSink, Report};

use crate::channel::{Channel, CiChannel, WebhookChannel};
use crate::error::NotifyResult;
use crate::notification::Notification;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends each report to all channels, one after another.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    channels: Vec<Channel>,
}

impl Notifier {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    pub fn from_config(config: &NotifyConfig) -> NotifyResult<Self> {
        let mut channels = Vec::new();
        if config.log {
            channels.push(Channel::Log);
        }
        if config.ci_annotations || config.result_file.is_some() {
            channels.push(Channel::Ci(CiChannel::new(
                config.ci_annotations,
                config.result_file.as_ref().map(PathBuf::from),
            )));
        }
        if let Some(url) = &config.webhook_url {
            channels.push(Channel::Webhook(WebhookChannel::new(url, WEBHOOK_TIMEOUT)?));
        }
        debug!(
            channels = ?channels.iter().map(Channel::name).collect::<Vec<_>>(),
            "notifier configured"
        );
        Ok(Self { channels })
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Deliver `notification` everywhere. Returns how many channels failed.
    pub async fn dispatch(&self, notification: &Notification) -> usize {
        let mut failed = 0;
        for channel in &self.channels {
            if let Err(e) = channel.deliver(notification).await {
                warn!(channel = channel.name(), error = %e, "notification not delivered");
                failed += 1;
            }
        }
        failed
    }
}

impl NotificationSink for Notifier {
    async fn send(&self, report: Report<'_>) {
        let notification = Notification::from_report(report);
        self.dispatch(&notification).await;
    }
}
