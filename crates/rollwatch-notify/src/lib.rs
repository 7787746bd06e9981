//! rollwatch-notify — tells humans and CI what a run did.
//!
//! Every report is turned into a [`Notification`] (a structured summary
//! plus a short rendering) and fanned out to the configured channels.
//! Channel failures are logged and dropped; they never change a run's
//! verdict.

pub mod channel;
pub mod error;
pub mod notification;
pub mod notifier;

pub use channel::{Channel, CiChannel, WebhookChannel, workflow_commands};
pub use error::{NotifyError, NotifyResult};
pub use notification::{Notification, NotificationStatus, StepLine};
pub use notifier::Notifier;
