//! `rollwatch monitor` — watch a deployment, roll back when unhealthy.

use std::path::Path;

use anyhow::Result;
use tracing::info;

use rollwatch_notify::Notification;
use rollwatch_rollout::{MonitorOutcome, Report};

use super::Overrides;

pub async fn run(
    config: Option<&Path>,
    overrides: &Overrides,
    url: &str,
    json: bool,
) -> Result<bool> {
    let mut config = super::load_config(config)?;
    overrides.apply(&mut config);
    config.validate()?;

    let orchestrator = super::orchestrator(&config, config.rollback.auto_rollback)?;
    info!(
        %url,
        window = %config.rollback.timeout,
        auto_rollback = config.rollback.auto_rollback,
        "monitoring deployment"
    );

    let outcome = orchestrator.monitor_and_rollback(url).await;
    super::print_result(json, &outcome, &render(&outcome))?;
    Ok(outcome.success())
}

fn render(outcome: &MonitorOutcome) -> String {
    let mut text = Notification::from_report(Report::Health(outcome.summary())).render();
    if let Some(rollback) = outcome.rollback() {
        text.push('\n');
        text.push_str(&Notification::from_report(Report::Rollback(rollback)).render());
    }
    text
}
