//! `rollwatch rollback` — manual rollback to the last stable deployment.

use std::path::Path;

use anyhow::Result;

use rollwatch_notify::Notification;
use rollwatch_rollout::{Report, RollbackReason};

pub async fn run(config: Option<&Path>, url: &str, json: bool) -> Result<bool> {
    let config = super::load_config(config)?;
    let orchestrator = super::orchestrator(&config, true)?;

    let result = orchestrator
        .perform_rollback(RollbackReason::Manual, Vec::new(), url)
        .await;

    let text = Notification::from_report(Report::Rollback(&result)).render();
    super::print_result(json, &result, &text)?;
    Ok(result.success())
}
