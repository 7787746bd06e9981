//! `rollwatch health` — one-off probe.

use std::path::Path;

use anyhow::Result;

use rollwatch_notify::Notification;
use rollwatch_rollout::Report;

pub async fn run(config: Option<&Path>, url: &str, json: bool) -> Result<bool> {
    let config = super::load_config(config)?;
    let summary = super::sampler(&config)?.sample_once(url).await;

    let text = Notification::from_report(Report::Health(&summary)).render();
    super::print_result(json, &summary, &text)?;
    Ok(summary.healthy())
}
