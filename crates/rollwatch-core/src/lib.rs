//! rollwatch-core — shared types for the rollwatch workspace.
//!
//! Holds the pieces every other crate agrees on:
//!
//! - **`issue`** — the tagged `IssueKind` taxonomy used to explain why a
//!   probe, a sampling window, or a rollback is considered unhealthy.
//! - **`config`** — `rollwatch.toml` parsing, environment overrides, and
//!   humanized duration strings (`"30s"`, `"500ms"`, `"5m"`).
//! - **`error`** — configuration errors.

pub mod config;
pub mod error;
pub mod issue;

pub use config::{
    DirectoryConfig, HealthConfig, NotifyConfig, RollbackConfig, RollwatchConfig, parse_duration,
};
pub use error::{ConfigError, ConfigResult};
pub use issue::{Issue, IssueKind};

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
