//! rollwatch-health — health checking for freshly published deployments.
//!
//! Provides a single-shot HTTP health probe and a sampler that runs the
//! probe repeatedly over a bounded window, then applies threshold rules
//! to reach one verdict for the whole window.
//!
//! # Architecture
//!
//! ```text
//! HealthWindowSampler
//!   ├── Probe::check(url) → HealthCheckResult   (one per interval)
//!   ├── WindowAccumulator (chronological checks)
//!   └── finalize(thresholds) → HealthWindowSummary
//! ```
//!
//! Probes run sequentially. A probe never aborts a window: transport
//! failures and probe errors both become unhealthy checks.

pub mod error;
pub mod probe;
pub mod sampler;
pub mod summary;

pub use error::ProbeError;
pub use probe::{HttpProbe, Probe};
pub use sampler::HealthWindowSampler;
pub use summary::{
    HealthCheckResult, HealthWindowSummary, Thresholds, WindowAccumulator, WindowMetrics,
};
