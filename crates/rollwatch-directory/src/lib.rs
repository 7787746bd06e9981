//! rollwatch-directory — client for the Deployment Directory API.
//!
//! The directory knows every deployment of a project (state, target,
//! readiness) and can promote one of them to the production alias.
//!
//! Listing is best effort: failures degrade to an empty history after
//! `max_retries` attempts. Promotion is not: a failed promotion is
//! returned as [`DirectoryError::PromotionFailed`].

pub mod client;
pub mod error;
pub mod types;

use std::future::Future;

pub use client::DirectoryClient;
pub use error::{DirectoryError, DirectoryResult};
pub use types::{DeploymentRecord, DeploymentState, DeploymentTarget, find_last_stable};

/// Read and promote deployments.
pub trait DeploymentDirectory: Send + Sync {
    /// Most recent deployments, newest first. Never fails: an unreachable
    /// directory yields an empty list.
    fn list_deployments(&self, limit: u32) -> impl Future<Output = Vec<DeploymentRecord>> + Send;

    /// Promote `deployment` to the production alias and return the
    /// directory's view of it afterwards.
    fn promote(
        &self,
        deployment: &DeploymentRecord,
    ) -> impl Future<Output = DirectoryResult<DeploymentRecord>> + Send;
}
