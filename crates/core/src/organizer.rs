//! Collaborator contract for post-sync library organization.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result record produced by an organizer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizerResult {
    pub processed: usize,
    pub new: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub errors: usize,
}

#[derive(Debug, Error)]
#[error("organizer failed: {0}")]
pub struct OrganizerError(pub String);

/// In-process organizer collaborator, invoked after each non-dry-run
/// reconcile.
///
/// Implementations consume the output, organized, and cache directories from
/// configuration and must not modify the tracking file. The sync engine folds
/// the returned counts into its cycle summary.
#[async_trait]
pub trait Organizer: Send + Sync {
    async fn organize(&self) -> Result<OrganizerResult, OrganizerError>;
}
