use chrono::{DateTime, Utc};

use super::domain::{ApplicationId, ApplicationRecord, ApplicationStatus};

/// Result of an atomic status change.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub previous: ApplicationStatus,
    pub record: ApplicationRecord,
}

/// Storage abstraction for confirmed applications. Records are never deleted.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    /// Apply `next` in one step, enforcing [`ApplicationStatus::can_transition_to`].
    fn transition(
        &self,
        id: &ApplicationId,
        next: ApplicationStatus,
        at: DateTime<Utc>,
    ) -> Result<StatusChange, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("application already exists")]
    Conflict,
    #[error("application not found")]
    NotFound,
    #[error("cannot move application from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
