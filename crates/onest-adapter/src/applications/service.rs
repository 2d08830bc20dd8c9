use std::sync::Arc;

use tracing::{error, info};

use super::domain::{ApplicationId, ApplicationRecord, ApplicationStatus};
use super::repository::{ApplicationRepository, RepositoryError};
use crate::clock::Clock;
use crate::ledger::{LedgerError, ResourceLedger};

/// Provider-side reads and status changes for confirmed applications.
#[derive(Clone)]
pub struct ApplicationService {
    repository: Arc<dyn ApplicationRepository>,
    ledger: ResourceLedger,
    clock: Arc<dyn Clock>,
}

/// What a status update did.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub previous: ApplicationStatus,
    pub record: ApplicationRecord,
    pub vacancy_released: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ApplicationService {
    pub fn new(
        repository: Arc<dyn ApplicationRepository>,
        ledger: ResourceLedger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            ledger,
            clock,
        }
    }

    pub fn get(&self, id: &ApplicationId) -> Result<ApplicationRecord, ApplicationServiceError> {
        self.repository
            .fetch(id)?
            .ok_or(ApplicationServiceError::Repository(RepositoryError::NotFound))
    }

    /// Move an application to `next`. Entering `cancelled` gives its vacancy back.
    ///
    /// A failed release is logged rather than returned: the status change has already
    /// been committed and cannot be repeated.
    pub fn update_status(
        &self,
        id: &ApplicationId,
        next: ApplicationStatus,
    ) -> Result<StatusUpdate, ApplicationServiceError> {
        let change = self.repository.transition(id, next, self.clock.now())?;
        info!(
            application_id = %id,
            from = %change.previous,
            to = %next,
            "application status changed"
        );

        let mut vacancy_released = false;
        if next == ApplicationStatus::Cancelled && change.previous != ApplicationStatus::Cancelled
        {
            match self.ledger.release(&change.record.offering_id) {
                Ok(_) => vacancy_released = true,
                Err(err) => error!(
                    application_id = %id,
                    offering_id = %change.record.offering_id,
                    error = %err,
                    "vacancy release failed after cancellation"
                ),
            }
        }

        Ok(StatusUpdate {
            previous: change.previous,
            record: change.record,
            vacancy_released,
        })
    }

    pub fn cancel(&self, id: &ApplicationId) -> Result<StatusUpdate, ApplicationServiceError> {
        self.update_status(id, ApplicationStatus::Cancelled)
    }
}
