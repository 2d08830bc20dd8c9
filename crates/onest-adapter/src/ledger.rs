//! Vacancy accounting for offerings.

use std::sync::Arc;

use tracing::debug;

/// Result of an atomic "decrement if positive" against the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decrement {
    Reserved { remaining: u32 },
    AlreadyZero,
}

/// Store primitives the ledger relies on. Each call must be a single atomic operation.
pub trait VacancyStore: Send + Sync {
    fn decrement_if_positive(&self, offering_id: &str) -> Result<Decrement, LedgerError>;
    fn increment(&self, offering_id: &str) -> Result<u32, LedgerError>;
    fn available(&self, offering_id: &str) -> Result<u32, LedgerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("no vacancies left for offering {offering_id}")]
    Exhausted { offering_id: String },
    #[error("offering {0} not found")]
    UnknownOffering(String),
    #[error("vacancy store unavailable: {0}")]
    Unavailable(String),
}

/// Reserve and release vacancies without ever letting a counter go below zero.
#[derive(Clone)]
pub struct ResourceLedger {
    store: Arc<dyn VacancyStore>,
}

impl ResourceLedger {
    pub fn new(store: Arc<dyn VacancyStore>) -> Self {
        Self { store }
    }

    /// Take one vacancy, returning how many remain.
    pub fn reserve(&self, offering_id: &str) -> Result<u32, LedgerError> {
        match self.store.decrement_if_positive(offering_id)? {
            Decrement::Reserved { remaining } => {
                debug!(offering_id, remaining, "vacancy reserved");
                Ok(remaining)
            }
            Decrement::AlreadyZero => Err(LedgerError::Exhausted {
                offering_id: offering_id.to_string(),
            }),
        }
    }

    /// Give a vacancy back. Only call for an application whose reservation succeeded.
    pub fn release(&self, offering_id: &str) -> Result<u32, LedgerError> {
        let available = self.store.increment(offering_id)?;
        debug!(offering_id, available, "vacancy released");
        Ok(available)
    }

    pub fn available(&self, offering_id: &str) -> Result<u32, LedgerError> {
        self.store.available(offering_id)
    }
}
