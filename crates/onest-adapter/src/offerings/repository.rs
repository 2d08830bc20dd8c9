use super::domain::Offering;
use crate::eligibility::CriteriaError;

/// Catalog storage. Vacancy counters are mutated only through [`crate::ledger::VacancyStore`].
pub trait OfferingRepository: Send + Sync {
    fn insert(&self, offering: Offering) -> Result<Offering, OfferingError>;
    fn get(&self, id: &str) -> Result<Option<Offering>, OfferingError>;
    fn list(&self) -> Result<Vec<Offering>, OfferingError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OfferingError {
    #[error("offering {0} already exists")]
    Duplicate(String),
    #[error("invalid eligibility criteria: {0}")]
    InvalidCriteria(#[from] CriteriaError),
    #[error("offering store unavailable: {0}")]
    Unavailable(String),
}
