//! Offerings (jobs and schemes): catalog storage, search filtering, and CSV seeding.

pub mod domain;
pub mod import;
pub mod repository;
pub mod router;
pub mod search;

use std::sync::Arc;

use tracing::info;

use crate::eligibility::validate_criteria;

pub use domain::{Offering, OfferingKind, OfferingLocation, ProviderInfo, SalaryRange};
pub use import::{parse_offerings, OfferingImportError};
pub use repository::{OfferingError, OfferingRepository};
pub use router::offering_router;
pub use search::SearchFilter;

/// Registers offerings after checking their criteria are well formed.
#[derive(Clone)]
pub struct OfferingCatalog {
    repository: Arc<dyn OfferingRepository>,
}

impl OfferingCatalog {
    pub fn new(repository: Arc<dyn OfferingRepository>) -> Self {
        Self { repository }
    }

    pub fn register(&self, offering: Offering) -> Result<Offering, OfferingError> {
        validate_criteria(&offering.eligibility)?;
        let stored = self.repository.insert(offering)?;
        info!(offering_id = %stored.id, vacancies = stored.vacancies, "offering registered");
        Ok(stored)
    }

    pub fn get(&self, id: &str) -> Result<Option<Offering>, OfferingError> {
        self.repository.get(id)
    }

    pub fn search(&self, filter: &SearchFilter) -> Result<Vec<Offering>, OfferingError> {
        let offerings = self.repository.list()?;
        Ok(filter.apply(&offerings).cloned().collect())
    }
}
