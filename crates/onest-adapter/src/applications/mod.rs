//! Confirmed applications: status lifecycle, storage contract, and provider admin routes.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicantDocument, ApplicantSnapshot, ApplicationId, ApplicationRecord, ApplicationStatus,
    ApplicationView,
};
pub use repository::{ApplicationRepository, RepositoryError, StatusChange};
pub use router::{application_router, StatusUpdateRequest};
pub use service::{ApplicationService, ApplicationServiceError, StatusUpdate};
