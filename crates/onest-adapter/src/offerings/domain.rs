use serde::{Deserialize, Serialize};

use crate::eligibility::EligibilityCriteria;

/// Whether an offering is a job posting or a scheme with limited slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferingKind {
    #[default]
    Job,
    Scheme,
}

/// Employer or scheme issuer publishing offerings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OfferingLocation {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: u64,
    pub max: u64,
}

/// A job or scheme with a finite number of vacancies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offering {
    pub id: String,
    #[serde(default)]
    pub kind: OfferingKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub provider: ProviderInfo,
    #[serde(default)]
    pub location: OfferingLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<SalaryRange>,
    pub vacancies: u32,
    #[serde(default)]
    pub eligibility: EligibilityCriteria,
}
