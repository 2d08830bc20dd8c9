use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::eligibility::Credentials;

/// Order identifier assigned at confirm time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document the applicant referenced (resume, identity proof, certificate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// What the seeker told us about the applicant during `init`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicantSnapshot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<f64>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub documents: Vec<ApplicantDocument>,
    /// Extra person tags, keyed by lower-cased tag code.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ApplicantSnapshot {
    /// Flatten the snapshot into the attribute map the eligibility engine reads.
    pub fn credentials(&self) -> Credentials {
        let mut credentials = self.attributes.clone();

        if !self.name.is_empty() {
            credentials.insert("name".to_string(), json!(self.name));
        }
        if let Some(gender) = &self.gender {
            credentials.insert("gender".to_string(), json!(gender.to_ascii_lowercase()));
        }
        if let Some(age) = self.age {
            credentials.insert("age".to_string(), json!(age));
        }
        if let Some(years) = self.experience_years {
            credentials.insert("experience_years".to_string(), json!(years));
        }
        // one boolean per entry so criteria can demand a single skill, language or document
        let skills = self.skills.iter().filter_map(|skill| flag("skill", skill));
        let languages = self
            .languages
            .iter()
            .filter_map(|language| flag("language", language));
        let documents = self.documents.iter().flat_map(|document| {
            [Some(document.name.as_str()), document.kind.as_deref()]
                .into_iter()
                .flatten()
                .filter_map(|label| flag("document", label))
        });
        for key in skills.chain(languages).chain(documents) {
            credentials.insert(key, json!(true));
        }

        credentials
    }
}

/// `flag("skill", "Forklift Driving")` gives `skill_forklift_driving`; blank labels give none.
fn flag(prefix: &str, label: &str) -> Option<String> {
    let words: Vec<String> = label
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return None;
    }
    Some(format!("{prefix}_{}", words.join("_")))
}

/// Lifecycle of a confirmed application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    ApplicationAccepted,
    ApplicationRejected,
    AssessmentInProgress,
    OfferExtended,
    OfferAccepted,
    OfferRejected,
    Cancelled,
}

impl ApplicationStatus {
    pub fn code(self) -> &'static str {
        match self {
            ApplicationStatus::ApplicationAccepted => "APPLICATION_ACCEPTED",
            ApplicationStatus::ApplicationRejected => "APPLICATION_REJECTED",
            ApplicationStatus::AssessmentInProgress => "ASSESSMENT_IN_PROGRESS",
            ApplicationStatus::OfferExtended => "OFFER_EXTENDED",
            ApplicationStatus::OfferAccepted => "OFFER_ACCEPTED",
            ApplicationStatus::OfferRejected => "OFFER_REJECTED",
            ApplicationStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Cancelled)
    }

    /// `cancelled` is final and nothing returns to `application_accepted`.
    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        if self == next || self.is_terminal() {
            return false;
        }
        next != ApplicationStatus::ApplicationAccepted
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Persistent application created by a successful confirm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub offering_id: String,
    pub transaction_id: String,
    pub applicant: ApplicantSnapshot,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationRecord {
    pub fn view(&self) -> ApplicationView {
        ApplicationView {
            application_id: self.id.clone(),
            offering_id: self.offering_id.clone(),
            transaction_id: self.transaction_id.clone(),
            applicant_name: self.applicant.name.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Outward-facing summary returned by the admin routes.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub offering_id: String,
    pub transaction_id: String,
    pub applicant_name: String,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
