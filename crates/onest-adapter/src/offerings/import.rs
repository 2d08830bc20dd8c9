use std::fmt;
use std::io::Read;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::domain::{Offering, OfferingKind, OfferingLocation, ProviderInfo, SalaryRange};
use crate::eligibility::{validate_criteria, CriteriaError, EligibilityCriteria};

/// Parse a catalog seed file into offerings, validating every row's criteria.
pub fn parse_offerings<R: Read>(reader: R) -> Result<Vec<Offering>, OfferingImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut offerings = Vec::new();

    for (index, row) in csv_reader.deserialize::<OfferingRow>().enumerate() {
        // header occupies line 1
        let line = index + 2;
        let row = row.map_err(OfferingImportError::Csv)?;
        offerings.push(row.into_offering(line)?);
    }

    Ok(offerings)
}

#[derive(Debug, Deserialize)]
struct OfferingRow {
    id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    kind: Option<String>,
    name: String,
    #[serde(default)]
    description: String,
    provider_id: String,
    provider_name: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    industry: Option<String>,
    #[serde(default)]
    city: String,
    #[serde(default)]
    state: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    job_type: Option<String>,
    #[serde(default)]
    salary_min: Option<u64>,
    #[serde(default)]
    salary_max: Option<u64>,
    vacancies: u32,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    eligibility: Option<String>,
}

impl OfferingRow {
    fn into_offering(self, line: usize) -> Result<Offering, OfferingImportError> {
        if self.id.is_empty() {
            return Err(OfferingImportError::MissingId { line });
        }

        let kind = match self.kind.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("job") => OfferingKind::Job,
            Some("scheme") => OfferingKind::Scheme,
            Some(other) => {
                return Err(OfferingImportError::UnknownKind {
                    line,
                    kind: other.to_string(),
                })
            }
        };

        let eligibility = match self.eligibility {
            None => EligibilityCriteria::default(),
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => EligibilityCriteria(map),
                _ => return Err(OfferingImportError::MalformedCriteria { line }),
            },
        };
        validate_criteria(&eligibility)
            .map_err(|source| OfferingImportError::InvalidCriteria { line, source })?;

        let salary = match (self.salary_min, self.salary_max) {
            (Some(min), Some(max)) => Some(SalaryRange { min, max }),
            (Some(min), None) => Some(SalaryRange { min, max: min }),
            (None, Some(max)) => Some(SalaryRange { min: 0, max }),
            (None, None) => None,
        };

        Ok(Offering {
            id: self.id,
            kind,
            name: self.name,
            description: self.description,
            provider: ProviderInfo {
                id: self.provider_id,
                name: self.provider_name,
                industry: self.industry,
            },
            location: OfferingLocation {
                city: self.city,
                state: self.state,
            },
            job_type: self.job_type,
            salary,
            vacancies: self.vacancies,
            eligibility,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[derive(Debug)]
pub enum OfferingImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingId { line: usize },
    UnknownKind { line: usize, kind: String },
    MalformedCriteria { line: usize },
    InvalidCriteria { line: usize, source: CriteriaError },
}

impl fmt::Display for OfferingImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferingImportError::Io(err) => write!(f, "failed to read offering seed: {err}"),
            OfferingImportError::Csv(err) => write!(f, "invalid offering CSV data: {err}"),
            OfferingImportError::MissingId { line } => write!(f, "line {line}: id is empty"),
            OfferingImportError::UnknownKind { line, kind } => {
                write!(f, "line {line}: unknown offering kind '{kind}'")
            }
            OfferingImportError::MalformedCriteria { line } => {
                write!(f, "line {line}: eligibility must be a JSON object")
            }
            OfferingImportError::InvalidCriteria { line, source } => {
                write!(f, "line {line}: {source}")
            }
        }
    }
}

impl std::error::Error for OfferingImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OfferingImportError::Io(err) => Some(err),
            OfferingImportError::Csv(err) => Some(err),
            OfferingImportError::InvalidCriteria { source, .. } => Some(source),
            OfferingImportError::MissingId { .. }
            | OfferingImportError::UnknownKind { .. }
            | OfferingImportError::MalformedCriteria { .. } => None,
        }
    }
}

impl From<std::io::Error> for OfferingImportError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
