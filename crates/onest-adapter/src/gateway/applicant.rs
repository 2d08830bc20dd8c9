use serde_json::{json, Value};

use crate::applications::{ApplicantDocument, ApplicantSnapshot};
use crate::network::{Customer, Descriptor, Tag};

const WORK_EXPERIENCE: &str = "WORK_EXPERIENCE";

/// Build the applicant snapshot from the customer block of an `init` fulfillment.
pub(crate) fn snapshot_from(customer: &Customer) -> ApplicantSnapshot {
    let person = &customer.person;

    let mut attributes = serde_json::Map::new();
    for tag in person.tags.iter().filter(|tag| !tag.is(WORK_EXPERIENCE)) {
        for entry in &tag.list {
            if let Some(code) = entry.entry_code() {
                attributes.insert(code.to_ascii_lowercase(), json!(entry.value));
            }
        }
    }

    ApplicantSnapshot {
        name: person.name.trim().to_string(),
        gender: non_empty(person.gender.as_deref()),
        age: person.age.as_ref().and_then(parse_age),
        phone: non_empty(customer.contact.phone.as_deref()),
        email: non_empty(customer.contact.email.as_deref()),
        experience_years: experience_years(&person.tags),
        skills: labels(&person.skills),
        languages: labels(&person.languages),
        documents: person
            .creds
            .iter()
            .filter_map(|cred| {
                let name = cred
                    .descriptor
                    .name
                    .clone()
                    .or_else(|| cred.descriptor.code.clone())
                    .or_else(|| cred.kind.clone())?;
                Some(ApplicantDocument {
                    name,
                    url: cred.url.clone(),
                    kind: cred.kind.clone(),
                })
            })
            .collect(),
        attributes,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn labels(descriptors: &[Descriptor]) -> Vec<String> {
    descriptors
        .iter()
        .filter_map(|descriptor| descriptor.name.clone().or_else(|| descriptor.code.clone()))
        .collect()
}

fn parse_age(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|age| u32::try_from(age).ok()),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

/// First entry of the `WORK_EXPERIENCE` group, e.g. `P5Y`, or a bare number of years.
fn experience_years(tags: &[Tag]) -> Option<f64> {
    let entry = tags.iter().find(|tag| tag.is(WORK_EXPERIENCE))?.list.first()?;
    parse_years(&entry.value)
}

pub(crate) fn parse_years(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Ok(years) = raw.parse::<f64>() {
        return years.is_finite().then_some(years);
    }

    let body = raw.strip_prefix('P')?;
    let (years, _) = body.split_once('Y')?;
    if years.is_empty() || !years.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    years.parse::<u32>().ok().map(f64::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Contact, Credential, Person, TagEntry};

    #[test]
    fn parses_iso_year_durations() {
        assert_eq!(parse_years("P5Y"), Some(5.0));
        assert_eq!(parse_years("P12Y6M"), Some(12.0));
        assert_eq!(parse_years("3"), Some(3.0));
        assert_eq!(parse_years("P6M"), None);
        assert_eq!(parse_years("five years"), None);
    }

    #[test]
    fn snapshot_collects_person_contact_and_tags() {
        let customer = Customer {
            person: Person {
                name: " Asha Patil ".to_string(),
                gender: Some("female".to_string()),
                age: Some(json!("27")),
                skills: vec![Descriptor::named("driving", "Driving")],
                languages: vec![Descriptor::code("mr")],
                creds: vec![Credential {
                    id: None,
                    descriptor: Descriptor {
                        name: Some("PAN_CARD".to_string()),
                        ..Descriptor::default()
                    },
                    url: Some("https://files.example/pan.pdf".to_string()),
                    kind: Some("application/pdf".to_string()),
                }],
                tags: vec![
                    Tag::group(WORK_EXPERIENCE, vec![TagEntry::new("TOTAL_EXPERIENCE", "P4Y")]),
                    Tag::group("PERSONAL", vec![TagEntry::new("CASTE", "obc")]),
                ],
            },
            contact: Contact {
                phone: Some("9999999999".to_string()),
                email: Some(String::new()),
            },
        };

        let snapshot = snapshot_from(&customer);
        assert_eq!(snapshot.name, "Asha Patil");
        assert_eq!(snapshot.age, Some(27));
        assert_eq!(snapshot.experience_years, Some(4.0));
        assert_eq!(snapshot.skills, vec!["Driving".to_string()]);
        assert_eq!(snapshot.languages, vec!["mr".to_string()]);
        assert_eq!(snapshot.documents[0].name, "PAN_CARD");
        assert_eq!(snapshot.attributes.get("caste"), Some(&json!("obc")));
        assert!(!snapshot.attributes.contains_key("total_experience"));
        assert!(snapshot.email.is_none());
    }
}
