use super::domain::Offering;

/// Intent filter applied to the catalog; empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub keyword: Option<String>,
    pub provider: Option<String>,
    pub city: Option<String>,
    pub industry: Option<String>,
    pub job_type: Option<String>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn matches(&self, offering: &Offering) -> bool {
        let keyword = self.keyword.as_deref().map_or(true, |keyword| {
            contains_ignore_case(&offering.name, keyword)
                || contains_ignore_case(&offering.description, keyword)
        });
        let provider = self
            .provider
            .as_deref()
            .map_or(true, |provider| contains_ignore_case(&offering.provider.name, provider));
        let city = self
            .city
            .as_deref()
            .map_or(true, |city| offering.location.city.eq_ignore_ascii_case(city));
        let industry = self.industry.as_deref().map_or(true, |industry| {
            offering
                .provider
                .industry
                .as_deref()
                .is_some_and(|value| value.eq_ignore_ascii_case(industry))
        });
        let job_type = self.job_type.as_deref().map_or(true, |job_type| {
            offering
                .job_type
                .as_deref()
                .is_some_and(|value| value.eq_ignore_ascii_case(job_type))
        });

        keyword && provider && city && industry && job_type
    }

    pub fn apply<'a>(&'a self, offerings: &'a [Offering]) -> impl Iterator<Item = &'a Offering> {
        offerings.iter().filter(move |offering| self.matches(offering))
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
