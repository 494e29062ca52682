//! Core domain model for jobfit: canonical listings and the applicant profile.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "jobfit-core";

/// Where the work happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    Remote {
        city: Option<String>,
        country: Option<String>,
    },
    OnSite {
        city: String,
        country: String,
    },
}

impl Location {
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote { .. })
    }

    pub fn city(&self) -> Option<&str> {
        match self {
            Location::Remote { city, .. } => city.as_deref(),
            Location::OnSite { city, .. } => Some(city),
        }
    }

    pub fn country(&self) -> Option<&str> {
        match self {
            Location::Remote { country, .. } => country.as_deref(),
            Location::OnSite { country, .. } => Some(country),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Remote { .. } => f.write_str("Remote"),
            Location::OnSite { city, country } => write!(f, "{city}, {country}"),
        }
    }
}

/// Required experience, in years, as published by the source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExperienceRange {
    pub label: Option<String>,
    pub min_years: Option<u32>,
    pub max_years: Option<u32>,
}

/// Salary band. Numbers are only meaningful to show when `visible` is set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SalaryRange {
    pub visible: bool,
    pub currency: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
}

impl SalaryRange {
    /// The disclosed band, or `None` when the source hides it.
    pub fn disclosed(&self) -> Option<&Self> {
        self.visible.then_some(self)
    }
}

/// Canonical persisted job listing keyed by the externally issued id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListing {
    pub id: String,
    pub title: String,
    pub company: String,
    pub position: Option<String>,
    pub location: Location,
    pub employment_type: String,
    pub industries: BTreeSet<String>,
    pub required_skills: BTreeSet<String>,
    /// Category slugs assigned by the source.
    pub taxonomies: BTreeSet<String>,
    pub experience: ExperienceRange,
    pub salary: SalaryRange,
    pub description: String,
    pub external_link: Option<String>,
    pub has_equity: bool,
    pub is_boosted: bool,
    pub vacancy_count: Option<u32>,
    pub published_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub starts_featuring_at: Option<DateTime<Utc>>,
    /// Absent until a classification run records a verdict.
    pub suitability: Option<bool>,
}

impl JobListing {
    /// Copy of this listing with every ingest-owned field taken from `incoming`.
    /// The verdict survives, since only classification writes it.
    pub fn overwritten_by(&self, incoming: &JobListing) -> JobListing {
        JobListing {
            suitability: self.suitability,
            ..incoming.clone()
        }
    }
}

/// The candidate every listing is matched against. One per run, read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicantProfile {
    summary: String,
}

impl ApplicantProfile {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
        }
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }
}
