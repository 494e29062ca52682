//! Raw search hits → canonical listings.
//!
//! Every hit goes through a typed schema first so a missing or mistyped field
//! becomes a [`ValidationError`] for that hit alone.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use jobfit_core::{ExperienceRange, JobListing, Location, SalaryRange};
use scraper::{Html, Node};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is malformed: {reason}")]
    Malformed { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedHit {
    /// Position of the hit in the fetched sequence.
    pub position: usize,
    pub id: Option<String>,
    pub error: ValidationError,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub listings: Vec<JobListing>,
    pub rejected: Vec<RejectedHit>,
    /// Hits whose id had already been seen earlier in the same snapshot.
    pub duplicates: usize,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTaxonomy {
    slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCity {
    name: Option<String>,
    country_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCurrency {
    name: Option<String>,
    currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Epoch(i64),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLabel {
    Text(String),
    Number(f64),
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "objectID")]
    object_id: Option<RawId>,
    title: Option<String>,
    company: Option<Named>,
    position: Option<Named>,
    job_type: Option<Named>,
    city: Option<RawCity>,
    currency: Option<RawCurrency>,
    description: Option<String>,
    experience: Option<RawLabel>,
    experience_min: Option<f64>,
    experience_max: Option<f64>,
    industries: Option<Vec<Named>>,
    job_skills: Option<Vec<Named>>,
    taxonomies: Option<Vec<RawTaxonomy>>,
    is_remote: Option<bool>,
    is_salary_visible: Option<bool>,
    salary_min: Option<f64>,
    salary_max: Option<f64>,
    salary_avg: Option<f64>,
    external_link: Option<String>,
    has_equity: Option<bool>,
    is_boosted: Option<bool>,
    vacancy_count: Option<f64>,
    published_at: Option<RawTimestamp>,
    expires_at: Option<RawTimestamp>,
    starts_featuring_at: Option<RawTimestamp>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    non_blank(value).ok_or(ValidationError::MissingField(field))
}

fn named(value: Option<Named>) -> Option<String> {
    non_blank(value.and_then(|n| n.name))
}

fn name_set(values: Option<Vec<Named>>) -> BTreeSet<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .filter_map(|n| non_blank(n.name))
        .collect()
}

fn whole_number(value: Option<f64>) -> Option<u32> {
    value
        .filter(|v| v.is_finite() && *v >= 0.0 && *v <= u32::MAX as f64)
        .map(|v| v.round() as u32)
}

fn parse_timestamp(
    value: Option<RawTimestamp>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let malformed = |reason: String| ValidationError::Malformed {
        field: field.to_string(),
        reason,
    };
    match value {
        None => Ok(None),
        Some(RawTimestamp::Epoch(secs)) => Utc
            .timestamp_opt(secs, 0)
            .single()
            .map(Some)
            .ok_or_else(|| malformed(format!("epoch {secs} out of range"))),
        Some(RawTimestamp::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
                return Ok(Some(ts.with_timezone(&Utc)));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
                return Ok(Some(naive.and_utc()));
            }
            if let Some(naive) = NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
            {
                return Ok(Some(naive.and_utc()));
            }
            Err(malformed(format!("unrecognized timestamp {text:?}")))
        }
    }
}

fn derive_location(is_remote: bool, city: Option<RawCity>) -> Result<Location, ValidationError> {
    let (name, country) = match city {
        Some(c) => (non_blank(c.name), non_blank(c.country_name)),
        None => (None, None),
    };
    if is_remote {
        return Ok(Location::Remote {
            city: name,
            country,
        });
    }
    Ok(Location::OnSite {
        city: name.ok_or(ValidationError::MissingField("city.name"))?,
        country: country.ok_or(ValidationError::MissingField("city.country_name"))?,
    })
}

/// Map one raw hit into a listing. A hit without an `objectID` is rejected.
pub fn normalize_hit(hit: &JsonValue) -> Result<JobListing, ValidationError> {
    let raw = RawHit::deserialize(hit).map_err(|err| ValidationError::Malformed {
        field: "<hit>".to_string(),
        reason: err.to_string(),
    })?;

    let id = match raw.object_id {
        Some(RawId::Text(text)) => required(Some(text), "objectID")?,
        Some(RawId::Number(n)) => n.to_string(),
        None => return Err(ValidationError::MissingField("objectID")),
    };

    let title = required(raw.title, "title")?;
    let company = named(raw.company).ok_or(ValidationError::MissingField("company.name"))?;
    let employment_type = named(raw.job_type).ok_or(ValidationError::MissingField("job_type.name"))?;
    let description = raw
        .description
        .map(|d| strip_markup(&d))
        .ok_or(ValidationError::MissingField("description"))?;
    let location = derive_location(raw.is_remote.unwrap_or(false), raw.city)?;

    let currency = raw
        .currency
        .and_then(|c| non_blank(c.name).or_else(|| non_blank(c.currency_code)));

    Ok(JobListing {
        id,
        title,
        company,
        position: named(raw.position),
        location,
        employment_type,
        industries: name_set(raw.industries),
        required_skills: name_set(raw.job_skills),
        taxonomies: raw
            .taxonomies
            .unwrap_or_default()
            .into_iter()
            .filter_map(|t| non_blank(t.slug))
            .collect(),
        experience: ExperienceRange {
            label: raw.experience.and_then(|e| match e {
                RawLabel::Text(text) => non_blank(Some(text)),
                RawLabel::Number(n) => Some(n.to_string()),
            }),
            min_years: whole_number(raw.experience_min),
            max_years: whole_number(raw.experience_max),
        },
        salary: SalaryRange {
            visible: raw.is_salary_visible.unwrap_or(false),
            currency,
            min: raw.salary_min,
            max: raw.salary_max,
            avg: raw.salary_avg,
        },
        description,
        external_link: non_blank(raw.external_link),
        has_equity: raw.has_equity.unwrap_or(false),
        is_boosted: raw.is_boosted.unwrap_or(false),
        vacancy_count: whole_number(raw.vacancy_count),
        published_at: parse_timestamp(raw.published_at, "published_at")?,
        expires_at: parse_timestamp(raw.expires_at, "expires_at")?,
        starts_featuring_at: parse_timestamp(raw.starts_featuring_at, "starts_featuring_at")?,
        suitability: None,
    })
}

fn hit_id(hit: &JsonValue) -> Option<String> {
    match hit.get("objectID")? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalize a whole snapshot. A bad hit is recorded and skipped; it never stops
/// the rest. Repeated ids keep their first position and their last content.
pub fn normalize_hits(hits: &[JsonValue]) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (position, hit) in hits.iter().enumerate() {
        match normalize_hit(hit) {
            Ok(listing) => match seen.get(&listing.id) {
                Some(&slot) => {
                    debug!(id = %listing.id, position, "duplicate id in snapshot; later hit wins");
                    outcome.listings[slot] = listing;
                    outcome.duplicates += 1;
                }
                None => {
                    seen.insert(listing.id.clone(), outcome.listings.len());
                    outcome.listings.push(listing);
                }
            },
            Err(error) => {
                let id = hit_id(hit);
                warn!(position, id = ?id, error = %error, "dropping malformed hit");
                outcome.rejected.push(RejectedHit {
                    position,
                    id,
                    error,
                });
            }
        }
    }

    outcome
}

/// Elements whose text never reaches the output.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "textarea", "option",
];

/// Elements that start a new line in the extracted text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "ol",
    "p", "pre", "section", "table", "tr", "ul",
];

/// Decoding entities can surface new tags, so extraction repeats until the
/// text holds no tag start. Bounded by the entity nesting depth of the input.
const MAX_STRIP_PASSES: usize = 8;

/// `<` followed by what an HTML tokenizer would read as a tag, comment or
/// doctype. A bare `<` as in "a < b" does not count.
fn has_tag_start(text: &str) -> bool {
    text.as_bytes().windows(2).any(|pair| {
        pair[0] == b'<' && (pair[1].is_ascii_alphabetic() || matches!(pair[1], b'/' | b'!' | b'?'))
    })
}

fn extract_text(input: &str) -> String {
    let fragment = Html::parse_fragment(input);
    let mut out = String::with_capacity(input.len());

    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(text) => {
                let hidden = node.ancestors().any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
                });
                if !hidden {
                    out.push_str(text);
                }
            }
            Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }

    out
}

/// Strip every tag and keep text content only. Text without a tag start comes
/// back unchanged, so stripping twice gives the same result as stripping once.
pub fn strip_markup(input: &str) -> String {
    if !has_tag_start(input) {
        return input.to_string();
    }

    let mut text = extract_text(input);
    for _ in 1..MAX_STRIP_PASSES {
        if !has_tag_start(&text) {
            return text;
        }
        text = extract_text(&text);
    }

    if has_tag_start(&text) {
        text = text.replace('<', "");
    }
    text
}
