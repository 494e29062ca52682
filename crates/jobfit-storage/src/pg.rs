use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobfit_core::{ExperienceRange, JobListing, Location, SalaryRange};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::debug;

use crate::{ListingStore, StoreError};

/// Postgres caps a statement at 65535 bind parameters.
const MAX_ROWS_PER_STATEMENT: usize = 65_535 / UPSERT_COLUMNS.len();

/// Every ingest-owned column. `is_suitable` is only written by classification.
const UPSERT_COLUMNS: [&str; 27] = [
    "id",
    "title",
    "company",
    "position",
    "is_remote",
    "city",
    "country",
    "employment_type",
    "industries",
    "required_skills",
    "taxonomies",
    "experience_label",
    "experience_min",
    "experience_max",
    "is_salary_visible",
    "currency",
    "salary_min",
    "salary_max",
    "salary_avg",
    "description",
    "external_link",
    "has_equity",
    "is_boosted",
    "vacancy_count",
    "published_at",
    "expires_at",
    "starts_featuring_at",
];

const SELECT_LISTINGS: &str = r#"
    SELECT id, title, company, position, is_remote, city, country, employment_type,
           industries, required_skills, taxonomies, experience_label, experience_min, experience_max,
           is_salary_visible, currency, salary_min, salary_max, salary_avg, description,
           external_link, has_equity, is_boosted, vacancy_count, published_at, expires_at,
           starts_featuring_at, is_suitable
      FROM job_listings
     ORDER BY id
"#;

#[derive(Debug, Clone)]
pub struct PgListingStore {
    pool: PgPool,
}

impl PgListingStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn upsert_statement(&self, listings: &[JobListing]) -> Result<u64, StoreError> {
        let mut builder = upsert_query(listings);
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

/// One multi-row `INSERT ... ON CONFLICT (id) DO UPDATE` for `listings`.
fn upsert_query(listings: &[JobListing]) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("INSERT INTO job_listings (");
    builder.push(UPSERT_COLUMNS.join(", "));
    builder.push(") ");

    builder.push_values(listings, |mut row, listing| {
        row.push_bind(listing.id.clone())
            .push_bind(listing.title.clone())
            .push_bind(listing.company.clone())
            .push_bind(listing.position.clone())
            .push_bind(listing.location.is_remote())
            .push_bind(listing.location.city().map(ToString::to_string))
            .push_bind(listing.location.country().map(ToString::to_string))
            .push_bind(listing.employment_type.clone())
            .push_bind(listing.industries.iter().cloned().collect::<Vec<_>>())
            .push_bind(listing.required_skills.iter().cloned().collect::<Vec<_>>())
            .push_bind(listing.taxonomies.iter().cloned().collect::<Vec<_>>())
            .push_bind(listing.experience.label.clone())
            .push_bind(to_db_int(listing.experience.min_years))
            .push_bind(to_db_int(listing.experience.max_years))
            .push_bind(listing.salary.visible)
            .push_bind(listing.salary.currency.clone())
            .push_bind(listing.salary.min)
            .push_bind(listing.salary.max)
            .push_bind(listing.salary.avg)
            .push_bind(listing.description.clone())
            .push_bind(listing.external_link.clone())
            .push_bind(listing.has_equity)
            .push_bind(listing.is_boosted)
            .push_bind(to_db_int(listing.vacancy_count))
            .push_bind(listing.published_at)
            .push_bind(listing.expires_at)
            .push_bind(listing.starts_featuring_at);
    });

    builder.push(" ON CONFLICT (id) DO UPDATE SET ");
    let assignments = UPSERT_COLUMNS
        .iter()
        .skip(1)
        .map(|col| format!("{col} = EXCLUDED.{col}"))
        .collect::<Vec<_>>()
        .join(", ");
    builder.push(assignments);
    builder.push(", updated_at = NOW()");
    builder
}

#[async_trait]
impl ListingStore for PgListingStore {
    async fn upsert_batch(&self, listings: &[JobListing]) -> Result<usize, StoreError> {
        let mut written = 0usize;
        for chunk in listings.chunks(MAX_ROWS_PER_STATEMENT) {
            written += self.upsert_statement(chunk).await? as usize;
        }
        debug!(rows = written, "upserted job listings");
        Ok(written)
    }

    async fn list_all(&self) -> Result<Vec<JobListing>, StoreError> {
        let rows = sqlx::query(SELECT_LISTINGS).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_listing).collect()
    }

    async fn set_suitability(&self, id: &str, suitable: bool) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE job_listings
               SET is_suitable = $1,
                   updated_at = NOW()
             WHERE id = $2
            "#,
        )
        .bind(suitable)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn to_db_int(value: Option<u32>) -> Option<i32> {
    value.and_then(|v| i32::try_from(v).ok())
}

fn from_db_int(value: Option<i32>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

fn row_to_listing(row: &PgRow) -> Result<JobListing, StoreError> {
    let id: String = row.try_get("id")?;
    let is_remote: bool = row.try_get("is_remote")?;
    let city: Option<String> = row.try_get("city")?;
    let country: Option<String> = row.try_get("country")?;

    let location = if is_remote {
        Location::Remote { city, country }
    } else {
        match (city, country) {
            (Some(city), Some(country)) => Location::OnSite { city, country },
            _ => {
                return Err(StoreError::Corrupt {
                    id,
                    reason: "on-site listing without city and country".to_string(),
                })
            }
        }
    };

    let industries: Vec<String> = row.try_get("industries")?;
    let required_skills: Vec<String> = row.try_get("required_skills")?;
    let taxonomies: Vec<String> = row.try_get("taxonomies")?;

    Ok(JobListing {
        title: row.try_get("title")?,
        company: row.try_get("company")?,
        position: row.try_get("position")?,
        location,
        employment_type: row.try_get("employment_type")?,
        industries: industries.into_iter().collect::<BTreeSet<_>>(),
        required_skills: required_skills.into_iter().collect::<BTreeSet<_>>(),
        taxonomies: taxonomies.into_iter().collect::<BTreeSet<_>>(),
        experience: ExperienceRange {
            label: row.try_get("experience_label")?,
            min_years: from_db_int(row.try_get("experience_min")?),
            max_years: from_db_int(row.try_get("experience_max")?),
        },
        salary: SalaryRange {
            visible: row.try_get("is_salary_visible")?,
            currency: row.try_get("currency")?,
            min: row.try_get("salary_min")?,
            max: row.try_get("salary_max")?,
            avg: row.try_get("salary_avg")?,
        },
        description: row.try_get("description")?,
        external_link: row.try_get("external_link")?,
        has_equity: row.try_get("has_equity")?,
        is_boosted: row.try_get("is_boosted")?,
        vacancy_count: from_db_int(row.try_get("vacancy_count")?),
        published_at: row.try_get::<Option<DateTime<Utc>>, _>("published_at")?,
        expires_at: row.try_get::<Option<DateTime<Utc>>, _>("expires_at")?,
        starts_featuring_at: row.try_get::<Option<DateTime<Utc>>, _>("starts_featuring_at")?,
        suitability: row.try_get("is_suitable")?,
        id,
    })
}
