use std::collections::BTreeMap;

use async_trait::async_trait;
use jobfit_core::JobListing;
use tokio::sync::Mutex;

use crate::{ListingStore, StoreError};

/// In-process store with the same upsert semantics as the Postgres one.
#[derive(Debug, Default)]
pub struct MemoryListingStore {
    rows: Mutex<BTreeMap<String, JobListing>>,
}

impl MemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn get(&self, id: &str) -> Option<JobListing> {
        self.rows.lock().await.get(id).cloned()
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn upsert_batch(&self, listings: &[JobListing]) -> Result<usize, StoreError> {
        let mut rows = self.rows.lock().await;
        for listing in listings {
            let merged = match rows.get(&listing.id) {
                Some(existing) => existing.overwritten_by(listing),
                None => JobListing {
                    suitability: None,
                    ..listing.clone()
                },
            };
            rows.insert(listing.id.clone(), merged);
        }
        Ok(listings.len())
    }

    async fn list_all(&self) -> Result<Vec<JobListing>, StoreError> {
        Ok(self.rows.lock().await.values().cloned().collect())
    }

    async fn set_suitability(&self, id: &str, suitable: bool) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        row.suitability = Some(suitable);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobfit_core::{ExperienceRange, Location, SalaryRange};
    use std::collections::BTreeSet;

    fn listing(id: &str, title: &str) -> JobListing {
        JobListing {
            id: id.to_string(),
            title: title.to_string(),
            company: "Sakoo".into(),
            position: None,
            location: Location::Remote {
                city: None,
                country: None,
            },
            employment_type: "Contract".into(),
            industries: BTreeSet::new(),
            required_skills: BTreeSet::new(),
            taxonomies: BTreeSet::new(),
            experience: ExperienceRange::default(),
            salary: SalaryRange::default(),
            description: "plain".into(),
            external_link: None,
            has_equity: false,
            is_boosted: false,
            vacancy_count: None,
            published_at: None,
            expires_at: None,
            starts_featuring_at: None,
            suitability: None,
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_without_duplicating() {
        let store = MemoryListingStore::new();
        store
            .upsert_batch(&[listing("a", "First"), listing("b", "Second")])
            .await
            .expect("first upsert");
        store
            .upsert_batch(&[listing("a", "First (edited)")])
            .await
            .expect("second upsert");

        let all = store.list_all().await.expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "First (edited)");
    }

    #[tokio::test]
    async fn upsert_keeps_verdict_and_ignores_incoming_one() {
        let store = MemoryListingStore::new();
        let mut incoming = listing("a", "First");
        incoming.suitability = Some(true);
        store.upsert_batch(&[incoming]).await.expect("insert");
        assert_eq!(store.get("a").await.and_then(|l| l.suitability), None);

        store.set_suitability("a", false).await.expect("verdict");
        store.upsert_batch(&[listing("a", "First")]).await.expect("re-ingest");
        assert_eq!(store.get("a").await.and_then(|l| l.suitability), Some(false));
    }

    #[tokio::test]
    async fn verdict_for_unknown_id_is_not_found() {
        let store = MemoryListingStore::new();
        let err = store.set_suitability("missing", true).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn repeated_verdict_is_a_no_op() {
        let store = MemoryListingStore::new();
        store.upsert_batch(&[listing("a", "First")]).await.expect("insert");
        store.set_suitability("a", true).await.expect("first");
        let before = store.list_all().await.expect("list");
        store.set_suitability("a", true).await.expect("second");
        assert_eq!(store.list_all().await.expect("list"), before);
    }
}
