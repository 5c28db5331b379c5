//! Sync service: mirrors listings into the local store and the CRM.
//!
//! The orchestrator is generic over three collaborators so it can run against
//! the real HTTP clients and Postgres repository, or against in-memory fakes:
//!
//! - [`ListingSource`] fetches the fixed "For Sale" page of listings
//! - [`ListingStore`] inserts a listing unless its `listing_number` is known
//! - [`DealGateway`] searches and creates CRM deals
//!
//! Processing is strictly sequential. A failure while persisting or talking to
//! the CRM aborts the run; listings handled before the failure stay persisted
//! and are picked up again by the next run.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::models::{DealSummary, Listing, NewDeal, NewListing};

/// Source of marketplace listings.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetches the first page of "For Sale" listings, in source order.
    ///
    /// Returns an empty vector when the response has no listings collection.
    async fn fetch_for_sale(&self) -> Result<Vec<NewListing>, AppError>;
}

/// Local persistence for listings.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Inserts `listing` unless a row with the same `listing_number` exists.
    ///
    /// Existing rows are returned untouched, even when price or status differ.
    async fn insert_if_absent(
        &self,
        listing: &NewListing,
    ) -> Result<(Listing, ListingOutcome), AppError>;
}

/// CRM deal operations.
#[async_trait]
pub trait DealGateway: Send + Sync {
    /// Returns every deal whose name equals `name` exactly.
    async fn search_deals_by_name(&self, name: &str) -> Result<Vec<DealSummary>, AppError>;

    /// Creates a deal and returns the stored record.
    async fn create_deal(&self, deal: &NewDeal) -> Result<DealSummary, AppError>;
}

/// What happened to the local record of a fetched listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOutcome {
    /// First time seeing this listing number - row inserted
    Created,
    /// Row already existed - left unchanged
    AlreadyPresent,
}

/// What happened on the CRM side for a fetched listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DealOutcome {
    /// No matching deal existed - one was created
    Created { deal_id: String },
    /// A deal with the same name already exists
    AlreadyExists,
    /// Fetched status is not exactly "For Sale"
    NotForSale,
    /// No CRM credential configured
    CrmDisabled,
}

/// Per-listing entry of the sync log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingSyncResult {
    pub listing_number: String,
    pub listing: ListingOutcome,
    pub deal: DealOutcome,
}

/// Counters for a sync run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub listings_created: usize,
    pub listings_existing: usize,
    pub deals_created: usize,
    pub deals_existing: usize,
    pub deals_skipped: usize,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one processed listing.
    pub fn record(&mut self, result: &ListingSyncResult) {
        match result.listing {
            ListingOutcome::Created => self.listings_created += 1,
            ListingOutcome::AlreadyPresent => self.listings_existing += 1,
        }
        match result.deal {
            DealOutcome::Created { .. } => self.deals_created += 1,
            DealOutcome::AlreadyExists => self.deals_existing += 1,
            DealOutcome::NotForSale | DealOutcome::CrmDisabled => self.deals_skipped += 1,
        }
    }

    /// Returns the number of processed listings.
    pub fn total(&self) -> usize {
        self.listings_created + self.listings_existing
    }
}

/// Outcome of a completed sync run.
#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    /// Number of listings returned by the source.
    pub fetched: usize,
    /// True when the fetch failed and the run was skipped.
    pub fetch_failed: bool,
    pub results: Vec<ListingSyncResult>,
    pub stats: SyncStats,
}

impl SyncReport {
    fn new(fetched: usize) -> Self {
        Self {
            fetched,
            ..Self::default()
        }
    }

    fn skipped() -> Self {
        Self {
            fetch_failed: true,
            ..Self::default()
        }
    }

    fn record(&mut self, result: ListingSyncResult) {
        self.stats.record(&result);
        self.results.push(result);
    }
}

/// Orchestrates a single sync run.
///
/// `deals` is `None` when the CRM integration is disabled; listings are then
/// persisted without any CRM traffic.
///
/// # Examples
///
/// ```ignore
/// let deals = HubSpotClient::from_config(&crm, &settings.crm, &settings.http)?;
/// let service = SyncService::new(listings_client, repo, deals);
/// let report = service.sync().await?;
/// println!("{} listings created", report.stats.listings_created);
/// ```
pub struct SyncService<S, R, D> {
    source: S,
    store: R,
    deals: Option<D>,
}

impl<S, R, D> SyncService<S, R, D>
where
    S: ListingSource,
    R: ListingStore,
    D: DealGateway,
{
    pub fn new(source: S, store: R, deals: Option<D>) -> Self {
        Self {
            source,
            store,
            deals,
        }
    }

    /// Returns true if CRM deals will be synced.
    pub fn crm_enabled(&self) -> bool {
        self.deals.is_some()
    }

    /// Runs one sync.
    ///
    /// A failed or empty fetch ends the run with an empty report and no error.
    ///
    /// # Errors
    ///
    /// Returns the first persistence or CRM error; remaining listings are not processed.
    pub async fn sync(&self) -> Result<SyncReport, AppError> {
        let fetched = match self.source.fetch_for_sale().await {
            Ok(listings) => listings,
            Err(e) => {
                warn!(error = %e, "Failed to fetch listings, skipping run");
                return Ok(SyncReport::skipped());
            }
        };

        if fetched.is_empty() {
            info!("Listings source returned no listings");
            return Ok(SyncReport::new(0));
        }

        let total = fetched.len();
        info!(
            total,
            crm_enabled = self.crm_enabled(),
            "Fetched listings, starting sync"
        );

        let mut report = SyncReport::new(total);
        for (i, new_listing) in fetched.iter().enumerate() {
            match self.process(new_listing).await {
                Ok(result) => {
                    debug!(
                        "[{}/{}] {}: listing {:?}, deal {:?}",
                        i + 1,
                        total,
                        result.listing_number,
                        result.listing,
                        result.deal
                    );
                    report.record(result);
                }
                Err(e) => {
                    error!(
                        listing_number = %new_listing.listing_number,
                        processed = report.results.len(),
                        not_reached = not_reached(total, i),
                        error = %e,
                        "Sync aborted"
                    );
                    return Err(e);
                }
            }
        }

        info!(
            "Sync complete: {} listings created, {} already present, {} deals created, {} deals already in CRM",
            report.stats.listings_created,
            report.stats.listings_existing,
            report.stats.deals_created,
            report.stats.deals_existing
        );

        Ok(report)
    }

    async fn process(&self, fetched: &NewListing) -> Result<ListingSyncResult, AppError> {
        let (listing, listing_outcome) = self.store.insert_if_absent(fetched).await?;

        // Status comes from the fetched record, not from the stored row.
        let deal = if fetched.is_for_sale() {
            self.sync_deal(&listing).await?
        } else {
            DealOutcome::NotForSale
        };

        Ok(ListingSyncResult {
            listing_number: listing.listing_number,
            listing: listing_outcome,
            deal,
        })
    }

    async fn sync_deal(&self, listing: &Listing) -> Result<DealOutcome, AppError> {
        let Some(deals) = &self.deals else {
            return Ok(DealOutcome::CrmDisabled);
        };

        let name = listing.deal_name();
        let existing = deals.search_deals_by_name(&name).await?;
        if !existing.is_empty() {
            debug!(deal_name = %name, matches = existing.len(), "Deal already exists");
            return Ok(DealOutcome::AlreadyExists);
        }

        let created = deals.create_deal(&NewDeal::for_listing(listing)).await?;
        info!(deal_name = %name, deal_id = %created.id, amount = listing.price, "Created CRM deal");

        Ok(DealOutcome::Created {
            deal_id: created.id,
        })
    }
}

/// Listings after the one at `failed_index` that an aborted run never touched.
fn not_reached(total: usize, failed_index: usize) -> usize {
    total.saturating_sub(failed_index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    // =========================================================================
    // Fakes
    // =========================================================================

    fn fetched(number: &str, price: i64, status: &str) -> NewListing {
        NewListing {
            listing_number: number.to_string(),
            price,
            status: status.to_string(),
        }
    }

    /// Source returning a fixed page, or failing when `listings` is None.
    struct FakeSource {
        listings: Option<Vec<NewListing>>,
    }

    impl FakeSource {
        fn returning(listings: Vec<NewListing>) -> Self {
            Self {
                listings: Some(listings),
            }
        }

        fn failing() -> Self {
            Self { listings: None }
        }
    }

    #[async_trait]
    impl ListingSource for FakeSource {
        async fn fetch_for_sale(&self) -> Result<Vec<NewListing>, AppError> {
            self.listings
                .clone()
                .ok_or_else(|| AppError::NetworkError("connection refused".to_string()))
        }
    }

    /// In-memory store with insert-if-absent semantics.
    #[derive(Clone, Default)]
    struct MemoryStore {
        rows: Arc<Mutex<HashMap<String, Listing>>>,
        inserts: Arc<Mutex<Vec<String>>>,
        fail_insert_for: Option<String>,
    }

    impl MemoryStore {
        fn failing_insert_for(mut self, number: &str) -> Self {
            self.fail_insert_for = Some(number.to_string());
            self
        }

        fn insert_attempts(&self) -> Vec<String> {
            self.inserts.lock().unwrap().clone()
        }

        fn with_row(self, number: &str, price: i64, status: &str) -> Self {
            let now = Utc::now();
            self.rows.lock().unwrap().insert(
                number.to_string(),
                Listing {
                    id: Uuid::new_v4(),
                    listing_number: number.to_string(),
                    price,
                    status: status.to_string(),
                    created_at: now,
                    updated_at: now,
                },
            );
            self
        }

        fn count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }

        fn get(&self, number: &str) -> Option<Listing> {
            self.rows.lock().unwrap().get(number).cloned()
        }
    }

    #[async_trait]
    impl ListingStore for MemoryStore {
        async fn insert_if_absent(
            &self,
            listing: &NewListing,
        ) -> Result<(Listing, ListingOutcome), AppError> {
            self.inserts
                .lock()
                .unwrap()
                .push(listing.listing_number.clone());
            if self.fail_insert_for.as_deref() == Some(listing.listing_number.as_str()) {
                return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
            }
            let mut rows = self.rows.lock().unwrap();
            if let Some(existing) = rows.get(&listing.listing_number) {
                return Ok((existing.clone(), ListingOutcome::AlreadyPresent));
            }
            let now = Utc::now();
            let row = Listing {
                id: Uuid::new_v4(),
                listing_number: listing.listing_number.clone(),
                price: listing.price,
                status: listing.status.clone(),
                created_at: now,
                updated_at: now,
            };
            rows.insert(row.listing_number.clone(), row.clone());
            Ok((row, ListingOutcome::Created))
        }
    }

    /// CRM fake recording every call. Created deals become searchable.
    #[derive(Clone, Default)]
    struct FakeCrm {
        deals: Arc<Mutex<HashSet<String>>>,
        searches: Arc<Mutex<Vec<String>>>,
        creates: Arc<Mutex<Vec<NewDeal>>>,
        next_id: Arc<AtomicUsize>,
        fail_create_for: Option<String>,
    }

    impl FakeCrm {
        fn with_deal(self, name: &str) -> Self {
            self.deals.lock().unwrap().insert(name.to_string());
            self
        }

        fn failing_create_for(mut self, name: &str) -> Self {
            self.fail_create_for = Some(name.to_string());
            self
        }

        fn search_count(&self) -> usize {
            self.searches.lock().unwrap().len()
        }

        fn create_count(&self) -> usize {
            self.creates.lock().unwrap().len()
        }

        fn created(&self) -> Vec<NewDeal> {
            self.creates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DealGateway for FakeCrm {
        async fn search_deals_by_name(&self, name: &str) -> Result<Vec<DealSummary>, AppError> {
            self.searches.lock().unwrap().push(name.to_string());
            let found = self.deals.lock().unwrap().contains(name);
            Ok(if found {
                vec![DealSummary {
                    id: "999".to_string(),
                    name: Some(name.to_string()),
                    amount: None,
                }]
            } else {
                Vec::new()
            })
        }

        async fn create_deal(&self, deal: &NewDeal) -> Result<DealSummary, AppError> {
            if self.fail_create_for.as_deref() == Some(deal.name.as_str()) {
                return Err(AppError::CrmError("HTTP 503 from HubSpot".to_string()));
            }
            self.creates.lock().unwrap().push(deal.clone());
            self.deals.lock().unwrap().insert(deal.name.clone());
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(DealSummary {
                id: id.to_string(),
                name: Some(deal.name.clone()),
                amount: Some(deal.amount.to_string()),
            })
        }
    }

    fn two_for_sale() -> Vec<NewListing> {
        vec![
            fetched("12345", 100000, "For Sale"),
            fetched("67890", 200000, "For Sale"),
        ]
    }

    // =========================================================================
    // Scenarios
    // =========================================================================

    #[tokio::test]
    async fn test_sync_creates_listings_and_deals() {
        let store = MemoryStore::default();
        let crm = FakeCrm::default();
        let service = SyncService::new(
            FakeSource::returning(two_for_sale()),
            store.clone(),
            Some(crm.clone()),
        );

        let report = service.sync().await.unwrap();

        assert_eq!(store.count(), 2);
        let first = store.get("12345").unwrap();
        assert_eq!(first.price, 100000);
        assert_eq!(first.status, "For Sale");
        assert_eq!(store.get("67890").unwrap().price, 200000);

        assert_eq!(crm.search_count(), 2);
        assert_eq!(crm.create_count(), 2);
        assert_eq!(
            crm.created(),
            vec![
                NewDeal {
                    name: "Listing #12345".to_string(),
                    amount: 100000
                },
                NewDeal {
                    name: "Listing #67890".to_string(),
                    amount: 200000
                },
            ]
        );

        assert_eq!(report.fetched, 2);
        assert_eq!(report.stats.listings_created, 2);
        assert_eq!(report.stats.deals_created, 2);
        assert_eq!(
            report.results[0].deal,
            DealOutcome::Created {
                deal_id: "1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_existing_deal_is_not_duplicated() {
        let store = MemoryStore::default();
        let crm = FakeCrm::default().with_deal("Listing #12345");
        let service = SyncService::new(
            FakeSource::returning(vec![fetched("12345", 100000, "For Sale")]),
            store.clone(),
            Some(crm.clone()),
        );

        let report = service.sync().await.unwrap();

        assert_eq!(store.count(), 1);
        assert_eq!(crm.search_count(), 1);
        assert_eq!(crm.create_count(), 0);
        assert_eq!(report.results[0].deal, DealOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn test_empty_source_does_nothing() {
        let store = MemoryStore::default();
        let crm = FakeCrm::default();
        let service =
            SyncService::new(FakeSource::returning(vec![]), store.clone(), Some(crm.clone()));

        let report = service.sync().await.unwrap();

        assert_eq!(store.count(), 0);
        assert_eq!(crm.search_count(), 0);
        assert_eq!(crm.create_count(), 0);
        assert!(!report.fetch_failed);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_swallowed() {
        let store = MemoryStore::default();
        let crm = FakeCrm::default();
        let service = SyncService::new(FakeSource::failing(), store.clone(), Some(crm.clone()));

        let report = service.sync().await.unwrap();

        assert!(report.fetch_failed);
        assert_eq!(store.count(), 0);
        assert_eq!(crm.search_count(), 0);
    }

    // =========================================================================
    // Properties
    // =========================================================================

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let store = MemoryStore::default();
        let crm = FakeCrm::default();
        let service = SyncService::new(
            FakeSource::returning(two_for_sale()),
            store.clone(),
            Some(crm.clone()),
        );

        service.sync().await.unwrap();
        let snapshot: Vec<Listing> = ["12345", "67890"]
            .iter()
            .map(|n| store.get(n).unwrap())
            .collect();

        let second = service.sync().await.unwrap();

        assert_eq!(store.count(), 2);
        for listing in snapshot {
            assert_eq!(store.get(&listing.listing_number).unwrap(), listing);
        }
        assert_eq!(second.stats.listings_created, 0);
        assert_eq!(second.stats.listings_existing, 2);
        // Deals created by the first run are found by name.
        assert_eq!(second.stats.deals_existing, 2);
        assert_eq!(crm.create_count(), 2);
        assert_eq!(crm.search_count(), 4);
    }

    #[tokio::test]
    async fn test_only_exact_for_sale_reaches_crm() {
        let store = MemoryStore::default();
        let crm = FakeCrm::default();
        let service = SyncService::new(
            FakeSource::returning(vec![
                fetched("1", 10, "for sale"),
                fetched("2", 20, "Sold"),
                fetched("3", 30, "For Sale "),
                fetched("4", 40, "Pending Sold"),
                fetched("5", 50, "For Sale"),
            ]),
            store.clone(),
            Some(crm.clone()),
        );

        let report = service.sync().await.unwrap();

        assert_eq!(store.count(), 5);
        assert_eq!(*crm.searches.lock().unwrap(), vec!["Listing #5".to_string()]);
        assert_eq!(crm.create_count(), 1);
        assert_eq!(report.stats.deals_skipped, 4);
        assert_eq!(report.results[1].deal, DealOutcome::NotForSale);
    }

    #[tokio::test]
    async fn test_disabled_crm_still_persists() {
        let store = MemoryStore::default();
        let service: SyncService<_, _, FakeCrm> =
            SyncService::new(FakeSource::returning(two_for_sale()), store.clone(), None);

        let report = service.sync().await.unwrap();

        assert!(!service.crm_enabled());
        assert_eq!(store.count(), 2);
        assert_eq!(report.stats.listings_created, 2);
        assert!(report
            .results
            .iter()
            .all(|r| r.deal == DealOutcome::CrmDisabled));
    }

    #[tokio::test]
    async fn test_existing_listing_is_not_updated() {
        let store = MemoryStore::default().with_row("12345", 50000, "For Sale");
        let crm = FakeCrm::default();
        let service = SyncService::new(
            FakeSource::returning(two_for_sale()),
            store.clone(),
            Some(crm.clone()),
        );

        let report = service.sync().await.unwrap();

        assert_eq!(store.count(), 2);
        assert_eq!(store.get("12345").unwrap().price, 50000);
        assert_eq!(report.results[0].listing, ListingOutcome::AlreadyPresent);
        assert_eq!(report.results[1].listing, ListingOutcome::Created);
        // Deal amount comes from the stored row.
        assert_eq!(crm.created()[0].amount, 50000);
    }

    #[tokio::test]
    async fn test_status_is_read_from_fetched_record() {
        let store = MemoryStore::default()
            .with_row("1", 10, "Sold")
            .with_row("2", 20, "For Sale");
        let crm = FakeCrm::default();
        let service = SyncService::new(
            FakeSource::returning(vec![fetched("1", 10, "For Sale"), fetched("2", 20, "Sold")]),
            store.clone(),
            Some(crm.clone()),
        );

        service.sync().await.unwrap();

        assert_eq!(*crm.searches.lock().unwrap(), vec!["Listing #1".to_string()]);
        assert_eq!(store.get("1").unwrap().status, "Sold");
    }

    #[tokio::test]
    async fn test_crm_failure_aborts_remaining_listings() {
        let store = MemoryStore::default();
        let crm = FakeCrm::default().failing_create_for("Listing #2");
        let service = SyncService::new(
            FakeSource::returning(vec![
                fetched("1", 10, "For Sale"),
                fetched("2", 20, "For Sale"),
                fetched("3", 30, "For Sale"),
            ]),
            store.clone(),
            Some(crm.clone()),
        );

        let result = service.sync().await;

        assert!(matches!(result, Err(AppError::CrmError(_))));
        // Listing 2 was persisted before its deal failed; listing 3 never reached.
        assert!(store.get("1").is_some());
        assert!(store.get("2").is_some());
        assert!(store.get("3").is_none());
        assert_eq!(crm.create_count(), 1);
        assert_eq!(crm.search_count(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_aborts_remaining_listings() {
        let store = MemoryStore::default().failing_insert_for("2");
        let crm = FakeCrm::default();
        let service = SyncService::new(
            FakeSource::returning(vec![
                fetched("1", 10, "For Sale"),
                fetched("2", 20, "For Sale"),
                fetched("3", 30, "For Sale"),
            ]),
            store.clone(),
            Some(crm.clone()),
        );

        let result = service.sync().await;

        assert!(matches!(
            result,
            Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut))
        ));
        assert_eq!(store.insert_attempts(), vec!["1".to_string(), "2".to_string()]);
        assert!(store.get("1").is_some());
        assert!(store.get("2").is_none());
        assert!(store.get("3").is_none());
        // Only listing 1 got as far as the CRM.
        assert_eq!(*crm.searches.lock().unwrap(), vec!["Listing #1".to_string()]);
        assert_eq!(crm.create_count(), 1);
    }

    #[test]
    fn test_not_reached_excludes_failed_listing() {
        assert_eq!(not_reached(3, 1), 1);
        assert_eq!(not_reached(3, 2), 0);
        assert_eq!(not_reached(1, 0), 0);
    }

    // =========================================================================
    // SyncStats
    // =========================================================================

    #[test]
    fn test_sync_stats_record() {
        let mut stats = SyncStats::new();
        stats.record(&ListingSyncResult {
            listing_number: "1".into(),
            listing: ListingOutcome::Created,
            deal: DealOutcome::Created {
                deal_id: "7".into(),
            },
        });
        stats.record(&ListingSyncResult {
            listing_number: "2".into(),
            listing: ListingOutcome::AlreadyPresent,
            deal: DealOutcome::AlreadyExists,
        });
        stats.record(&ListingSyncResult {
            listing_number: "3".into(),
            listing: ListingOutcome::Created,
            deal: DealOutcome::CrmDisabled,
        });

        assert_eq!(stats.listings_created, 2);
        assert_eq!(stats.listings_existing, 1);
        assert_eq!(stats.deals_created, 1);
        assert_eq!(stats.deals_existing, 1);
        assert_eq!(stats.deals_skipped, 1);
        assert_eq!(stats.total(), 3);
    }
}
