//! Listing repository for PostgreSQL.
//!
//! Integration tests live in `tests/repository.rs` and need a `DATABASE_URL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercurius_core::error::AppError;
use mercurius_core::models::{DatabaseStats, Listing, NewListing, StatusCount};
use mercurius_core::sync::{ListingOutcome, ListingStore};
use sqlx::{PgPool, Pool, Postgres};
use tracing::debug;

/// Column list for SELECT queries. Must remain a const literal to ensure SQL safety
/// since format!() bypasses sqlx compile-time validation.
const LISTING_COLUMNS: &str = "id, listing_number, price, status, created_at, updated_at";

/// Default cap for [`ListingRepository::list_all`].
const DEFAULT_LIST_LIMIT: usize = 10_000;

/// Repository for listing persistence in PostgreSQL.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use mercurius_db::ListingRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/mercurius")
///     .await?;
///
/// let repo = ListingRepository::new(pool);
/// repo.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ListingRepository {
    pool: Pool<Postgres>,
}

impl ListingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(sqlx::Error::from(e)))
    }

    /// Inserts a listing unless its `listing_number` is already stored.
    ///
    /// The unique constraint on `listing_number` is the only guard against
    /// overlapping syncs; a conflicting insert leaves the stored row as is.
    pub async fn insert_if_absent(
        &self,
        new_listing: &NewListing,
    ) -> Result<(Listing, ListingOutcome), AppError> {
        let query = format!(
            r#"
            INSERT INTO listings (listing_number, price, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (listing_number) DO NOTHING
            RETURNING {}
            "#,
            LISTING_COLUMNS
        );
        let inserted = sqlx::query_as::<_, Listing>(&query)
            .bind(&new_listing.listing_number)
            .bind(new_listing.price)
            .bind(&new_listing.status)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        if let Some(listing) = inserted {
            debug!(listing_number = %listing.listing_number, "Inserted listing");
            return Ok((listing, ListingOutcome::Created));
        }

        match self.get_by_listing_number(&new_listing.listing_number).await? {
            Some(existing) => Ok((existing, ListingOutcome::AlreadyPresent)),
            None => Err(AppError::Generic(format!(
                "listing {} conflicted on insert but could not be read back",
                new_listing.listing_number
            ))),
        }
    }

    /// Retrieves a listing by its marketplace number.
    pub async fn get_by_listing_number(
        &self,
        listing_number: &str,
    ) -> Result<Option<Listing>, AppError> {
        let query = format!(
            "SELECT {} FROM listings WHERE listing_number = $1",
            LISTING_COLUMNS
        );
        let result = sqlx::query_as::<_, Listing>(&query)
            .bind(listing_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(result)
    }

    /// Lists listings, newest first, with optional status filter and limit.
    pub async fn list_all(
        &self,
        status_filter: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Listing>, AppError> {
        let limit_val = limit.unwrap_or(DEFAULT_LIST_LIMIT) as i64;

        let listings = if let Some(status) = status_filter {
            let query = format!(
                "SELECT {} FROM listings WHERE status = $1 ORDER BY created_at DESC, listing_number LIMIT $2",
                LISTING_COLUMNS
            );
            sqlx::query_as::<_, Listing>(&query)
                .bind(status)
                .bind(limit_val)
                .fetch_all(&self.pool)
                .await
                .map_err(AppError::DatabaseError)?
        } else {
            let query = format!(
                "SELECT {} FROM listings ORDER BY created_at DESC, listing_number LIMIT $1",
                LISTING_COLUMNS
            );
            sqlx::query_as::<_, Listing>(&query)
                .bind(limit_val)
                .fetch_all(&self.pool)
                .await
                .map_err(AppError::DatabaseError)?
        };

        Ok(listings)
    }

    /// Returns the number of stored listings.
    pub async fn count(&self) -> Result<i64, AppError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM listings")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(row.0)
    }

    /// Returns aggregated database statistics.
    pub async fn get_stats(&self) -> Result<DatabaseStats, AppError> {
        let row: StatsRow = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) as total,
                MAX(created_at) as last_created
            FROM listings
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        let by_status: Vec<StatusCount> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*) as count
            FROM listings
            GROUP BY status
            ORDER BY count DESC, status
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(DatabaseStats {
            total_listings: row.total.unwrap_or(0),
            by_status,
            last_created: row.last_created,
        })
    }
}

#[async_trait]
impl ListingStore for ListingRepository {
    async fn insert_if_absent(
        &self,
        listing: &NewListing,
    ) -> Result<(Listing, ListingOutcome), AppError> {
        ListingRepository::insert_if_absent(self, listing).await
    }
}

/// Helper struct for deserializing stats query results
#[derive(sqlx::FromRow)]
struct StatsRow {
    total: Option<i64>,
    last_created: Option<DateTime<Utc>>,
}
