//! Domain models shared across the workspace.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// The only listing status that is mirrored into the CRM.
///
/// Comparison against this value is exact: `"for sale"` or `"For Sale "` do not match.
pub const FOR_SALE: &str = "For Sale";

/// Builds the CRM display name used to identify the deal of a listing.
///
/// # Examples
///
/// ```
/// use mercurius_core::deal_name;
///
/// assert_eq!(deal_name("12345"), "Listing #12345");
/// ```
pub fn deal_name(listing_number: &str) -> String {
    format!("Listing #{}", listing_number)
}

/// A row of the `listings` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Listing {
    pub id: Uuid,
    pub listing_number: String,
    pub price: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// CRM display name for this listing.
    pub fn deal_name(&self) -> String {
        deal_name(&self.listing_number)
    }
}

/// Listing as fetched from the source, ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewListing {
    pub listing_number: String,
    pub price: i64,
    pub status: String,
}

impl NewListing {
    /// Returns true if the fetched status qualifies the listing for a CRM deal.
    ///
    /// # Examples
    ///
    /// ```
    /// use mercurius_core::NewListing;
    ///
    /// let listing = NewListing {
    ///     listing_number: "1".to_string(),
    ///     price: 10,
    ///     status: "For Sale".to_string(),
    /// };
    /// assert!(listing.is_for_sale());
    /// ```
    pub fn is_for_sale(&self) -> bool {
        self.status == FOR_SALE
    }
}

/// A deal as returned by the CRM search and create endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DealSummary {
    pub id: String,
    pub name: Option<String>,
    pub amount: Option<String>,
}

/// Input for creating a CRM deal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeal {
    pub name: String,
    pub amount: i64,
}

impl NewDeal {
    /// Deal mirroring a stored listing. The amount is the persisted price.
    pub fn for_listing(listing: &Listing) -> Self {
        Self {
            name: listing.deal_name(),
            amount: listing.price,
        }
    }
}

/// Number of stored listings sharing a status label.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Aggregated statistics over the `listings` table.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub total_listings: i64,
    pub by_status: Vec<StatusCount>,
    pub last_created: Option<DateTime<Utc>>,
}
