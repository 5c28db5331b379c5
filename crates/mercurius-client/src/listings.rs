use async_trait::async_trait;
use mercurius_core::error::AppError;
use mercurius_core::models::NewListing;
use mercurius_core::sync::ListingSource;
use mercurius_core::HttpConfig;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Endpoint listing marketplace entries, relative to the API root.
const LISTINGS_PATH: &str = "listings/list";

/// The one query ever issued: first page of "For Sale" listings.
const FOR_SALE_QUERY: &str = "page=1&listing_status=For%20Sale";

/// Wrapper of the listings endpoint response.
///
/// ```json
/// { "data": { "listings": [ { "listing_number": "12345", ... } ] } }
/// ```
///
/// Both levels are optional; a missing collection means "no listings".
#[derive(Deserialize, Debug, Default)]
struct ListingsResponse {
    #[serde(default)]
    data: Option<ListingsData>,
}

#[derive(Deserialize, Debug, Default)]
struct ListingsData {
    #[serde(default)]
    listings: Option<Vec<Value>>,
}

/// Data Transfer Object for a single marketplace listing.
///
/// Fields other than the three Mercurius uses are kept in `extras`.
///
/// # Examples
///
/// ```
/// use mercurius_client::listings::ApiListing;
///
/// let json = r#"{
///     "listing_number": 12345,
///     "price": 100000,
///     "listing_status": "For Sale",
///     "niches": ["SaaS"]
/// }"#;
///
/// let listing: ApiListing = serde_json::from_str(json).unwrap();
/// assert_eq!(listing.listing_number, "12345");
/// assert!(listing.extras.contains_key("niches"));
/// ```
#[derive(Deserialize, Debug, Clone)]
pub struct ApiListing {
    /// Marketplace identifier, sent either as a string or a number
    #[serde(deserialize_with = "string_or_number")]
    pub listing_number: String,
    /// Asking price as supplied by the API
    pub price: i64,
    /// Free-form status label, e.g. "For Sale"
    pub listing_status: String,
    /// All other fields returned by the API
    #[serde(flatten)]
    pub extras: serde_json::Map<String, Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// HTTP client for the marketplace listings API.
///
/// # Examples
///
/// ```no_run
/// use mercurius_client::ListingsClient;
/// use mercurius_core::HttpConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ListingsClient::new("https://api.empireflippers.com/api/v1/", &HttpConfig::default())?;
/// let listings = client.fetch_listings().await?;
/// println!("Found {} listings", listings.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ListingsClient {
    client: Client,
    base_url: Url,
    http: HttpConfig,
}

impl ListingsClient {
    /// Creates a client for the API rooted at `base_url_str`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the URL is malformed.
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new(base_url_str: &str, http: &HttpConfig) -> Result<Self, AppError> {
        let base_url = crate::http::parse_base_url(base_url_str)?;
        let client = crate::http::build_client(http)?;

        Ok(Self {
            client,
            base_url,
            http: http.clone(),
        })
    }

    /// Full URL of the "For Sale" query.
    pub fn for_sale_url(&self) -> Result<Url, AppError> {
        let mut url = self
            .base_url
            .join(LISTINGS_PATH)
            .map_err(|e| AppError::InvalidUrl(e.to_string()))?;
        url.set_query(Some(FOR_SALE_QUERY));
        Ok(url)
    }

    /// Fetches the first page of "For Sale" listings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SerializationError` if the body is not JSON, and
    /// `AppError::ClientError` naming the index of the first record that does
    /// not decode. Transport and status failures surface as `NetworkError`,
    /// `Timeout`, `ServerError`, `RateLimitExceeded` or `ClientError`.
    pub async fn fetch_listings(&self) -> Result<Vec<ApiListing>, AppError> {
        let url = self.for_sale_url()?;
        let resp = self.request_with_retry(&url).await?;
        info!("Listings API responded with HTTP {}", resp.status().as_u16());

        let body = resp
            .text()
            .await
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        parse_listings(&body)
    }

    /// Makes an HTTP GET request, retrying transient failures.
    ///
    /// `http.max_retries` is the total number of attempts; with the default of
    /// one the request is sent exactly once. Network errors, timeouts, server
    /// errors (5xx) and rate limiting (429) are retried with a growing delay.
    async fn request_with_retry(&self, url: &Url) -> Result<reqwest::Response, AppError> {
        let max_attempts = self.http.max_retries.max(1);
        let mut attempt = 1;

        loop {
            let err = match self.client.get(url.clone()).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => status_error(resp.status(), url),
                Err(e) => crate::http::send_error(e, &self.http, AppError::ClientError),
            };

            if attempt >= max_attempts || !err.is_retryable() {
                return Err(err);
            }

            let delay = backoff(self.http.retry_base_delay, attempt, &err);
            warn!(attempt, ?delay, error = %err, "Listings request failed, retrying");
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// Converts an API listing into the insert model.
    ///
    /// # Examples
    ///
    /// ```
    /// use mercurius_client::ListingsClient;
    /// use mercurius_client::listings::ApiListing;
    ///
    /// let api_listing = ApiListing {
    ///     listing_number: "12345".to_string(),
    ///     price: 100000,
    ///     listing_status: "For Sale".to_string(),
    ///     extras: serde_json::Map::new(),
    /// };
    ///
    /// let new_listing = ListingsClient::into_new_listing(api_listing);
    /// assert_eq!(new_listing.listing_number, "12345");
    /// assert_eq!(new_listing.status, "For Sale");
    /// ```
    pub fn into_new_listing(listing: ApiListing) -> NewListing {
        NewListing {
            listing_number: listing.listing_number,
            price: listing.price,
            status: listing.listing_status,
        }
    }
}

/// Maps a non-success listings response to an error.
fn status_error(status: StatusCode, url: &Url) -> AppError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        AppError::RateLimitExceeded
    } else if status.is_server_error() {
        AppError::ServerError(status.as_u16())
    } else {
        AppError::ClientError(format!("HTTP {} from {}", status.as_u16(), url))
    }
}

/// Delay before the next attempt: exponential when rate limited, linear otherwise.
fn backoff(base: Duration, attempt: u32, err: &AppError) -> Duration {
    match err {
        AppError::RateLimitExceeded => base.saturating_mul(2_u32.saturating_pow(attempt)),
        _ => base.saturating_mul(attempt),
    }
}

/// Extracts `data.listings` from a response body; absent collection ⇒ empty.
///
/// Records are decoded one by one so a bad record is reported by position.
fn parse_listings(body: &str) -> Result<Vec<ApiListing>, AppError> {
    let resp: ListingsResponse = serde_json::from_str(body)?;
    let records = resp.data.and_then(|d| d.listings).unwrap_or_default();

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            serde_json::from_value::<ApiListing>(record).map_err(|e| {
                AppError::ClientError(format!("Malformed listing at index {}: {}", index, e))
            })
        })
        .collect()
}

#[async_trait]
impl ListingSource for ListingsClient {
    async fn fetch_for_sale(&self) -> Result<Vec<NewListing>, AppError> {
        let listings = self.fetch_listings().await?;
        debug!(count = listings.len(), "Decoded listings");
        Ok(listings
            .into_iter()
            .map(ListingsClient::into_new_listing)
            .collect())
    }
}
