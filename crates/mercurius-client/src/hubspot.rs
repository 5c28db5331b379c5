use async_trait::async_trait;
use mercurius_core::error::AppError;
use mercurius_core::models::{DealSummary, NewDeal};
use mercurius_core::sync::DealGateway;
use mercurius_core::{CrmConfig, CrmSettings, HttpConfig};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const DEALS_PATH: &str = "crm/v3/objects/deals";
const DEALS_SEARCH_PATH: &str = "crm/v3/objects/deals/search";

/// HubSpot property holding the deal display name.
const DEAL_NAME_PROPERTY: &str = "dealname";
const AMOUNT_PROPERTY: &str = "amount";

/// HTTP client for the HubSpot CRM v3 deals API.
///
/// Requests are authenticated with a private-app access token sent as a
/// bearer credential. Each call is made exactly once; failures are returned
/// to the caller.
///
/// # Examples
///
/// ```no_run
/// use mercurius_client::HubSpotClient;
/// use mercurius_core::HttpConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HubSpotClient::new("https://api.hubapi.com", "pat-na1-...", &HttpConfig::default())?;
/// let deals = client.search_deals_by_name("Listing #12345").await?;
/// println!("{} matching deals", deals.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HubSpotClient {
    client: Client,
    base_url: Url,
    access_token: String,
    http: HttpConfig,
}

/// Request body for `POST /crm/v3/objects/deals/search`.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    filter_groups: Vec<FilterGroup<'a>>,
    properties: [&'static str; 2],
}

#[derive(Serialize, Debug)]
struct FilterGroup<'a> {
    filters: Vec<Filter<'a>>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Filter<'a> {
    property_name: &'static str,
    operator: &'static str,
    value: &'a str,
}

impl<'a> SearchRequest<'a> {
    /// Exact match on the deal name.
    fn deal_name_equals(name: &'a str) -> Self {
        Self {
            filter_groups: vec![FilterGroup {
                filters: vec![Filter {
                    property_name: DEAL_NAME_PROPERTY,
                    operator: "EQ",
                    value: name,
                }],
            }],
            properties: [DEAL_NAME_PROPERTY, AMOUNT_PROPERTY],
        }
    }
}

/// Request body for `POST /crm/v3/objects/deals`.
#[derive(Serialize, Debug)]
struct CreateDealRequest<'a> {
    properties: DealProperties<'a>,
}

#[derive(Serialize, Debug)]
struct DealProperties<'a> {
    dealname: &'a str,
    // HubSpot property values are strings.
    amount: String,
}

/// Response from the search endpoint.
#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<CrmObject>,
}

/// A CRM object as returned by search and create.
#[derive(Deserialize, Debug)]
struct CrmObject {
    id: String,
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
}

impl CrmObject {
    fn property(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    fn into_summary(self) -> DealSummary {
        DealSummary {
            name: self.property(DEAL_NAME_PROPERTY),
            amount: self.property(AMOUNT_PROPERTY),
            id: self.id,
        }
    }
}

/// Error body returned by HubSpot on non-success responses.
#[derive(Deserialize)]
struct HubSpotError {
    message: String,
    #[serde(default)]
    category: Option<String>,
}

impl HubSpotClient {
    /// Creates a client for the HubSpot API rooted at `base_url_str`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the URL is malformed.
    pub fn new(base_url_str: &str, access_token: &str, http: &HttpConfig) -> Result<Self, AppError> {
        let base_url = crate::http::parse_base_url(base_url_str)?;
        let client = crate::http::build_client(http)?;

        Ok(Self {
            client,
            base_url,
            access_token: access_token.to_string(),
            http: http.clone(),
        })
    }

    /// Builds a client when the integration is enabled, `None` otherwise.
    pub fn from_config(
        crm: &CrmConfig,
        settings: &CrmSettings,
        http: &HttpConfig,
    ) -> Result<Option<Self>, AppError> {
        match crm.access_token() {
            Some(token) => Self::new(&settings.base_url, token, http).map(Some),
            None => Ok(None),
        }
    }

    /// Returns all deals whose name equals `name` exactly.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CrmError` for rejected or undecodable responses,
    /// `AppError::RateLimitExceeded` on HTTP 429.
    pub async fn search_deals_by_name(&self, name: &str) -> Result<Vec<DealSummary>, AppError> {
        let body = SearchRequest::deal_name_equals(name);
        let resp: SearchResponse = self.post(DEALS_SEARCH_PATH, &body).await?;
        debug!(deal_name = name, matches = resp.results.len(), "HubSpot deal search");

        Ok(resp
            .results
            .into_iter()
            .map(CrmObject::into_summary)
            .collect())
    }

    /// Creates a deal with the given name and amount.
    ///
    /// # Errors
    ///
    /// Same as [`HubSpotClient::search_deals_by_name`].
    pub async fn create_deal(&self, deal: &NewDeal) -> Result<DealSummary, AppError> {
        let body = CreateDealRequest {
            properties: DealProperties {
                dealname: &deal.name,
                amount: deal.amount.to_string(),
            },
        };
        let created: CrmObject = self.post(DEALS_PATH, &body).await?;
        Ok(created.into_summary())
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| AppError::InvalidUrl(e.to_string()))?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| crate::http::send_error(e, &self.http, AppError::CrmError))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, path, &error_text));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::CrmError(e.to_string()))?;
        serde_json::from_str(&text)
            .map_err(|e| AppError::CrmError(format!("Failed to parse response from {}: {}", path, e)))
    }
}

/// Maps a non-success HubSpot response to an error.
fn status_error(status: StatusCode, path: &str, body: &str) -> AppError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return AppError::RateLimitExceeded;
    }

    let detail = match serde_json::from_str::<HubSpotError>(body) {
        Ok(err) => match err.category {
            Some(category) => format!("{} ({})", err.message, category),
            None => err.message,
        },
        Err(_) => body.trim().to_string(),
    };

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return AppError::CrmError(format!(
            "{} Unauthorized - {}",
            status.as_u16(),
            detail
        ));
    }

    AppError::CrmError(format!("HTTP {} from {}: {}", status.as_u16(), path, detail))
}

#[async_trait]
impl DealGateway for HubSpotClient {
    async fn search_deals_by_name(&self, name: &str) -> Result<Vec<DealSummary>, AppError> {
        HubSpotClient::search_deals_by_name(self, name).await
    }

    async fn create_deal(&self, deal: &NewDeal) -> Result<DealSummary, AppError> {
        HubSpotClient::create_deal(self, deal).await
    }
}
