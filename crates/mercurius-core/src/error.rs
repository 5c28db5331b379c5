use thiserror::Error;

/// Application-wide error types.
///
/// Every fallible operation in Mercurius returns this enum. Library crates
/// convert their underlying failures into one of these variants; the CLI wraps
/// them in `anyhow` and prints [`AppError::user_message`].
///
/// # Error Conversion
///
/// Some errors automatically convert from their source types using `#[from]`:
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
/// - `toml::de::Error` → `AppError::ConfigError`
///
/// # Examples
///
/// ```no_run
/// use mercurius_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::Generic("Something went wrong".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// Wraps connection failures, query errors and constraint violations
    /// other than the expected `listing_number` conflict.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Listings API request failed.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// CRM API call failed.
    ///
    /// Covers authentication rejections, unexpected status codes and
    /// responses that cannot be decoded.
    #[error("CRM error: {0}")]
    CrmError(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Settings file could not be read or parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Upstream answered with a 5xx status.
    #[error("Server error: HTTP {0}")]
    ServerError(u16),

    /// Network or connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Please wait and try again.")]
    RateLimitExceeded,

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Check DATABASE_URL."
                        .to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::ClientError(msg) => {
                if msg.contains("timeout") || msg.contains("timed out") {
                    "Request timed out. The listings API may be slow or unreachable.".to_string()
                } else {
                    format!("Listings API error: {}", msg)
                }
            }
            AppError::CrmError(msg) => {
                if msg.contains("401") || msg.contains("403") || msg.contains("Unauthorized") {
                    "HubSpot rejected the access token.\n   Check your HUBSPOT_ACCESS_TOKEN environment variable.".to_string()
                } else {
                    format!("CRM error: {}", msg)
                }
            }
            AppError::ConfigError(msg) => {
                format!("Invalid configuration: {}\n   Check your config.toml.", msg)
            }
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   Try again later.",
                    secs
                )
            }
            AppError::RateLimitExceeded => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if a repeated request might succeed.
    ///
    /// Only transport failures, 5xx answers and rate limiting qualify; any
    /// other 4xx or decode failure is final.
    ///
    /// # Examples
    ///
    /// ```
    /// use mercurius_core::error::AppError;
    ///
    /// let err = AppError::NetworkError("connection reset".to_string());
    /// assert!(err.is_retryable());
    ///
    /// let err = AppError::ClientError("HTTP 404 from listings/list".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_)
                | AppError::Timeout(_)
                | AppError::RateLimitExceeded
                | AppError::ServerError(_)
        )
    }
}
