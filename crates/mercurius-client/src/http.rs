//! Shared reqwest plumbing for the API clients.

use mercurius_core::{AppError, HttpConfig};
use reqwest::{Client, Url};

pub(crate) const USER_AGENT: &str = "Mercurius/0.1 (listing-sync)";

/// Builds a reqwest client honouring the configured timeout.
pub(crate) fn build_client(http: &HttpConfig) -> Result<Client, AppError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(http.timeout)
        .build()
        .map_err(|e| AppError::ClientError(e.to_string()))
}

/// Parses a base URL, making sure relative joins append to its path.
pub(crate) fn parse_base_url(base_url_str: &str) -> Result<Url, AppError> {
    let mut normalized = base_url_str.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    let url = Url::parse(&normalized)
        .map_err(|_| AppError::InvalidUrl(base_url_str.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(AppError::InvalidUrl(base_url_str.to_string()));
    }
    Ok(url)
}

/// Maps a transport failure: timeouts and connect errors get their own
/// variants, everything else goes through `other`.
pub(crate) fn send_error(
    e: reqwest::Error,
    http: &HttpConfig,
    other: fn(String) -> AppError,
) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(http.timeout.as_secs())
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {}", e))
    } else {
        other(e.to_string())
    }
}
