//! Configuration types for Mercurius components.
//!
//! Settings are layered: built-in defaults, then an optional TOML file
//! (see [`default_config_path`]), then CLI flags and environment variables
//! handled by the binary. Secrets never live in the TOML file; the CRM token
//! arrives through [`CrmConfig::from_token`].
//!
//! ```toml
//! [listings]
//! base_url = "https://api.empireflippers.com/api/v1/"
//!
//! [crm]
//! base_url = "https://api.hubapi.com/"
//!
//! [http]
//! timeout_secs = 30
//! # total attempts for the listings fetch; raise to retry transient failures
//! max_retries = 1
//! retry_base_delay_ms = 500
//!
//! [database]
//! max_connections = 5
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AppError;

/// Default listings API root. Endpoint paths are joined onto it.
pub const DEFAULT_LISTINGS_BASE_URL: &str = "https://api.empireflippers.com/api/v1/";

/// Default HubSpot API root.
pub const DEFAULT_CRM_BASE_URL: &str = "https://api.hubapi.com/";

/// Database connection pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

/// Upper bound on listings fetch attempts accepted from the settings file.
pub const MAX_FETCH_ATTEMPTS: u32 = 10;

/// HTTP client configuration for external API calls.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawHttpConfig")]
pub struct HttpConfig {
    pub timeout: Duration,
    /// Total attempts for the listings fetch, including the first.
    /// Defaults to 1, so a run sends exactly one listings request.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 1,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// On-disk shape of the `[http]` table.
#[derive(Deserialize)]
#[serde(default)]
struct RawHttpConfig {
    timeout_secs: u64,
    max_retries: u32,
    retry_base_delay_ms: u64,
}

impl Default for RawHttpConfig {
    fn default() -> Self {
        let defaults = HttpConfig::default();
        Self {
            timeout_secs: defaults.timeout.as_secs(),
            max_retries: defaults.max_retries,
            retry_base_delay_ms: defaults.retry_base_delay.as_millis() as u64,
        }
    }
}

impl From<RawHttpConfig> for HttpConfig {
    fn from(raw: RawHttpConfig) -> Self {
        Self {
            // A zero timeout would fail every request.
            timeout: Duration::from_secs(raw.timeout_secs.max(1)),
            max_retries: raw.max_retries.clamp(1, MAX_FETCH_ATTEMPTS),
            retry_base_delay: Duration::from_millis(raw.retry_base_delay_ms),
        }
    }
}

/// `[listings]` table: where listings are fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListingsSettings {
    pub base_url: String,
}

impl Default for ListingsSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LISTINGS_BASE_URL.to_string(),
        }
    }
}

/// `[crm]` table: where deals are searched and created.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CrmSettings {
    pub base_url: String,
}

impl Default for CrmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CRM_BASE_URL.to_string(),
        }
    }
}

/// Complete settings file. Every table and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub listings: ListingsSettings,
    pub crm: CrmSettings,
    pub http: HttpConfig,
    pub database: DbConfig,
}

/// Whether deals are mirrored into the CRM.
///
/// Resolved once at startup from the access token. A missing or blank token
/// disables the integration; listings are still persisted.
#[derive(Clone, PartialEq, Eq)]
pub enum CrmConfig {
    Disabled,
    Enabled { access_token: String },
}

impl CrmConfig {
    /// Builds the CRM configuration from an optional token.
    ///
    /// # Examples
    ///
    /// ```
    /// use mercurius_core::CrmConfig;
    ///
    /// assert!(CrmConfig::from_token(Some("pat-na1-abc".to_string())).is_enabled());
    /// assert!(!CrmConfig::from_token(Some("   ".to_string())).is_enabled());
    /// assert!(!CrmConfig::from_token(None).is_enabled());
    /// ```
    pub fn from_token(token: Option<String>) -> Self {
        match token {
            Some(t) if !t.trim().is_empty() => CrmConfig::Enabled {
                access_token: t.trim().to_string(),
            },
            _ => CrmConfig::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, CrmConfig::Enabled { .. })
    }

    pub fn access_token(&self) -> Option<&str> {
        match self {
            CrmConfig::Enabled { access_token } => Some(access_token),
            CrmConfig::Disabled => None,
        }
    }
}

// Never print the token.
impl std::fmt::Debug for CrmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrmConfig::Disabled => f.write_str("Disabled"),
            CrmConfig::Enabled { .. } => f
                .debug_struct("Enabled")
                .field("access_token", &"<redacted>")
                .finish(),
        }
    }
}

/// Default location of the settings file: `<config dir>/mercurius/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mercurius").join("config.toml"))
}

/// Loads settings from `path`, or from [`default_config_path`] when `None`.
///
/// A missing default file yields [`Settings::default`]. A missing file at an
/// explicitly given path is an error.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, AppError> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => match default_config_path() {
            Some(p) => (p, false),
            None => return Ok(Settings::default()),
        },
    };

    if !path.exists() {
        if explicit {
            return Err(AppError::ConfigError(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        tracing::debug!(path = %path.display(), "No settings file, using defaults");
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| {
        AppError::ConfigError(format!("failed to read {}: {}", path.display(), e))
    })?;
    let settings: Settings = toml::from_str(&content)?;
    tracing::debug!(path = %path.display(), "Loaded settings");
    Ok(settings)
}
