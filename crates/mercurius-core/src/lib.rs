//! Mercurius Core - Domain types, error handling, configuration and the sync
//! orchestrator that mirrors marketplace listings into the local store and the CRM.

pub mod config;
pub mod error;
pub mod models;
pub mod sync;

pub use config::{
    default_config_path, load_settings, CrmConfig, CrmSettings, DbConfig, HttpConfig,
    ListingsSettings, Settings,
};
pub use error::AppError;
pub use models::{
    deal_name, DatabaseStats, DealSummary, Listing, NewDeal, NewListing, StatusCount, FOR_SALE,
};
pub use sync::{
    DealGateway, DealOutcome, ListingOutcome, ListingSource, ListingStore, ListingSyncResult,
    SyncReport, SyncService, SyncStats,
};
